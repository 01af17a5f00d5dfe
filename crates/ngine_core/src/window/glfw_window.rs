use super::{RenderWindow, WindowError, WindowResult};
use crate::config::WindowSettings;
use crate::events::{Event, EventQueue};

/// GLFW window configured for Vulkan rendering
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    fullscreen: bool,
    resizable: bool,
    resize_pending: bool,
}

impl Window {
    /// Create a window from startup settings
    pub fn new(title: &str, settings: &WindowSettings) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(settings.resizable));

        let (mut window, events) = glfw
            .with_primary_monitor(|glfw, monitor| {
                let mode = match monitor {
                    Some(monitor) if settings.fullscreen => glfw::WindowMode::FullScreen(monitor),
                    _ => glfw::WindowMode::Windowed,
                };
                glfw.create_window(settings.width, settings.height, title, mode)
            })
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_framebuffer_size_polling(true);

        let fullscreen = window.with_window_mode(|mode| matches!(mode, glfw::WindowMode::FullScreen(_)));
        log::info!(
            "Created {}x{} window '{}' (fullscreen: {}, resizable: {})",
            settings.width,
            settings.height,
            title,
            fullscreen,
            settings.resizable
        );

        Ok(Self {
            glfw,
            window,
            events,
            fullscreen,
            resizable: settings.resizable,
            resize_pending: false,
        })
    }

    /// Whether the window has been asked to close
    #[must_use]
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Pump the platform queue into `queue`.
    ///
    /// Returns `false` once the window should close.
    pub fn update(&mut self, queue: &mut EventQueue) -> bool {
        self.glfw.poll_events();
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    if self.resizable {
                        self.resize_pending = true;
                    }
                    queue.push(Event::WindowResize {
                        width: u32::try_from(width).unwrap_or(0),
                        height: u32::try_from(height).unwrap_or(0),
                    });
                }
                glfw::WindowEvent::CursorPos(x, y) => queue.push(Event::CursorMove { x, y }),
                glfw::WindowEvent::Key(key, _, action, _) => queue.push(Event::KeyAction {
                    key,
                    pressed: action != glfw::Action::Release,
                }),
                _ => {}
            }
        }
        !self.window.should_close()
    }

    /// Required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or(WindowError::VulkanUnsupported)
    }

    /// Create a Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::SurfaceCreation(result))
        }
    }
}

impl RenderWindow for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (
            u32::try_from(width).unwrap_or(0),
            u32::try_from(height).unwrap_or(0),
        )
    }

    fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    fn take_resize_pending(&mut self) -> bool {
        std::mem::take(&mut self.resize_pending)
    }
}

#[cfg(feature = "vulkan")]
impl crate::render::vulkan::VulkanSurfaceSource for Window {
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        Self::required_instance_extensions(self)
    }

    fn create_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        self.create_vulkan_surface(instance)
    }
}
