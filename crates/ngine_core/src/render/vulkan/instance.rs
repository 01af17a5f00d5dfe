//! Vulkan instance and debug messenger

use std::ffi::{c_char, CStr, CString};

use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry, Instance};

use super::error::{VkResultExt, VulkanError, VulkanResult};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"Ngine";

/// API version requested at instance creation; also the adapter minimum
pub const REQUIRED_API_VERSION: u32 = vk::API_VERSION_1_2;

/// Debug mode after probing for the validation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugMode {
    /// Not requested
    Off,
    /// Requested and the layer is installed
    Validation,
    /// Requested without the layer; runs as `Off`
    LayerMissing,
}

impl DebugMode {
    /// Combine the configured request with what the loader reports
    #[must_use]
    pub const fn resolve(requested: bool, layer_available: bool) -> Self {
        match (requested, layer_available) {
            (false, _) => Self::Off,
            (true, true) => Self::Validation,
            (true, false) => Self::LayerMissing,
        }
    }

    /// Whether the validation layer and messenger are enabled
    #[must_use]
    pub const fn enabled(self) -> bool {
        matches!(self, Self::Validation)
    }

    /// Level the outcome is reported at; a missing layer is a configuration
    /// fallback, so a warning
    #[must_use]
    pub const fn log_level(self) -> log::Level {
        match self {
            Self::LayerMissing => log::Level::Warn,
            Self::Off | Self::Validation => log::Level::Debug,
        }
    }
}

struct DebugMessenger {
    loader: DebugUtils,
    messenger: vk::DebugUtilsMessengerEXT,
}

/// Vulkan instance wrapper with RAII cleanup
pub struct VulkanInstance {
    /// Vulkan entry point
    pub entry: Entry,
    /// Vulkan instance handle
    pub instance: Instance,
    debug: Option<DebugMessenger>,
}

impl VulkanInstance {
    /// Create an instance enabling `extensions`.
    ///
    /// With `debug_requested`, the Khronos validation layer and a debug
    /// messenger are enabled when available. A missing layer is logged and
    /// debug mode continues disabled.
    pub fn new(app_name: &str, extensions: &[String], debug_requested: bool) -> VulkanResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| VulkanError::Loading(e.to_string()))?;

        let layer_available = debug_requested && validation_layer_available(&entry)?;
        let mode = DebugMode::resolve(debug_requested, layer_available);
        if mode == DebugMode::LayerMissing {
            log::log!(
                mode.log_level(),
                "Graphics debug mode requested but {} is not installed; continuing without validation",
                VALIDATION_LAYER.to_string_lossy()
            );
        }
        let debug_enabled = mode.enabled();

        let app_name = CString::new(app_name).unwrap_or_else(|_| CString::from(c"Ngine Runtime"));
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(ENGINE_NAME)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(REQUIRED_API_VERSION);

        let extension_names: Vec<CString> = extensions
            .iter()
            .filter_map(|name| CString::new(name.as_str()).ok())
            .collect();
        let mut extension_ptrs: Vec<*const c_char> = extension_names.iter().map(|name| name.as_ptr()).collect();
        let mut layer_ptrs: Vec<*const c_char> = Vec::new();
        if debug_enabled {
            extension_ptrs.push(DebugUtils::name().as_ptr());
            layer_ptrs.push(VALIDATION_LAYER.as_ptr());
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }.check()?;
        log::info!(
            "Created Vulkan instance ({} extension(s), validation {})",
            extension_ptrs.len(),
            if debug_enabled { "on" } else { "off" }
        );

        let debug = if debug_enabled {
            let loader = DebugUtils::new(&entry, &instance);
            match create_messenger(&loader) {
                Ok(messenger) => Some(DebugMessenger { loader, messenger }),
                Err(err) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(err);
                }
            }
        } else {
            None
        };

        Ok(Self { entry, instance, debug })
    }

    /// Whether the debug messenger is active
    #[must_use]
    pub const fn debug_enabled(&self) -> bool {
        self.debug.is_some()
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            if let Some(debug) = self.debug.take() {
                debug.loader.destroy_debug_utils_messenger(debug.messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

fn validation_layer_available(entry: &Entry) -> VulkanResult<bool> {
    let layers = entry.enumerate_instance_layer_properties().check()?;
    Ok(layers.iter().any(|layer| {
        let name = unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) };
        name == VALIDATION_LAYER
    }))
}

fn create_messenger(loader: &DebugUtils) -> VulkanResult<vk::DebugUtilsMessengerEXT> {
    let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
        .message_severity(
            vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
        )
        .message_type(
            vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
        )
        .pfn_user_callback(Some(debug_callback));

    unsafe { loader.create_debug_utils_messenger(&create_info, None) }.check()
}

/// Log level used for a validation message severity
pub(crate) fn severity_level(severity: vk::DebugUtilsMessageSeverityFlagsEXT) -> log::Level {
    if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::Level::Error
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
        log::Level::Warn
    } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
        log::Level::Info
    } else {
        log::Level::Debug
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    log::log!(severity_level(message_severity), "[Vulkan] {:?} - {}", message_type, message);

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_mapping() {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Severity;

        assert_eq!(severity_level(Severity::VERBOSE), log::Level::Debug);
        assert_eq!(severity_level(Severity::INFO), log::Level::Info);
        assert_eq!(severity_level(Severity::WARNING), log::Level::Warn);
        assert_eq!(severity_level(Severity::ERROR), log::Level::Error);
    }

    #[test]
    fn test_missing_layer_falls_back_with_warning() {
        let mode = DebugMode::resolve(true, false);

        assert_eq!(mode, DebugMode::LayerMissing);
        assert!(!mode.enabled());
        assert_eq!(mode.log_level(), log::Level::Warn);
    }

    #[test]
    fn test_debug_mode_resolution() {
        assert_eq!(DebugMode::resolve(false, true), DebugMode::Off);
        assert_eq!(DebugMode::resolve(false, false), DebugMode::Off);
        assert!(DebugMode::resolve(true, true).enabled());
        assert_eq!(DebugMode::resolve(true, true).log_level(), log::Level::Debug);
    }
}
