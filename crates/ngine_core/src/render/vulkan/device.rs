//! Adapter selection, queue families and the logical device

use std::collections::BTreeSet;
use std::ffi::CStr;

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Instance};

use super::error::{VkResultExt, VulkanError, VulkanResult};
use super::instance::REQUIRED_API_VERSION;
use crate::config::GraphicsSettings;

/// Broad class of a physical adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    /// Dedicated GPU
    Discrete,
    /// GPU sharing memory with the CPU
    Integrated,
    /// Virtualized GPU
    Virtual,
    /// Software rasterizer
    Cpu,
    /// Anything else
    Other,
}

impl From<vk::PhysicalDeviceType> for AdapterKind {
    fn from(device_type: vk::PhysicalDeviceType) -> Self {
        match device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => Self::Discrete,
            vk::PhysicalDeviceType::INTEGRATED_GPU => Self::Integrated,
            vk::PhysicalDeviceType::VIRTUAL_GPU => Self::Virtual,
            vk::PhysicalDeviceType::CPU => Self::Cpu,
            _ => Self::Other,
        }
    }
}

/// What selection needs to know about an adapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    /// Driver-reported name
    pub name: String,
    /// Packed Vulkan API version
    pub api_version: u32,
    /// Adapter class
    pub kind: AdapterKind,
}

impl AdapterInfo {
    /// Whether the adapter reports at least the required API version
    #[must_use]
    pub fn meets_api_version(&self) -> bool {
        let reported = (
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
        );
        let required = (
            vk::api_version_major(REQUIRED_API_VERSION),
            vk::api_version_minor(REQUIRED_API_VERSION),
        );
        reported >= required
    }

    fn qualifies_for_auto_pick(&self) -> bool {
        self.meets_api_version() && !matches!(self.kind, AdapterKind::Integrated | AdapterKind::Cpu)
    }
}

/// Why a manual choice was replaced by auto-pick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionFallback {
    /// The configured index does not exist
    IndexOutOfRange {
        /// Configured index
        requested: usize,
        /// Number of adapters present
        available: usize,
    },
    /// The configured adapter is too old
    BelowMinimumVersion {
        /// Configured index
        requested: usize,
    },
}

/// Outcome of adapter selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdapterSelection {
    /// Index into the enumerated adapters
    pub index: usize,
    /// Set when a manual choice fell back to auto-pick
    pub fallback: Option<SelectionFallback>,
}

/// Choose an adapter following the startup settings.
///
/// Auto-pick takes the first adapter reporting the minimum API version that is
/// neither integrated nor a CPU implementation. A manual index is honored when
/// it exists and meets the API version; otherwise a warning is logged and
/// auto-pick decides.
pub fn select_adapter(adapters: &[AdapterInfo], settings: &GraphicsSettings) -> VulkanResult<AdapterSelection> {
    if adapters.is_empty() {
        return Err(VulkanError::NoDeviceAvailable);
    }

    let fallback = if settings.auto_pick_device {
        None
    } else {
        let requested = settings.manual_device_index;
        match adapters.get(requested) {
            Some(adapter) if adapter.meets_api_version() => {
                return Ok(AdapterSelection { index: requested, fallback: None });
            }
            Some(adapter) => {
                log::warn!(
                    "Adapter {} ({}) is below Vulkan 1.2, falling back to automatic selection",
                    requested,
                    adapter.name
                );
                Some(SelectionFallback::BelowMinimumVersion { requested })
            }
            None => {
                log::warn!(
                    "Adapter index {} is out of range ({} available), falling back to automatic selection",
                    requested,
                    adapters.len()
                );
                Some(SelectionFallback::IndexOutOfRange {
                    requested,
                    available: adapters.len(),
                })
            }
        }
    };

    let index = adapters
        .iter()
        .position(AdapterInfo::qualifies_for_auto_pick)
        .ok_or(VulkanError::NoCompatibleDevice)?;
    Ok(AdapterSelection { index, fallback })
}

/// Per-family capabilities relevant to queue resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyCaps {
    /// Supports graphics commands
    pub graphics: bool,
    /// Can present to the target surface
    pub present: bool,
}

/// Resolved queue family indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Family for graphics and transfer submissions
    pub graphics: u32,
    /// Family for presentation
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Distinct families, each needing one queue
    #[must_use]
    pub fn unique(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = [self.graphics, self.present].into_iter().collect();
        set.into_iter().collect()
    }
}

/// Pick the graphics and presentation families.
///
/// A family doing both wins; otherwise the first of each.
pub fn resolve_queue_families(families: &[QueueFamilyCaps]) -> VulkanResult<QueueFamilyIndices> {
    let to_index = |i: usize| u32::try_from(i).map_err(|_| VulkanError::MissingQueueFamily("graphics"));

    if let Some(shared) = families.iter().position(|f| f.graphics && f.present) {
        let index = to_index(shared)?;
        return Ok(QueueFamilyIndices { graphics: index, present: index });
    }

    let graphics = families
        .iter()
        .position(|f| f.graphics)
        .ok_or(VulkanError::MissingQueueFamily("graphics"))?;
    let present = families
        .iter()
        .position(|f| f.present)
        .ok_or(VulkanError::MissingQueueFamily("presentation"))?;
    Ok(QueueFamilyIndices {
        graphics: to_index(graphics)?,
        present: to_index(present)?,
    })
}

/// Surface the device presents to
pub struct PresentationSurface {
    /// Surface extension loader
    pub loader: Surface,
    /// Surface handle
    pub surface: vk::SurfaceKHR,
}

impl Drop for PresentationSurface {
    fn drop(&mut self) {
        unsafe {
            self.loader.destroy_surface(self.surface, None);
        }
    }
}

/// Selected physical device
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Memory heaps and types
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Resolved queue families
    pub queue_families: QueueFamilyIndices,
}

impl PhysicalDeviceInfo {
    /// Enumerate adapters, select one and resolve its queue families.
    ///
    /// Without a surface the presentation family is the graphics family.
    pub fn select(
        instance: &Instance,
        surface: Option<&PresentationSurface>,
        settings: &GraphicsSettings,
    ) -> VulkanResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices() }.check()?;

        let adapters: Vec<AdapterInfo> = devices
            .iter()
            .map(|&device| {
                let properties = unsafe { instance.get_physical_device_properties(device) };
                AdapterInfo {
                    name: device_name(&properties),
                    api_version: properties.api_version,
                    kind: properties.device_type.into(),
                }
            })
            .collect();
        for (index, adapter) in adapters.iter().enumerate() {
            log::debug!(
                "Adapter {}: {} ({:?}, Vulkan {}.{})",
                index,
                adapter.name,
                adapter.kind,
                vk::api_version_major(adapter.api_version),
                vk::api_version_minor(adapter.api_version)
            );
        }

        let selection = select_adapter(&adapters, settings)?;
        let device = devices[selection.index];
        log::info!("Selected GPU: {}", adapters[selection.index].name);

        let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
        let mut caps = Vec::with_capacity(families.len());
        for (index, family) in families.iter().enumerate() {
            let graphics = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
            let present = match surface {
                Some(surface) => {
                    let index = u32::try_from(index).map_err(|_| VulkanError::MissingQueueFamily("presentation"))?;
                    unsafe {
                        surface
                            .loader
                            .get_physical_device_surface_support(device, index, surface.surface)
                    }
                    .check()?
                }
                None => graphics,
            };
            caps.push(QueueFamilyCaps { graphics, present });
        }
        let queue_families = resolve_queue_families(&caps)?;
        log::debug!("Queue families resolved: {:?}", queue_families);

        Ok(Self {
            device,
            properties: unsafe { instance.get_physical_device_properties(device) },
            memory_properties: unsafe { instance.get_physical_device_memory_properties(device) },
            queue_families,
        })
    }

    /// Driver-reported name
    #[must_use]
    pub fn name(&self) -> String {
        device_name(&self.properties)
    }
}

fn device_name(properties: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(properties.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Logical device wrapper with RAII cleanup
pub struct LogicalDevice {
    /// Vulkan logical device handle
    pub device: Device,
    /// Graphics and transfer queue
    pub graphics_queue: vk::Queue,
    /// Presentation queue
    pub present_queue: vk::Queue,
    /// Swapchain extension loader, when presenting
    pub swapchain_loader: Option<SwapchainLoader>,
}

impl LogicalDevice {
    /// Create the device with one queue per distinct family
    pub fn new(instance: &Instance, physical: &PhysicalDeviceInfo, presenting: bool) -> VulkanResult<Self> {
        let priorities = [1.0_f32];
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = physical
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&priorities)
                    .build()
            })
            .collect();

        let extensions = if presenting {
            vec![SwapchainLoader::name().as_ptr()]
        } else {
            Vec::new()
        };
        let features = vk::PhysicalDeviceFeatures::default();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device = unsafe { instance.create_device(physical.device, &create_info, None) }.check()?;
        let graphics_queue = unsafe { device.get_device_queue(physical.queue_families.graphics, 0) };
        let present_queue = unsafe { device.get_device_queue(physical.queue_families.present, 0) };
        let swapchain_loader = presenting.then(|| SwapchainLoader::new(instance, &device));

        Ok(Self {
            device,
            graphics_queue,
            present_queue,
            swapchain_loader,
        })
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle() }.check()
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        unsafe {
            // Ensure device is idle before destruction
            let _ = self.device.device_wait_idle();
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(name: &str, api_version: u32, kind: AdapterKind) -> AdapterInfo {
        AdapterInfo {
            name: name.to_string(),
            api_version,
            kind,
        }
    }

    fn manual(index: usize) -> GraphicsSettings {
        GraphicsSettings {
            auto_pick_device: false,
            manual_device_index: index,
            enable_debug_mode: false,
        }
    }

    fn adapters() -> Vec<AdapterInfo> {
        vec![
            adapter("integrated", vk::API_VERSION_1_3, AdapterKind::Integrated),
            adapter("old discrete", vk::API_VERSION_1_1, AdapterKind::Discrete),
            adapter("software", vk::API_VERSION_1_3, AdapterKind::Cpu),
            adapter("discrete", vk::make_api_version(0, 1, 2, 198), AdapterKind::Discrete),
        ]
    }

    #[test]
    fn test_auto_pick_skips_rejected_adapters() {
        let selection = select_adapter(&adapters(), &GraphicsSettings::default()).unwrap();
        assert_eq!(selection, AdapterSelection { index: 3, fallback: None });
    }

    #[test]
    fn test_manual_index_honored() {
        // Manual choice only checks the API version, not the adapter class.
        let selection = select_adapter(&adapters(), &manual(0)).unwrap();
        assert_eq!(selection, AdapterSelection { index: 0, fallback: None });
    }

    #[test]
    fn test_manual_index_out_of_range_falls_back() {
        let selection = select_adapter(&adapters(), &manual(9)).unwrap();
        assert_eq!(selection.index, 3);
        assert_eq!(
            selection.fallback,
            Some(SelectionFallback::IndexOutOfRange { requested: 9, available: 4 })
        );
    }

    #[test]
    fn test_manual_index_below_minimum_falls_back() {
        let selection = select_adapter(&adapters(), &manual(1)).unwrap();
        assert_eq!(selection.index, 3);
        assert_eq!(
            selection.fallback,
            Some(SelectionFallback::BelowMinimumVersion { requested: 1 })
        );
    }

    #[test]
    fn test_no_adapters() {
        let result = select_adapter(&[], &GraphicsSettings::default());
        assert!(matches!(result, Err(VulkanError::NoDeviceAvailable)));
    }

    #[test]
    fn test_nothing_qualifies() {
        let only_rejects = vec![
            adapter("integrated", vk::API_VERSION_1_3, AdapterKind::Integrated),
            adapter("software", vk::API_VERSION_1_2, AdapterKind::Cpu),
            adapter("old", vk::API_VERSION_1_0, AdapterKind::Discrete),
        ];
        let result = select_adapter(&only_rejects, &GraphicsSettings::default());
        assert!(matches!(result, Err(VulkanError::NoCompatibleDevice)));

        let result = select_adapter(&only_rejects, &manual(7));
        assert!(matches!(result, Err(VulkanError::NoCompatibleDevice)));
    }

    #[test]
    fn test_version_compares_major_and_minor() {
        assert!(adapter("a", vk::make_api_version(0, 1, 2, 0), AdapterKind::Discrete).meets_api_version());
        assert!(adapter("b", vk::make_api_version(0, 2, 0, 0), AdapterKind::Discrete).meets_api_version());
        assert!(!adapter("c", vk::make_api_version(0, 1, 1, 999), AdapterKind::Discrete).meets_api_version());
    }

    #[test]
    fn test_queue_family_shared_preferred() {
        let families = [
            QueueFamilyCaps { graphics: true, present: false },
            QueueFamilyCaps { graphics: false, present: true },
            QueueFamilyCaps { graphics: true, present: true },
        ];
        let indices = resolve_queue_families(&families).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: 2, present: 2 });
        assert_eq!(indices.unique(), vec![2]);
    }

    #[test]
    fn test_queue_family_split() {
        let families = [
            QueueFamilyCaps { graphics: false, present: false },
            QueueFamilyCaps { graphics: true, present: false },
            QueueFamilyCaps { graphics: false, present: true },
        ];
        let indices = resolve_queue_families(&families).unwrap();

        assert_eq!(indices, QueueFamilyIndices { graphics: 1, present: 2 });
        assert_eq!(indices.unique(), vec![1, 2]);
    }

    #[test]
    fn test_queue_family_missing() {
        let no_present = [QueueFamilyCaps { graphics: true, present: false }];
        assert!(matches!(
            resolve_queue_families(&no_present),
            Err(VulkanError::MissingQueueFamily("presentation"))
        ));

        let no_graphics = [QueueFamilyCaps { graphics: false, present: true }];
        assert!(matches!(
            resolve_queue_families(&no_graphics),
            Err(VulkanError::MissingQueueFamily("graphics"))
        ));
    }
}
