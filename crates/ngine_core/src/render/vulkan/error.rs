//! Vulkan backend errors

use std::panic::Location;
use std::path::PathBuf;

use ash::prelude::VkResult;
use ash::vk;
use thiserror::Error;

use crate::assets::ModelLoadError;
use crate::render::{ModelHandle, ShaderHandle};
use crate::window::WindowError;

/// Vulkan backend error type
#[derive(Error, Debug)]
pub enum VulkanError {
    /// A Vulkan call returned a failure code
    #[error("Vulkan call failed with {result:?} ({code}) at {location}", code = .result.as_raw())]
    Api {
        /// Status code returned by the driver
        result: vk::Result,
        /// Call site in this crate
        location: &'static Location<'static>,
    },

    /// The Vulkan loader could not be found or initialized
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// The instance reports no physical devices
    #[error("No Vulkan-capable adapters found")]
    NoDeviceAvailable,

    /// No adapter passed the selection criteria
    #[error("No adapter meets the minimum requirements")]
    NoCompatibleDevice,

    /// The chosen adapter has no queue family with the needed capability
    #[error("Selected adapter has no {0} queue family")]
    MissingQueueFamily(&'static str),

    /// No memory type matches the buffer requirements
    #[error("No memory type with {required:?} in type bits {type_bits:#b}")]
    NoSuitableMemory {
        /// Acceptable memory type indices
        type_bits: u32,
        /// Required property flags
        required: vk::MemoryPropertyFlags,
    },

    /// Presentation was requested from a backend built without a surface
    #[error("Backend has no presentation surface")]
    NoPresentation,

    /// Upload of zero bytes
    #[error("Refusing to upload an empty {0} buffer")]
    EmptyUpload(&'static str),

    /// Index list longer than a 32-bit draw can address
    #[error("{0} indices exceed the 32-bit index range")]
    IndexOverflow(usize),

    /// Unknown shader handle
    #[error("Unknown shader handle {0}")]
    UnknownShader(ShaderHandle),

    /// Unknown model handle
    #[error("Unknown model handle {0}")]
    UnknownModel(ModelHandle),

    /// A model cannot be destroyed while the draw list references it
    #[error("{0} is still referenced by the draw list")]
    ModelInUse(ModelHandle),

    /// SPIR-V file could not be read or is malformed
    #[error("Failed to read shader {path}: {source}")]
    ShaderIo {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// Model file could not be imported
    #[error("Failed to import model {path}: {source}")]
    ModelImport {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: ModelLoadError,
    },

    /// Window or surface failure
    #[error(transparent)]
    Window(#[from] WindowError),
}

impl VulkanError {
    /// Wrap a failure code, recording the caller's location
    #[track_caller]
    #[must_use]
    pub fn api(result: vk::Result) -> Self {
        Self::Api {
            result,
            location: Location::caller(),
        }
    }

    /// Status code of an API failure
    #[must_use]
    pub const fn code(&self) -> Option<vk::Result> {
        match self {
            Self::Api { result, .. } => Some(*result),
            _ => None,
        }
    }
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// Converts raw `VkResult`s, recording where the failing call was made
pub trait VkResultExt<T> {
    /// Map an error code into [`VulkanError::Api`]
    fn check(self) -> VulkanResult<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    #[track_caller]
    fn check(self) -> VulkanResult<T> {
        match self {
            Ok(value) => Ok(value),
            Err(result) => Err(VulkanError::api(result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_records_call_site() {
        let failed: VkResult<()> = Err(vk::Result::ERROR_DEVICE_LOST);
        let line = line!() + 1;
        let error = failed.check().unwrap_err();

        match error {
            VulkanError::Api { result, location } => {
                assert_eq!(result, vk::Result::ERROR_DEVICE_LOST);
                assert_eq!(location.line(), line);
                assert!(location.file().ends_with("error.rs"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_message_carries_numeric_code() {
        let error = VkResult::<()>::Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY)
            .check()
            .unwrap_err();

        assert_eq!(error.code(), Some(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY));
        assert!(error.to_string().contains("-2"));
    }

    #[test]
    fn test_success_passes_through() {
        let ok: VkResult<u32> = Ok(7);
        assert_eq!(ok.check().unwrap(), 7);
    }
}
