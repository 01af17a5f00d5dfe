//! Foundation module - Core utilities and types
//!
//! - Math types and the Vulkan-oriented matrix helpers
//! - Logging setup

pub mod logging;
pub mod math;
