//! Presentation engine implementations

pub mod headless;
pub mod vulkan;
