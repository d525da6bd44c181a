//! Vulkan backend built on `ash`
//!
//! [`VulkanEngine`] owns the instance, window surface, device, queues and the
//! command pool, and maps every [`PresentationEngine`](crate::render::PresentationEngine)
//! call onto the corresponding Vulkan entry point.

pub mod context;
mod engine;

pub use context::{find_memory_type, LogicalDevice, PhysicalDeviceInfo, VulkanContext, VulkanInstance};
pub use engine::VulkanEngine;
