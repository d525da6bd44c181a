//! Descriptor allocation
//!
//! - [`DescriptorSetLayoutBuilder`] / [`DescriptorSetLayout`]: binding index to
//!   (type, stages, count), immutable once built
//! - [`DescriptorPoolBuilder`] / [`DescriptorPool`]: fixed-capacity arena with
//!   its own accounting; sets are released all at once by `reset`
//! - [`DescriptorWriter`]: validates writes against a layout, then allocates
//!   and writes a set in one step

mod layout;
mod pool;
mod writer;

pub use layout::{DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use pool::{DescriptorPool, DescriptorPoolBuilder, DEFAULT_MAX_SETS};
pub use writer::DescriptorWriter;

use ash::vk;

/// Resource family a descriptor type reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorFamily {
    /// Uniform or storage buffers
    Buffer,
    /// Samplers, sampled or storage images, input attachments
    Image,
    /// Texel buffers and extension types
    Other,
}

/// Classify a descriptor type
pub fn descriptor_family(ty: vk::DescriptorType) -> DescriptorFamily {
    match ty {
        vk::DescriptorType::UNIFORM_BUFFER
        | vk::DescriptorType::STORAGE_BUFFER
        | vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        | vk::DescriptorType::STORAGE_BUFFER_DYNAMIC => DescriptorFamily::Buffer,
        vk::DescriptorType::SAMPLER
        | vk::DescriptorType::COMBINED_IMAGE_SAMPLER
        | vk::DescriptorType::SAMPLED_IMAGE
        | vk::DescriptorType::STORAGE_IMAGE
        | vk::DescriptorType::INPUT_ATTACHMENT => DescriptorFamily::Image,
        _ => DescriptorFamily::Other,
    }
}
