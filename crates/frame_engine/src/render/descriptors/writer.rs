//! Validated descriptor set writes

use ash::vk;

use super::layout::DescriptorSetLayout;
use super::pool::DescriptorPool;
use super::{descriptor_family, DescriptorFamily};
use crate::render::engine::{DescriptorResources, DescriptorWrite};

/// Collects writes for one set of `layout`, checking each against it
///
/// Nothing reaches the device until [`build`](Self::build) or
/// [`overwrite`](Self::overwrite).
pub struct DescriptorWriter<'a> {
    layout: &'a DescriptorSetLayout,
    pool: &'a mut DescriptorPool,
    writes: Vec<DescriptorWrite>,
}

impl<'a> DescriptorWriter<'a> {
    /// Start writing a set of `layout` allocated from `pool`
    pub fn new(layout: &'a DescriptorSetLayout, pool: &'a mut DescriptorPool) -> Self {
        Self {
            layout,
            pool,
            writes: Vec::new(),
        }
    }

    /// Write one buffer to a single-descriptor binding
    ///
    /// # Panics
    /// If the binding is missing, is not a buffer binding or holds more than
    /// one descriptor.
    pub fn write_buffer(self, binding: u32, info: vk::DescriptorBufferInfo) -> Self {
        self.push(binding, DescriptorFamily::Buffer, DescriptorResources::Buffers(vec![info]), true)
    }

    /// Write an array of buffers starting at element 0
    ///
    /// # Panics
    /// If the binding is missing, is not a buffer binding, or `infos` is empty
    /// or longer than the binding.
    pub fn write_buffers(self, binding: u32, infos: &[vk::DescriptorBufferInfo]) -> Self {
        self.push(
            binding,
            DescriptorFamily::Buffer,
            DescriptorResources::Buffers(infos.to_vec()),
            false,
        )
    }

    /// Write one image to a single-descriptor binding
    ///
    /// # Panics
    /// If the binding is missing, is not an image binding or holds more than
    /// one descriptor.
    pub fn write_image(self, binding: u32, info: vk::DescriptorImageInfo) -> Self {
        self.push(binding, DescriptorFamily::Image, DescriptorResources::Images(vec![info]), true)
    }

    /// Write an array of images starting at element 0
    ///
    /// # Panics
    /// If the binding is missing, is not an image binding, or `infos` is empty
    /// or longer than the binding.
    pub fn write_images(self, binding: u32, infos: &[vk::DescriptorImageInfo]) -> Self {
        self.push(
            binding,
            DescriptorFamily::Image,
            DescriptorResources::Images(infos.to_vec()),
            false,
        )
    }

    fn push(
        mut self,
        binding: u32,
        family: DescriptorFamily,
        resources: DescriptorResources,
        single: bool,
    ) -> Self {
        let description = self
            .layout
            .binding(binding)
            .unwrap_or_else(|| panic!("Layout does not contain binding {binding}"));
        let descriptor_type = description.descriptor_type;
        assert_eq!(
            descriptor_family(descriptor_type),
            family,
            "Binding {binding} is {descriptor_type:?}, not a {family:?} binding"
        );

        let provided = resources.len();
        if single {
            assert_eq!(
                description.count, 1,
                "Binding {binding} holds {} descriptors, expected a single one",
                description.count
            );
        } else {
            assert!(
                provided >= 1 && provided <= description.count as usize,
                "Binding {binding} holds {} descriptors, got {provided}",
                description.count
            );
        }

        self.writes.push(DescriptorWrite {
            binding,
            descriptor_type,
            resources,
        });
        self
    }

    /// Allocate a set and write everything into it
    ///
    /// Returns `None` without writing when the pool cannot supply a set.
    pub fn build(self) -> Option<vk::DescriptorSet> {
        let set = self.pool.allocate(self.layout)?;
        self.pool.engine().update_descriptor_set(set, &self.writes);
        Some(set)
    }

    /// Write everything into an existing set of the same layout
    pub fn overwrite(self, set: vk::DescriptorSet) {
        self.layout.engine().update_descriptor_set(set, &self.writes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessEngine, Violation};
    use crate::render::descriptors::{DescriptorPoolBuilder, DescriptorSetLayoutBuilder};
    use std::sync::Arc;

    fn buffer_info() -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: vk::Buffer::null(),
            offset: 0,
            range: 64,
        }
    }

    fn material_setup(headless: &Arc<HeadlessEngine>) -> (DescriptorSetLayout, DescriptorPool) {
        let layout = DescriptorSetLayoutBuilder::new(headless.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::FRAGMENT)
            .add_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                4,
            )
            .build()
            .unwrap();
        let pool = DescriptorPoolBuilder::new(headless.clone())
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 1)
            .add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 4)
            .set_max_sets(1)
            .build()
            .unwrap();
        (layout, pool)
    }

    #[test]
    fn test_build_writes_all_bindings() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let images = [vk::DescriptorImageInfo::default(); 2];

        let set = DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .write_images(1, &images)
            .build()
            .unwrap();

        let writes = headless.descriptor_writes(set);
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[1].descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
        assert_eq!(writes[1].resources.len(), 2);
        assert!(headless.violations().is_empty());
    }

    #[test]
    fn test_failed_allocation_writes_nothing() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let first = DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .build()
            .unwrap();

        let second = DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .build();
        assert!(second.is_none());
        assert_eq!(headless.descriptor_writes(first).len(), 1);
    }

    #[test]
    fn test_overwrite_existing_set() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let set = DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .build()
            .unwrap();

        DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .overwrite(set);
        assert_eq!(headless.descriptor_writes(set).len(), 2);
        assert_eq!(pool.live_sets(), 1);
    }

    #[test]
    fn test_write_after_reset_is_stale() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let set = DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .build()
            .unwrap();
        pool.reset().unwrap();

        DescriptorWriter::new(&layout, &mut pool)
            .write_buffer(0, buffer_info())
            .overwrite(set);
        assert_eq!(headless.violations(), vec![Violation::StaleDescriptorSet { set }]);
    }

    #[test]
    #[should_panic(expected = "does not contain binding 7")]
    fn test_missing_binding_panics() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let _ = DescriptorWriter::new(&layout, &mut pool).write_buffer(7, buffer_info());
    }

    #[test]
    #[should_panic(expected = "not a Image binding")]
    fn test_family_mismatch_panics() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let _ = DescriptorWriter::new(&layout, &mut pool)
            .write_image(0, vk::DescriptorImageInfo::default());
    }

    #[test]
    #[should_panic(expected = "expected a single one")]
    fn test_single_write_to_array_binding_panics() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let _ = DescriptorWriter::new(&layout, &mut pool)
            .write_image(1, vk::DescriptorImageInfo::default());
    }

    #[test]
    #[should_panic(expected = "holds 4 descriptors, got 5")]
    fn test_oversized_array_panics() {
        let headless = Arc::new(HeadlessEngine::new());
        let (layout, mut pool) = material_setup(&headless);
        let images = [vk::DescriptorImageInfo::default(); 5];
        let _ = DescriptorWriter::new(&layout, &mut pool).write_images(1, &images);
    }
}
