//! Descriptor set layouts

use std::collections::BTreeMap;

use ash::vk;

use crate::render::engine::{EngineRef, LayoutBinding};
use crate::render::error::RenderResult;

/// Builder collecting bindings for a [`DescriptorSetLayout`]
pub struct DescriptorSetLayoutBuilder {
    engine: EngineRef,
    bindings: BTreeMap<u32, LayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Start an empty layout
    pub fn new(engine: EngineRef) -> Self {
        Self {
            engine,
            bindings: BTreeMap::new(),
        }
    }

    /// Add a binding
    ///
    /// # Panics
    /// If `binding` is already in use.
    pub fn add_binding(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stage_flags: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        assert!(
            !self.bindings.contains_key(&binding),
            "Binding {binding} already in use"
        );
        self.bindings.insert(
            binding,
            LayoutBinding {
                binding,
                descriptor_type,
                stage_flags,
                count,
            },
        );
        self
    }

    /// Add a single uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(binding, vk::DescriptorType::UNIFORM_BUFFER, stage_flags, 1)
    }

    /// Add a single combined image sampler binding
    pub fn add_combined_image_sampler(self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.add_binding(
            binding,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            stage_flags,
            1,
        )
    }

    /// Create the layout
    pub fn build(self) -> RenderResult<DescriptorSetLayout> {
        let bindings: Vec<LayoutBinding> = self.bindings.values().copied().collect();
        let layout = self.engine.create_descriptor_set_layout(&bindings)?;
        log::debug!("Created descriptor set layout with {} bindings", bindings.len());

        Ok(DescriptorSetLayout {
            engine: self.engine,
            layout,
            bindings: self.bindings,
        })
    }
}

/// Immutable descriptor set layout
pub struct DescriptorSetLayout {
    engine: EngineRef,
    layout: vk::DescriptorSetLayout,
    bindings: BTreeMap<u32, LayoutBinding>,
}

impl DescriptorSetLayout {
    /// Get the layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Binding description for `binding`, if declared
    pub fn binding(&self, binding: u32) -> Option<&LayoutBinding> {
        self.bindings.get(&binding)
    }

    /// Bindings in index order
    pub fn bindings(&self) -> impl Iterator<Item = &LayoutBinding> {
        self.bindings.values()
    }

    /// Descriptors of `ty` consumed by one set of this layout
    pub fn descriptor_demand(&self, ty: vk::DescriptorType) -> u32 {
        self.bindings
            .values()
            .filter(|b| b.descriptor_type == ty)
            .map(|b| b.count)
            .sum()
    }

    pub(crate) fn engine(&self) -> &EngineRef {
        &self.engine
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.engine.destroy_descriptor_set_layout(self.layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessEngine, ObjectKind};
    use std::sync::Arc;

    #[test]
    fn test_bindings_are_ordered_by_index() {
        let headless = Arc::new(HeadlessEngine::new());
        let layout = DescriptorSetLayoutBuilder::new(headless.clone())
            .add_combined_image_sampler(2, vk::ShaderStageFlags::FRAGMENT)
            .add_uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .add_binding(1, vk::DescriptorType::SAMPLED_IMAGE, vk::ShaderStageFlags::FRAGMENT, 4)
            .build()
            .unwrap();

        let indices: Vec<u32> = layout.bindings().map(|b| b.binding).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(layout.binding(1).unwrap().count, 4);
        assert!(layout.binding(3).is_none());
        assert_eq!(layout.descriptor_demand(vk::DescriptorType::SAMPLED_IMAGE), 4);

        drop(layout);
        assert_eq!(headless.live_count(ObjectKind::DescriptorSetLayout), 0);
    }

    #[test]
    #[should_panic(expected = "already in use")]
    fn test_duplicate_binding_panics() {
        let headless = Arc::new(HeadlessEngine::new());
        let _ = DescriptorSetLayoutBuilder::new(headless)
            .add_uniform_buffer(0, vk::ShaderStageFlags::VERTEX)
            .add_uniform_buffer(0, vk::ShaderStageFlags::FRAGMENT);
    }
}
