//! Fixed-capacity descriptor pools

use std::collections::HashMap;

use ash::vk;

use super::layout::DescriptorSetLayout;
use crate::render::engine::EngineRef;
use crate::render::error::RenderResult;

/// Maximum sets when the builder is not told otherwise
pub const DEFAULT_MAX_SETS: u32 = 1000;

/// Builder for a [`DescriptorPool`]
pub struct DescriptorPoolBuilder {
    engine: EngineRef,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
    max_sets: u32,
    flags: vk::DescriptorPoolCreateFlags,
}

impl DescriptorPoolBuilder {
    /// Start a pool description with no quotas
    pub fn new(engine: EngineRef) -> Self {
        Self {
            engine,
            pool_sizes: Vec::new(),
            max_sets: DEFAULT_MAX_SETS,
            flags: vk::DescriptorPoolCreateFlags::empty(),
        }
    }

    /// Reserve `count` descriptors of `ty`
    pub fn add_pool_size(mut self, ty: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(vk::DescriptorPoolSize {
            ty,
            descriptor_count: count,
        });
        self
    }

    /// Cap the number of sets
    pub fn set_max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Pool creation flags
    pub fn set_pool_flags(mut self, flags: vk::DescriptorPoolCreateFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Create the pool
    pub fn build(self) -> RenderResult<DescriptorPool> {
        let pool = self
            .engine
            .create_descriptor_pool(self.max_sets, &self.pool_sizes, self.flags)?;

        let mut quotas = HashMap::new();
        for size in &self.pool_sizes {
            *quotas.entry(size.ty).or_insert(0) += size.descriptor_count;
        }
        log::debug!(
            "Created descriptor pool: {} sets, {} descriptor kinds",
            self.max_sets,
            quotas.len()
        );

        Ok(DescriptorPool {
            engine: self.engine,
            pool,
            max_sets: self.max_sets,
            quotas,
            usage: HashMap::new(),
            live_sets: 0,
        })
    }
}

/// Arena of descriptor sets
///
/// The pool keeps its own count of issued sets and descriptors so capacity is
/// honored even when the driver would hand out more. Sets are never freed one
/// by one; [`reset`](Self::reset) releases all of them.
pub struct DescriptorPool {
    engine: EngineRef,
    pool: vk::DescriptorPool,
    max_sets: u32,
    quotas: HashMap<vk::DescriptorType, u32>,
    usage: HashMap<vk::DescriptorType, u32>,
    live_sets: u32,
}

impl DescriptorPool {
    /// Allocate one set of `layout`
    ///
    /// Returns `None` when the pool is out of sets or of any descriptor kind
    /// the layout needs, or when the driver refuses. Earlier sets are
    /// unaffected.
    pub fn allocate(&mut self, layout: &DescriptorSetLayout) -> Option<vk::DescriptorSet> {
        if self.live_sets >= self.max_sets {
            log::warn!("Descriptor pool exhausted: {} of {} sets in use", self.live_sets, self.max_sets);
            return None;
        }

        let mut demand: HashMap<vk::DescriptorType, u32> = HashMap::new();
        for binding in layout.bindings() {
            *demand.entry(binding.descriptor_type).or_insert(0) += binding.count;
        }
        for (ty, needed) in &demand {
            let used = self.usage(*ty);
            let quota = self.quota(*ty);
            if used + needed > quota {
                log::warn!("Descriptor pool out of {ty:?}: {used} + {needed} exceeds {quota}");
                return None;
            }
        }

        let set = match self.engine.allocate_descriptor_set(self.pool, layout.handle()) {
            Ok(Some(set)) => set,
            Ok(None) => {
                log::warn!("Driver refused descriptor set allocation");
                return None;
            }
            Err(e) => {
                log::warn!("Descriptor set allocation failed: {e}");
                return None;
            }
        };

        self.live_sets += 1;
        for (ty, needed) in demand {
            *self.usage.entry(ty).or_insert(0) += needed;
        }
        Some(set)
    }

    /// Release every set allocated from this pool
    pub fn reset(&mut self) -> RenderResult<()> {
        self.engine.reset_descriptor_pool(self.pool)?;
        self.live_sets = 0;
        self.usage.clear();
        Ok(())
    }

    /// Same as [`reset`](Self::reset)
    pub fn free_all(&mut self) -> RenderResult<()> {
        self.reset()
    }

    /// Sets issued since creation or the last reset
    pub fn live_sets(&self) -> u32 {
        self.live_sets
    }

    /// Descriptors of `ty` issued since creation or the last reset
    pub fn usage(&self, ty: vk::DescriptorType) -> u32 {
        self.usage.get(&ty).copied().unwrap_or(0)
    }

    /// Descriptors of `ty` the pool was created with
    pub fn quota(&self, ty: vk::DescriptorType) -> u32 {
        self.quotas.get(&ty).copied().unwrap_or(0)
    }

    /// Set capacity
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }

    /// Get the pool handle
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    pub(crate) fn engine(&self) -> &EngineRef {
        &self.engine
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        self.engine.destroy_descriptor_pool(self.pool);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessEngine, ObjectKind};
    use crate::render::descriptors::DescriptorSetLayoutBuilder;
    use std::sync::Arc;

    fn ubo_layout(engine: &Arc<HeadlessEngine>) -> DescriptorSetLayout {
        DescriptorSetLayoutBuilder::new(engine.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_defaults() {
        let headless = Arc::new(HeadlessEngine::new());
        let pool = DescriptorPoolBuilder::new(headless.clone()).build().unwrap();
        assert_eq!(pool.max_sets(), DEFAULT_MAX_SETS);
        assert_eq!(pool.quota(vk::DescriptorType::UNIFORM_BUFFER), 0);
        drop(pool);
        assert_eq!(headless.live_count(ObjectKind::DescriptorPool), 0);
    }

    #[test]
    fn test_set_capacity_is_enforced() {
        let headless = Arc::new(HeadlessEngine::new());
        let layout = ubo_layout(&headless);
        let mut pool = DescriptorPoolBuilder::new(headless.clone())
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 10)
            .set_max_sets(2)
            .build()
            .unwrap();

        let first = pool.allocate(&layout).unwrap();
        let second = pool.allocate(&layout).unwrap();
        assert_ne!(first, second);
        assert!(pool.allocate(&layout).is_none());
        assert_eq!(pool.live_sets(), 2);
        assert_eq!(pool.usage(vk::DescriptorType::UNIFORM_BUFFER), 2);
    }

    #[test]
    fn test_kind_quota_is_enforced() {
        let headless = Arc::new(HeadlessEngine::new());
        let layout = DescriptorSetLayoutBuilder::new(headless.clone())
            .add_binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                3,
            )
            .build()
            .unwrap();
        let mut pool = DescriptorPoolBuilder::new(headless.clone())
            .add_pool_size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 5)
            .set_max_sets(10)
            .build()
            .unwrap();

        assert!(pool.allocate(&layout).is_some());
        assert!(pool.allocate(&layout).is_none());
        assert_eq!(pool.usage(vk::DescriptorType::COMBINED_IMAGE_SAMPLER), 3);
    }

    #[test]
    fn test_accounting_holds_with_lenient_driver() {
        let headless = Arc::new(HeadlessEngine::new());
        headless.set_lenient_descriptor_pools(true);
        let layout = ubo_layout(&headless);
        let mut pool = DescriptorPoolBuilder::new(headless.clone())
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 1)
            .set_max_sets(1)
            .build()
            .unwrap();

        assert!(pool.allocate(&layout).is_some());
        assert!(pool.allocate(&layout).is_none());
        assert_eq!(pool.live_sets(), 1);
    }

    #[test]
    fn test_reset_restores_capacity() {
        let headless = Arc::new(HeadlessEngine::new());
        let layout = ubo_layout(&headless);
        let mut pool = DescriptorPoolBuilder::new(headless.clone())
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 1)
            .set_max_sets(1)
            .build()
            .unwrap();

        assert!(pool.allocate(&layout).is_some());
        assert!(pool.allocate(&layout).is_none());
        pool.free_all().unwrap();
        assert_eq!(pool.live_sets(), 0);
        assert!(pool.allocate(&layout).is_some());
    }
}
