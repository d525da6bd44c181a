//! Per-frame data handed to render systems

use ash::vk;

use super::buffer::UniformBuffer;
use super::descriptors::{
    DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout, DescriptorSetLayoutBuilder,
    DescriptorWriter,
};
use super::engine::{EngineRef, PresentationEngine};
use super::error::{RenderError, RenderResult};
use super::ubo::GlobalUbo;
use crate::config::DescriptorConfig;
use crate::scene::{Camera, Scene};

/// Everything a render system may touch while a frame is being recorded
///
/// Built after `begin_frame` succeeds and dropped before `end_frame`.
pub struct FrameContext<'a> {
    /// Slot index in `0..frames_in_flight`
    pub frame_index: usize,
    /// Seconds since the previous tick
    pub frame_time: f32,
    /// Command buffer of the current slot
    pub command_buffer: vk::CommandBuffer,
    /// Global set bound at set 0
    pub global_descriptor_set: vk::DescriptorSet,
    /// Camera for this frame
    pub camera: &'a Camera,
    /// Objects to draw
    pub scene: &'a Scene,
}

/// A pass that records draw commands inside the swapchain render pass
pub trait RenderSystem {
    /// Record this system's commands into `frame.command_buffer`
    fn render(
        &mut self,
        engine: &dyn PresentationEngine,
        frame: &FrameContext<'_>,
    ) -> RenderResult<()>;
}

/// One global uniform buffer and descriptor set per frame slot
///
/// Slot `i` only writes buffer `i`, whose previous contents were consumed by
/// the frame that last waited on slot `i`'s fence.
pub struct GlobalFrameResources {
    // Sets die with the pool; the pool before the layout
    sets: Vec<vk::DescriptorSet>,
    buffers: Vec<UniformBuffer<GlobalUbo>>,
    pool: DescriptorPool,
    layout: DescriptorSetLayout,
}

impl GlobalFrameResources {
    /// Create buffers and sets for `frames_in_flight` slots
    pub fn new(
        engine: EngineRef,
        frames_in_flight: usize,
        config: &DescriptorConfig,
    ) -> RenderResult<Self> {
        let slots = u32::try_from(frames_in_flight).map_err(|_| {
            RenderError::InitializationFailed(format!("{frames_in_flight} frames in flight"))
        })?;
        let max_sets = slots * config.global_max_sets_per_frame;

        let layout = DescriptorSetLayoutBuilder::new(engine.clone())
            .add_uniform_buffer(0, vk::ShaderStageFlags::ALL_GRAPHICS)
            .build()?;
        let mut pool = DescriptorPoolBuilder::new(engine.clone())
            .set_max_sets(max_sets)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, max_sets)
            .build()?;

        let mut buffers = Vec::with_capacity(frames_in_flight);
        let mut sets = Vec::with_capacity(frames_in_flight);
        for _ in 0..frames_in_flight {
            let buffer = UniformBuffer::<GlobalUbo>::new(engine.clone())?;
            buffer.write(&GlobalUbo::default())?;
            let set = DescriptorWriter::new(&layout, &mut pool)
                .write_buffer(0, buffer.descriptor_info())
                .build()
                .ok_or(RenderError::ResourceCreation {
                    resource: "global descriptor set",
                    result: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
                })?;
            buffers.push(buffer);
            sets.push(set);
        }

        Ok(Self {
            sets,
            buffers,
            pool,
            layout,
        })
    }

    /// Upload this frame's uniform block
    pub fn update(&self, frame_index: usize, ubo: &GlobalUbo) -> RenderResult<()> {
        self.buffers[frame_index].write(ubo)
    }

    /// Global set for `frame_index`
    pub fn descriptor_set(&self, frame_index: usize) -> vk::DescriptorSet {
        self.sets[frame_index]
    }

    /// Uniform buffer behind `frame_index`'s set
    pub fn buffer(&self, frame_index: usize) -> &UniformBuffer<GlobalUbo> {
        &self.buffers[frame_index]
    }

    /// Layout of the global set
    pub fn layout(&self) -> &DescriptorSetLayout {
        &self.layout
    }

    /// Pool the global sets came from
    pub fn pool(&self) -> &DescriptorPool {
        &self.pool
    }
}
