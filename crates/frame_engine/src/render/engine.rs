//! Presentation engine abstraction
//!
//! Everything the frame core needs from a GPU device: surface queries, object
//! creation and destruction, command recording, queue submission and
//! presentation. The trait is object safe so the core can share one engine
//! as [`EngineRef`] across every RAII wrapper it owns.

use std::sync::Arc;

use ash::vk;

use super::error::RenderResult;

/// Shared handle to the active engine
pub type EngineRef = Arc<dyn PresentationEngine>;

/// Surface properties reported by the device
#[derive(Debug, Clone)]
pub struct SurfaceSupport {
    /// Capabilities (extent limits, image count limits, transform)
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported color formats
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters for swapchain creation
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    /// Minimum number of presentable images
    pub min_image_count: u32,
    /// Color format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Present mode
    pub present_mode: vk::PresentModeKHR,
    /// Surface transform to apply
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
    /// Chain being replaced, or null
    pub old_swapchain: vk::SwapchainKHR,
}

/// Result of an image acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready to be rendered into
    Acquired {
        /// Index of the presentable image
        index: u32,
        /// The chain still works but no longer matches the surface exactly
        suboptimal: bool,
    },
    /// The chain no longer matches the surface and must be rebuilt
    OutOfDate,
}

/// Result of a present request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Image queued for presentation
    Presented,
    /// Image queued, chain should be rebuilt
    Suboptimal,
    /// Chain no longer matches the surface
    OutOfDate,
}

impl PresentOutcome {
    /// Whether the outcome asks for a rebuild
    pub const fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Presented)
    }
}

/// One queue submission
#[derive(Debug, Clone, Copy)]
pub struct SubmitDesc {
    /// Command buffer to execute
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore waited before the wait stage
    pub wait_semaphore: vk::Semaphore,
    /// Pipeline stage gated by `wait_semaphore`
    pub wait_stage: vk::PipelineStageFlags,
    /// Semaphore signaled when the work completes
    pub signal_semaphore: vk::Semaphore,
    /// Fence signaled when the work completes
    pub fence: vk::Fence,
}

/// Render pass begin parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPassBeginDesc {
    /// Render pass to begin
    pub render_pass: vk::RenderPass,
    /// Target framebuffer
    pub framebuffer: vk::Framebuffer,
    /// Render area extent (offset is always zero)
    pub extent: vk::Extent2D,
    /// Clear value for attachment 0
    pub clear_color: [f32; 4],
    /// Depth clear value for attachment 1
    pub clear_depth: f32,
    /// Stencil clear value for attachment 1
    pub clear_stencil: u32,
}

/// One binding of a descriptor set layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    /// Binding index
    pub binding: u32,
    /// Descriptor type
    pub descriptor_type: vk::DescriptorType,
    /// Shader stages that can access the binding
    pub stage_flags: vk::ShaderStageFlags,
    /// Array element count
    pub count: u32,
}

/// Resources written into one binding
#[derive(Debug, Clone)]
pub enum DescriptorResources {
    /// Buffer-backed descriptors
    Buffers(Vec<vk::DescriptorBufferInfo>),
    /// Image-backed descriptors
    Images(Vec<vk::DescriptorImageInfo>),
}

impl DescriptorResources {
    /// Number of array elements written
    pub fn len(&self) -> usize {
        match self {
            Self::Buffers(infos) => infos.len(),
            Self::Images(infos) => infos.len(),
        }
    }

    /// Whether nothing is written
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One descriptor write
#[derive(Debug, Clone)]
pub struct DescriptorWrite {
    /// Destination binding
    pub binding: u32,
    /// Type declared by the layout for that binding
    pub descriptor_type: vk::DescriptorType,
    /// Resources to write, starting at array element 0
    pub resources: DescriptorResources,
}

/// GPU device abstraction consumed by the frame core
pub trait PresentationEngine {
    /// Short backend name for logging
    fn name(&self) -> &'static str;

    // Surface

    /// Query formats, present modes and capabilities of the surface
    fn surface_support(&self) -> RenderResult<SurfaceSupport>;

    /// Whether `format` can serve as an optimal-tiling depth attachment
    fn supports_depth_format(&self, format: vk::Format) -> bool;

    // Swapchain

    /// Create a swapchain
    fn create_swapchain(&self, desc: &SwapchainDesc) -> RenderResult<vk::SwapchainKHR>;

    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Presentable images of a swapchain, in index order
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>>;

    // Images and attachments

    /// Create a 2D image view
    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> RenderResult<vk::ImageView>;

    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Create a device-local depth image with bound memory
    fn create_depth_image(
        &self,
        extent: vk::Extent2D,
        format: vk::Format,
    ) -> RenderResult<(vk::Image, vk::DeviceMemory)>;

    /// Destroy an image and free its memory
    fn destroy_image(&self, image: vk::Image, memory: vk::DeviceMemory);

    /// Create a single-subpass render pass with one color and one depth attachment
    fn create_render_pass(
        &self,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RenderResult<vk::RenderPass>;

    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Create a framebuffer
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // Command buffers

    /// Allocate primary command buffers from the engine's resettable pool
    fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>>;

    /// Return command buffers to the pool
    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]);

    /// Begin recording (implicitly resets the buffer)
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()>;

    /// Record a render pass begin with inline subpass contents
    fn cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, desc: &RenderPassBeginDesc);

    /// Record a render pass end
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Record a dynamic viewport
    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport);

    /// Record a dynamic scissor
    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D);

    /// Record a non-indexed draw
    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );

    // Synchronization

    /// Create a binary semaphore
    fn create_semaphore(&self) -> RenderResult<vk::Semaphore>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Create a fence, optionally already signaled
    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);

    /// Block until `fence` signals or `timeout_ns` elapses
    fn wait_for_fence(&self, fence: vk::Fence, timeout_ns: u64) -> RenderResult<()>;

    /// Return a fence to the unsignaled state
    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()>;

    // Queues

    /// Acquire the next presentable image, signaling `semaphore` when ready
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> RenderResult<AcquireOutcome>;

    /// Submit to the graphics queue
    fn queue_submit(&self, desc: &SubmitDesc) -> RenderResult<()>;

    /// Present `image_index` once `wait_semaphore` signals
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RenderResult<PresentOutcome>;

    /// Block until the device has no outstanding work
    fn device_wait_idle(&self) -> RenderResult<()>;

    // Descriptors

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> RenderResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a descriptor pool
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        flags: vk::DescriptorPoolCreateFlags,
    ) -> RenderResult<vk::DescriptorPool>;

    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Release every set allocated from `pool`
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RenderResult<()>;

    /// Allocate one set; `Ok(None)` when the pool is exhausted or fragmented
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<Option<vk::DescriptorSet>>;

    /// Apply writes to a set
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]);

    // Buffers

    /// Create a host-visible, host-coherent buffer with bound memory
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> RenderResult<(vk::Buffer, vk::DeviceMemory)>;

    /// Copy `data` into host-visible memory at `offset`
    fn write_buffer(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> RenderResult<()>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_outcome_rebuild_signal() {
        assert!(!PresentOutcome::Presented.needs_rebuild());
        assert!(PresentOutcome::Suboptimal.needs_rebuild());
        assert!(PresentOutcome::OutOfDate.needs_rebuild());
    }

    #[test]
    fn test_descriptor_resources_len() {
        let buffers = DescriptorResources::Buffers(vec![vk::DescriptorBufferInfo::default(); 3]);
        assert_eq!(buffers.len(), 3);
        assert!(DescriptorResources::Images(Vec::new()).is_empty());
    }
}
