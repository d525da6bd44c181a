//! Headless presentation engine
//!
//! A simulated device that implements [`PresentationEngine`] without a GPU.
//! It hands out unique handles, tracks every live object, records the
//! commands and descriptor writes it receives, and checks the frame protocol
//! as it goes. Anything a validation layer would reject is logged as a
//! [`Violation`] instead of being silently accepted.
//!
//! ## GPU model
//!
//! Submitted work stays pending until someone waits for its fence or the
//! device goes idle; only then does the fence signal. That makes CPU
//! run-ahead directly observable: the number of pending submissions is the
//! number of frames in flight.

mod surface;

pub use surface::ScriptedSurface;

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use ash::vk::{self, Handle};

use crate::render::engine::{
    AcquireOutcome, DescriptorWrite, LayoutBinding, PresentOutcome, PresentationEngine,
    RenderPassBeginDesc, SubmitDesc, SurfaceSupport, SwapchainDesc,
};
use crate::render::error::{RenderError, RenderResult};

/// Default bound on pending submissions before a violation is logged
pub const DEFAULT_FRAMES_IN_FLIGHT_LIMIT: usize = 2;

/// Number of recent events the engine keeps; older ones are dropped
pub const EVENT_LOG_CAPACITY: usize = 4096;

/// Largest extent the simulated surface accepts
pub const MAX_SURFACE_EXTENT: u32 = 16384;

/// Kinds of objects tracked by the headless engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Swapchain
    Swapchain,
    /// Image view
    ImageView,
    /// Depth image
    Image,
    /// Render pass
    RenderPass,
    /// Framebuffer
    Framebuffer,
    /// Command buffer
    CommandBuffer,
    /// Semaphore
    Semaphore,
    /// Fence
    Fence,
    /// Descriptor set layout
    DescriptorSetLayout,
    /// Descriptor pool
    DescriptorPool,
    /// Buffer
    Buffer,
}

/// Protocol breaches detected by the headless engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
    /// A command buffer was begun while a submission using it is still pending
    CommandBufferInUse {
        /// Offending command buffer
        command_buffer: vk::CommandBuffer,
    },
    /// A fence was submitted without being reset first
    FenceSubmittedSignaled {
        /// Offending fence
        fence: vk::Fence,
    },
    /// A fence was reset while its submission is still pending
    FenceResetWhilePending {
        /// Offending fence
        fence: vk::Fence,
    },
    /// A fence was waited that nothing will ever signal
    WaitOnUnsubmittedFence {
        /// Offending fence
        fence: vk::Fence,
    },
    /// An acquire reused a semaphore that was signaled but never waited
    SemaphoreReacquired {
        /// Offending semaphore
        semaphore: vk::Semaphore,
    },
    /// A submission or present waited on a semaphore nothing signaled
    WaitOnUnsignaledSemaphore {
        /// Offending semaphore
        semaphore: vk::Semaphore,
    },
    /// More submissions pending than the configured frames-in-flight limit
    TooManyInFlight {
        /// Pending submissions after the offending submit
        pending: usize,
        /// Configured limit
        limit: usize,
    },
    /// An object referenced by pending GPU work was destroyed
    DestroyedWhileInFlight {
        /// Kind of the destroyed object
        kind: ObjectKind,
        /// Raw handle
        raw: u64,
    },
    /// Destroying or using a handle that is not live
    UnknownObject {
        /// Expected kind
        kind: ObjectKind,
        /// Raw handle
        raw: u64,
    },
    /// Recording into a command buffer that is not in the recording state
    NotRecording {
        /// Offending command buffer
        command_buffer: vk::CommandBuffer,
    },
    /// Writing a descriptor set whose pool was reset or destroyed
    StaleDescriptorSet {
        /// Offending set
        set: vk::DescriptorSet,
    },
}

/// Observable engine activity, in call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// A swapchain was created
    SwapchainCreated {
        /// New handle
        swapchain: vk::SwapchainKHR,
        /// Handle passed as the retired chain
        old_swapchain: vk::SwapchainKHR,
        /// Image extent
        extent: vk::Extent2D,
        /// Image count
        image_count: u32,
    },
    /// A swapchain was destroyed
    SwapchainDestroyed {
        /// Destroyed handle
        swapchain: vk::SwapchainKHR,
    },
    /// The device was drained
    DeviceWaitIdle,
    /// A fence wait returned
    FenceWait {
        /// Waited fence
        fence: vk::Fence,
        /// Submissions still pending afterwards
        pending: usize,
    },
    /// An image acquisition was attempted
    Acquire {
        /// Target chain
        swapchain: vk::SwapchainKHR,
        /// Reported result
        outcome: AcquireOutcome,
    },
    /// Command buffer recording began
    CommandBufferBegin {
        /// Command buffer
        command_buffer: vk::CommandBuffer,
    },
    /// Work was submitted
    Submit {
        /// Command buffer
        command_buffer: vk::CommandBuffer,
        /// Fence signaled on completion
        fence: vk::Fence,
        /// Submissions pending afterwards
        pending: usize,
    },
    /// An image was presented
    Present {
        /// Target chain
        swapchain: vk::SwapchainKHR,
        /// Presented index
        image_index: u32,
        /// Reported result
        outcome: PresentOutcome,
    },
}

/// Commands recorded into a command buffer
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCommand {
    /// Render pass begin
    BeginRenderPass(RenderPassBeginDesc),
    /// Render pass end
    EndRenderPass,
    /// Viewport `[x, y, width, height, min_depth, max_depth]`
    SetViewport([f32; 6]),
    /// Scissor offset and extent
    SetScissor {
        /// Offset
        offset: (i32, i32),
        /// Extent
        extent: vk::Extent2D,
    },
    /// Non-indexed draw
    Draw {
        /// Vertex count
        vertex_count: u32,
        /// Instance count
        instance_count: u32,
    },
}

/// Scripted non-success result for acquire or present
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptedResult {
    /// Report `OutOfDate`
    OutOfDate,
    /// Report suboptimal
    Suboptimal,
}

struct SwapchainState {
    images: Vec<vk::Image>,
    next_image: u32,
}

struct CommandBufferState {
    recording: bool,
    commands: Vec<RecordedCommand>,
}

struct PendingSubmit {
    command_buffer: vk::CommandBuffer,
    fence: vk::Fence,
    signal_semaphore: vk::Semaphore,
}

struct PoolState {
    max_sets: u32,
    quotas: HashMap<vk::DescriptorType, u32>,
    used_sets: u32,
    used: HashMap<vk::DescriptorType, u32>,
}

struct SetState {
    pool: vk::DescriptorPool,
    live: bool,
    writes: Vec<DescriptorWrite>,
}

struct HeadlessState {
    next_handle: u64,
    live: HashMap<u64, ObjectKind>,
    events: VecDeque<EngineEvent>,
    violations: Vec<Violation>,

    // Surface configuration
    surface_formats: Vec<vk::SurfaceFormatKHR>,
    present_modes: Vec<vk::PresentModeKHR>,
    depth_formats: Vec<vk::Format>,
    min_image_count: u32,
    max_image_count: u32,
    current_extent: Option<vk::Extent2D>,
    frames_in_flight_limit: usize,
    lenient_descriptor_pools: bool,
    acquire_script: VecDeque<ScriptedResult>,
    present_script: VecDeque<ScriptedResult>,
    fail_next_swapchain: Option<vk::Result>,

    // Object state
    swapchains: HashMap<vk::SwapchainKHR, SwapchainState>,
    command_buffers: HashMap<vk::CommandBuffer, CommandBufferState>,
    fences: HashMap<vk::Fence, bool>,
    pending_semaphores: HashMap<vk::Semaphore, bool>,
    pending: Vec<PendingSubmit>,
    layouts: HashMap<vk::DescriptorSetLayout, Vec<LayoutBinding>>,
    pools: HashMap<vk::DescriptorPool, PoolState>,
    sets: HashMap<vk::DescriptorSet, SetState>,
    memory: HashMap<vk::DeviceMemory, Vec<u8>>,
}

impl HeadlessState {
    fn new() -> Self {
        Self {
            next_handle: 1,
            live: HashMap::new(),
            events: VecDeque::new(),
            violations: Vec::new(),
            surface_formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
            depth_formats: vec![vk::Format::D32_SFLOAT],
            min_image_count: 2,
            max_image_count: 3,
            current_extent: None,
            frames_in_flight_limit: DEFAULT_FRAMES_IN_FLIGHT_LIMIT,
            lenient_descriptor_pools: false,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            fail_next_swapchain: None,
            swapchains: HashMap::new(),
            command_buffers: HashMap::new(),
            fences: HashMap::new(),
            pending_semaphores: HashMap::new(),
            pending: Vec::new(),
            layouts: HashMap::new(),
            pools: HashMap::new(),
            sets: HashMap::new(),
            memory: HashMap::new(),
        }
    }

    fn alloc<H: Handle>(&mut self, kind: ObjectKind) -> H {
        let raw = self.next_handle;
        self.next_handle += 1;
        self.live.insert(raw, kind);
        H::from_raw(raw)
    }

    fn alloc_untracked<H: Handle>(&mut self) -> H {
        let raw = self.next_handle;
        self.next_handle += 1;
        H::from_raw(raw)
    }

    fn release(&mut self, kind: ObjectKind, raw: u64) -> bool {
        if raw == 0 {
            return false;
        }
        if self.live.get(&raw) == Some(&kind) {
            self.live.remove(&raw);
            true
        } else {
            self.violations.push(Violation::UnknownObject { kind, raw });
            false
        }
    }

    fn is_live(&self, kind: ObjectKind, raw: u64) -> bool {
        self.live.get(&raw) == Some(&kind)
    }

    fn complete(&mut self, index: usize) {
        let submit = self.pending.remove(index);
        self.fences.insert(submit.fence, true);
    }

    fn framebuffer_in_flight(&self, framebuffer: vk::Framebuffer) -> bool {
        self.pending.iter().any(|submit| {
            self.command_buffers
                .get(&submit.command_buffer)
                .is_some_and(|state| {
                    state.commands.iter().any(|command| {
                        matches!(command, RecordedCommand::BeginRenderPass(desc) if desc.framebuffer == framebuffer)
                    })
                })
        })
    }

    fn log_event(&mut self, event: EngineEvent) {
        if self.events.len() == EVENT_LOG_CAPACITY {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    fn record(&mut self, command_buffer: vk::CommandBuffer, command: RecordedCommand) {
        match self.command_buffers.get_mut(&command_buffer) {
            Some(state) if state.recording => state.commands.push(command),
            _ => self
                .violations
                .push(Violation::NotRecording { command_buffer }),
        }
    }

    fn consume_semaphore(&mut self, semaphore: vk::Semaphore) {
        match self.pending_semaphores.get_mut(&semaphore) {
            Some(pending) if *pending => *pending = false,
            _ => self
                .violations
                .push(Violation::WaitOnUnsignaledSemaphore { semaphore }),
        }
    }
}

/// Simulated GPU device
pub struct HeadlessEngine {
    state: Mutex<HeadlessState>,
}

impl Default for HeadlessEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessEngine {
    /// Create an engine reporting an sRGB surface, FIFO + MAILBOX, D32 depth
    /// and 2..=3 images
    pub fn new() -> Self {
        Self {
            state: Mutex::new(HeadlessState::new()),
        }
    }

    /// Create an engine that allows `limit` pending submissions
    pub fn with_frames_in_flight(limit: usize) -> Self {
        let engine = Self::new();
        engine.set_frames_in_flight_limit(limit);
        engine
    }

    fn state(&self) -> MutexGuard<'_, HeadlessState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // Configuration

    /// Replace the reported surface formats
    pub fn set_surface_formats(&self, formats: Vec<vk::SurfaceFormatKHR>) {
        self.state().surface_formats = formats;
    }

    /// Replace the reported present modes
    pub fn set_present_modes(&self, modes: Vec<vk::PresentModeKHR>) {
        self.state().present_modes = modes;
    }

    /// Replace the formats usable as depth attachments
    pub fn set_depth_formats(&self, formats: Vec<vk::Format>) {
        self.state().depth_formats = formats;
    }

    /// Set the surface image count limits (`max == 0` means unbounded)
    pub fn set_image_count_range(&self, min: u32, max: u32) {
        let mut state = self.state();
        state.min_image_count = min;
        state.max_image_count = max;
    }

    /// Fix the surface's current extent; `None` lets the swapchain decide
    pub fn set_current_extent(&self, extent: Option<vk::Extent2D>) {
        self.state().current_extent = extent;
    }

    /// Bound on pending submissions before a violation is logged
    pub fn set_frames_in_flight_limit(&self, limit: usize) {
        self.state().frames_in_flight_limit = limit;
    }

    /// Stop the simulated driver from refusing descriptor allocations
    pub fn set_lenient_descriptor_pools(&self, lenient: bool) {
        self.state().lenient_descriptor_pools = lenient;
    }

    /// Queue a result for an upcoming acquire
    pub fn push_acquire_result(&self, result: ScriptedResult) {
        self.state().acquire_script.push_back(result);
    }

    /// Queue a result for an upcoming present
    pub fn push_present_result(&self, result: ScriptedResult) {
        self.state().present_script.push_back(result);
    }

    /// Make the next swapchain creation fail with `result`
    pub fn fail_next_swapchain_creation(&self, result: vk::Result) {
        self.state().fail_next_swapchain = Some(result);
    }

    // Inspection

    /// The most recent events, oldest first, at most [`EVENT_LOG_CAPACITY`]
    pub fn events(&self) -> Vec<EngineEvent> {
        self.state().events.iter().cloned().collect()
    }

    /// Forget recorded events
    pub fn clear_events(&self) {
        self.state().events.clear();
    }

    /// Every protocol violation recorded so far
    pub fn violations(&self) -> Vec<Violation> {
        self.state().violations.clone()
    }

    /// Number of live objects of `kind`
    pub fn live_count(&self, kind: ObjectKind) -> usize {
        self.state().live.values().filter(|k| **k == kind).count()
    }

    /// Number of live objects of any kind
    pub fn live_total(&self) -> usize {
        self.state().live.len()
    }

    /// Whether a fence is signaled
    pub fn is_fence_signaled(&self, fence: vk::Fence) -> bool {
        self.state().fences.get(&fence).copied().unwrap_or(false)
    }

    /// Submissions the simulated GPU has not finished
    pub fn pending_submissions(&self) -> usize {
        self.state().pending.len()
    }

    /// Commands recorded into `command_buffer` since its last begin
    pub fn recorded_commands(&self, command_buffer: vk::CommandBuffer) -> Vec<RecordedCommand> {
        self.state()
            .command_buffers
            .get(&command_buffer)
            .map(|state| state.commands.clone())
            .unwrap_or_default()
    }

    /// Writes applied to `set` since it was allocated
    pub fn descriptor_writes(&self, set: vk::DescriptorSet) -> Vec<DescriptorWrite> {
        self.state()
            .sets
            .get(&set)
            .map(|state| state.writes.clone())
            .unwrap_or_default()
    }

    /// Contents of a host-visible allocation
    pub fn buffer_contents(&self, memory: vk::DeviceMemory) -> Vec<u8> {
        self.state().memory.get(&memory).cloned().unwrap_or_default()
    }
}

impl PresentationEngine for HeadlessEngine {
    fn name(&self) -> &'static str {
        "headless"
    }

    fn surface_support(&self) -> RenderResult<SurfaceSupport> {
        let state = self.state();
        let capabilities = vk::SurfaceCapabilitiesKHR {
            min_image_count: state.min_image_count,
            max_image_count: state.max_image_count,
            current_extent: state.current_extent.unwrap_or(vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            }),
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D {
                width: MAX_SURFACE_EXTENT,
                height: MAX_SURFACE_EXTENT,
            },
            max_image_array_layers: 1,
            supported_transforms: vk::SurfaceTransformFlagsKHR::IDENTITY,
            current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
            supported_composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
            supported_usage_flags: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        };
        Ok(SurfaceSupport {
            capabilities,
            formats: state.surface_formats.clone(),
            present_modes: state.present_modes.clone(),
        })
    }

    fn supports_depth_format(&self, format: vk::Format) -> bool {
        self.state().depth_formats.contains(&format)
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> RenderResult<vk::SwapchainKHR> {
        let mut state = self.state();
        if let Some(result) = state.fail_next_swapchain.take() {
            return Err(RenderError::ResourceCreation {
                resource: "swapchain",
                result,
            });
        }
        if desc.old_swapchain != vk::SwapchainKHR::null()
            && !state.is_live(ObjectKind::Swapchain, desc.old_swapchain.as_raw())
        {
            state.violations.push(Violation::UnknownObject {
                kind: ObjectKind::Swapchain,
                raw: desc.old_swapchain.as_raw(),
            });
        }

        let swapchain: vk::SwapchainKHR = state.alloc(ObjectKind::Swapchain);
        let images: Vec<vk::Image> = (0..desc.min_image_count)
            .map(|_| state.alloc_untracked())
            .collect();
        state.swapchains.insert(
            swapchain,
            SwapchainState {
                images,
                next_image: 0,
            },
        );
        state.log_event(EngineEvent::SwapchainCreated {
            swapchain,
            old_swapchain: desc.old_swapchain,
            extent: desc.extent,
            image_count: desc.min_image_count,
        });
        Ok(swapchain)
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        let mut state = self.state();
        if state.release(ObjectKind::Swapchain, swapchain.as_raw()) {
            state.swapchains.remove(&swapchain);
            state.log_event(EngineEvent::SwapchainDestroyed { swapchain });
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> RenderResult<Vec<vk::Image>> {
        self.state()
            .swapchains
            .get(&swapchain)
            .map(|chain| chain.images.clone())
            .ok_or(RenderError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> RenderResult<vk::ImageView> {
        Ok(self.state().alloc(ObjectKind::ImageView))
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.state().release(ObjectKind::ImageView, view.as_raw());
    }

    fn create_depth_image(
        &self,
        _extent: vk::Extent2D,
        format: vk::Format,
    ) -> RenderResult<(vk::Image, vk::DeviceMemory)> {
        let mut state = self.state();
        if !state.depth_formats.contains(&format) {
            return Err(RenderError::ResourceCreation {
                resource: "depth image",
                result: vk::Result::ERROR_FORMAT_NOT_SUPPORTED,
            });
        }
        let image = state.alloc(ObjectKind::Image);
        let memory = state.alloc_untracked();
        Ok((image, memory))
    }

    fn destroy_image(&self, image: vk::Image, _memory: vk::DeviceMemory) {
        self.state().release(ObjectKind::Image, image.as_raw());
    }

    fn create_render_pass(
        &self,
        _color_format: vk::Format,
        _depth_format: vk::Format,
    ) -> RenderResult<vk::RenderPass> {
        Ok(self.state().alloc(ObjectKind::RenderPass))
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.state()
            .release(ObjectKind::RenderPass, render_pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> RenderResult<vk::Framebuffer> {
        Ok(self.state().alloc(ObjectKind::Framebuffer))
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        let mut state = self.state();
        if state.framebuffer_in_flight(framebuffer) {
            state.violations.push(Violation::DestroyedWhileInFlight {
                kind: ObjectKind::Framebuffer,
                raw: framebuffer.as_raw(),
            });
        }
        state.release(ObjectKind::Framebuffer, framebuffer.as_raw());
    }

    fn allocate_command_buffers(&self, count: u32) -> RenderResult<Vec<vk::CommandBuffer>> {
        let mut state = self.state();
        let buffers: Vec<vk::CommandBuffer> = (0..count)
            .map(|_| state.alloc(ObjectKind::CommandBuffer))
            .collect();
        for buffer in &buffers {
            state.command_buffers.insert(
                *buffer,
                CommandBufferState {
                    recording: false,
                    commands: Vec::new(),
                },
            );
        }
        Ok(buffers)
    }

    fn free_command_buffers(&self, command_buffers: &[vk::CommandBuffer]) {
        let mut state = self.state();
        for buffer in command_buffers {
            if state.pending.iter().any(|p| p.command_buffer == *buffer) {
                state.violations.push(Violation::DestroyedWhileInFlight {
                    kind: ObjectKind::CommandBuffer,
                    raw: buffer.as_raw(),
                });
            }
            if state.release(ObjectKind::CommandBuffer, buffer.as_raw()) {
                state.command_buffers.remove(buffer);
            }
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let mut state = self.state();
        if state
            .pending
            .iter()
            .any(|p| p.command_buffer == command_buffer)
        {
            state
                .violations
                .push(Violation::CommandBufferInUse { command_buffer });
        }
        match state.command_buffers.get_mut(&command_buffer) {
            Some(buffer) => {
                buffer.recording = true;
                buffer.commands.clear();
            }
            None => {
                state.violations.push(Violation::UnknownObject {
                    kind: ObjectKind::CommandBuffer,
                    raw: command_buffer.as_raw(),
                });
                return Err(RenderError::Api(vk::Result::ERROR_UNKNOWN));
            }
        }
        state.log_event(EngineEvent::CommandBufferBegin { command_buffer });
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        let mut state = self.state();
        match state.command_buffers.get_mut(&command_buffer) {
            Some(buffer) if buffer.recording => {
                buffer.recording = false;
                Ok(())
            }
            _ => {
                state
                    .violations
                    .push(Violation::NotRecording { command_buffer });
                Err(RenderError::Api(vk::Result::ERROR_UNKNOWN))
            }
        }
    }

    fn cmd_begin_render_pass(&self, command_buffer: vk::CommandBuffer, desc: &RenderPassBeginDesc) {
        self.state()
            .record(command_buffer, RecordedCommand::BeginRenderPass(*desc));
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.state()
            .record(command_buffer, RecordedCommand::EndRenderPass);
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        self.state().record(
            command_buffer,
            RecordedCommand::SetViewport([
                viewport.x,
                viewport.y,
                viewport.width,
                viewport.height,
                viewport.min_depth,
                viewport.max_depth,
            ]),
        );
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.state().record(
            command_buffer,
            RecordedCommand::SetScissor {
                offset: (scissor.offset.x, scissor.offset.y),
                extent: scissor.extent,
            },
        );
    }

    fn cmd_draw(
        &self,
        command_buffer: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        _first_vertex: u32,
        _first_instance: u32,
    ) {
        self.state().record(
            command_buffer,
            RecordedCommand::Draw {
                vertex_count,
                instance_count,
            },
        );
    }

    fn create_semaphore(&self) -> RenderResult<vk::Semaphore> {
        let mut state = self.state();
        let semaphore = state.alloc(ObjectKind::Semaphore);
        state.pending_semaphores.insert(semaphore, false);
        Ok(semaphore)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        let mut state = self.state();
        if state.pending.iter().any(|p| p.signal_semaphore == semaphore) {
            state.violations.push(Violation::DestroyedWhileInFlight {
                kind: ObjectKind::Semaphore,
                raw: semaphore.as_raw(),
            });
        }
        if state.release(ObjectKind::Semaphore, semaphore.as_raw()) {
            state.pending_semaphores.remove(&semaphore);
        }
    }

    fn create_fence(&self, signaled: bool) -> RenderResult<vk::Fence> {
        let mut state = self.state();
        let fence = state.alloc(ObjectKind::Fence);
        state.fences.insert(fence, signaled);
        Ok(fence)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        let mut state = self.state();
        if state.pending.iter().any(|p| p.fence == fence) {
            state.violations.push(Violation::DestroyedWhileInFlight {
                kind: ObjectKind::Fence,
                raw: fence.as_raw(),
            });
        }
        if state.release(ObjectKind::Fence, fence.as_raw()) {
            state.fences.remove(&fence);
        }
    }

    fn wait_for_fence(&self, fence: vk::Fence, _timeout_ns: u64) -> RenderResult<()> {
        let mut state = self.state();
        if !state.fences.get(&fence).copied().unwrap_or(false) {
            match state.pending.iter().position(|p| p.fence == fence) {
                Some(index) => state.complete(index),
                None => {
                    state
                        .violations
                        .push(Violation::WaitOnUnsubmittedFence { fence });
                    return Err(RenderError::Api(vk::Result::TIMEOUT));
                }
            }
        }
        let pending = state.pending.len();
        state.log_event(EngineEvent::FenceWait { fence, pending });
        Ok(())
    }

    fn reset_fence(&self, fence: vk::Fence) -> RenderResult<()> {
        let mut state = self.state();
        if state.pending.iter().any(|p| p.fence == fence) {
            state
                .violations
                .push(Violation::FenceResetWhilePending { fence });
        }
        state.fences.insert(fence, false);
        Ok(())
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout_ns: u64,
        semaphore: vk::Semaphore,
    ) -> RenderResult<AcquireOutcome> {
        let mut state = self.state();
        let scripted = state.acquire_script.pop_front();

        let outcome = if scripted == Some(ScriptedResult::OutOfDate) {
            AcquireOutcome::OutOfDate
        } else {
            let Some(chain) = state.swapchains.get_mut(&swapchain) else {
                return Err(RenderError::Api(vk::Result::ERROR_SURFACE_LOST_KHR));
            };
            let count = u32::try_from(chain.images.len()).unwrap_or(u32::MAX).max(1);
            let index = chain.next_image;
            chain.next_image = (index + 1) % count;

            if state.pending_semaphores.get(&semaphore).copied().unwrap_or(false) {
                state
                    .violations
                    .push(Violation::SemaphoreReacquired { semaphore });
            }
            state.pending_semaphores.insert(semaphore, true);
            AcquireOutcome::Acquired {
                index,
                suboptimal: scripted == Some(ScriptedResult::Suboptimal),
            }
        };

        state.log_event(EngineEvent::Acquire { swapchain, outcome });
        Ok(outcome)
    }

    fn queue_submit(&self, desc: &SubmitDesc) -> RenderResult<()> {
        let mut state = self.state();
        if state.fences.get(&desc.fence).copied().unwrap_or(false) {
            state
                .violations
                .push(Violation::FenceSubmittedSignaled { fence: desc.fence });
        }
        if state
            .command_buffers
            .get(&desc.command_buffer)
            .map_or(true, |buffer| buffer.recording)
        {
            state.violations.push(Violation::NotRecording {
                command_buffer: desc.command_buffer,
            });
        }
        state.consume_semaphore(desc.wait_semaphore);
        state.pending.push(PendingSubmit {
            command_buffer: desc.command_buffer,
            fence: desc.fence,
            signal_semaphore: desc.signal_semaphore,
        });
        // The render-finished semaphore is considered signaled as soon as
        // the submission is queued; present orders after it.
        state
            .pending_semaphores
            .insert(desc.signal_semaphore, true);

        let pending = state.pending.len();
        let limit = state.frames_in_flight_limit;
        if pending > limit {
            state
                .violations
                .push(Violation::TooManyInFlight { pending, limit });
        }
        state.log_event(EngineEvent::Submit {
            command_buffer: desc.command_buffer,
            fence: desc.fence,
            pending,
        });
        Ok(())
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait_semaphore: vk::Semaphore,
    ) -> RenderResult<PresentOutcome> {
        let mut state = self.state();
        if !state.swapchains.contains_key(&swapchain) {
            return Err(RenderError::Api(vk::Result::ERROR_SURFACE_LOST_KHR));
        }
        state.consume_semaphore(wait_semaphore);
        let outcome = match state.present_script.pop_front() {
            Some(ScriptedResult::OutOfDate) => PresentOutcome::OutOfDate,
            Some(ScriptedResult::Suboptimal) => PresentOutcome::Suboptimal,
            None => PresentOutcome::Presented,
        };
        state.log_event(EngineEvent::Present {
            swapchain,
            image_index,
            outcome,
        });
        Ok(outcome)
    }

    fn device_wait_idle(&self) -> RenderResult<()> {
        let mut state = self.state();
        while !state.pending.is_empty() {
            state.complete(0);
        }
        state.log_event(EngineEvent::DeviceWaitIdle);
        Ok(())
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[LayoutBinding],
    ) -> RenderResult<vk::DescriptorSetLayout> {
        let mut state = self.state();
        let layout = state.alloc(ObjectKind::DescriptorSetLayout);
        state.layouts.insert(layout, bindings.to_vec());
        Ok(layout)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        let mut state = self.state();
        if state.release(ObjectKind::DescriptorSetLayout, layout.as_raw()) {
            state.layouts.remove(&layout);
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
        _flags: vk::DescriptorPoolCreateFlags,
    ) -> RenderResult<vk::DescriptorPool> {
        let mut state = self.state();
        let pool = state.alloc(ObjectKind::DescriptorPool);
        let mut quotas = HashMap::new();
        for size in pool_sizes {
            *quotas.entry(size.ty).or_insert(0) += size.descriptor_count;
        }
        state.pools.insert(
            pool,
            PoolState {
                max_sets,
                quotas,
                used_sets: 0,
                used: HashMap::new(),
            },
        );
        Ok(pool)
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        let mut state = self.state();
        if state.release(ObjectKind::DescriptorPool, pool.as_raw()) {
            state.pools.remove(&pool);
            for set in state.sets.values_mut().filter(|set| set.pool == pool) {
                set.live = false;
            }
        }
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RenderResult<()> {
        let mut state = self.state();
        let Some(pool_state) = state.pools.get_mut(&pool) else {
            return Err(RenderError::Api(vk::Result::ERROR_UNKNOWN));
        };
        pool_state.used_sets = 0;
        pool_state.used.clear();
        for set in state.sets.values_mut().filter(|set| set.pool == pool) {
            set.live = false;
        }
        Ok(())
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<Option<vk::DescriptorSet>> {
        let mut state = self.state();
        let Some(bindings) = state.layouts.get(&layout).cloned() else {
            return Err(RenderError::Api(vk::Result::ERROR_UNKNOWN));
        };
        let lenient = state.lenient_descriptor_pools;
        let Some(pool_state) = state.pools.get_mut(&pool) else {
            return Err(RenderError::Api(vk::Result::ERROR_UNKNOWN));
        };

        if !lenient {
            if pool_state.used_sets >= pool_state.max_sets {
                return Ok(None);
            }
            let over_quota = bindings.iter().any(|binding| {
                let used = pool_state.used.get(&binding.descriptor_type).copied().unwrap_or(0);
                let quota = pool_state.quotas.get(&binding.descriptor_type).copied().unwrap_or(0);
                used + binding.count > quota
            });
            if over_quota {
                return Ok(None);
            }
        }

        pool_state.used_sets += 1;
        for binding in &bindings {
            *pool_state.used.entry(binding.descriptor_type).or_insert(0) += binding.count;
        }
        let set = state.alloc_untracked();
        state.sets.insert(
            set,
            SetState {
                pool,
                live: true,
                writes: Vec::new(),
            },
        );
        Ok(Some(set))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        let mut state = self.state();
        match state.sets.get_mut(&set) {
            Some(set_state) if set_state.live => set_state.writes.extend_from_slice(writes),
            _ => state.violations.push(Violation::StaleDescriptorSet { set }),
        }
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
    ) -> RenderResult<(vk::Buffer, vk::DeviceMemory)> {
        let len = usize::try_from(size).map_err(|_| RenderError::ResourceCreation {
            resource: "buffer",
            result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
        })?;
        let mut state = self.state();
        let buffer = state.alloc(ObjectKind::Buffer);
        let memory = state.alloc_untracked();
        state.memory.insert(memory, vec![0; len]);
        Ok((buffer, memory))
    }

    fn write_buffer(
        &self,
        memory: vk::DeviceMemory,
        offset: vk::DeviceSize,
        data: &[u8],
    ) -> RenderResult<()> {
        let mut state = self.state();
        let storage = state
            .memory
            .get_mut(&memory)
            .ok_or(RenderError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        let start = usize::try_from(offset).map_err(|_| RenderError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        let end = start + data.len();
        if end > storage.len() {
            return Err(RenderError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        storage[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: vk::Buffer, memory: vk::DeviceMemory) {
        let mut state = self.state();
        if state.release(ObjectKind::Buffer, buffer.as_raw()) {
            state.memory.remove(&memory);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit_desc(
        engine: &HeadlessEngine,
        command_buffer: vk::CommandBuffer,
        fence: vk::Fence,
    ) -> SubmitDesc {
        SubmitDesc {
            command_buffer,
            wait_semaphore: engine.create_semaphore().unwrap(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: engine.create_semaphore().unwrap(),
            fence,
        }
    }

    #[test]
    fn test_fence_signals_only_when_waited() {
        let engine = HeadlessEngine::new();
        let command_buffer = engine.allocate_command_buffers(1).unwrap()[0];
        let fence = engine.create_fence(false).unwrap();
        let desc = submit_desc(&engine, command_buffer, fence);
        engine.state().pending_semaphores.insert(desc.wait_semaphore, true);

        engine.begin_command_buffer(command_buffer).unwrap();
        engine.end_command_buffer(command_buffer).unwrap();
        engine.queue_submit(&desc).unwrap();
        assert_eq!(engine.pending_submissions(), 1);
        assert!(!engine.is_fence_signaled(fence));

        engine.wait_for_fence(fence, u64::MAX).unwrap();
        assert!(engine.is_fence_signaled(fence));
        assert_eq!(engine.pending_submissions(), 0);
        assert!(engine.violations().is_empty());
    }

    #[test]
    fn test_begin_while_pending_is_violation() {
        let engine = HeadlessEngine::new();
        let command_buffer = engine.allocate_command_buffers(1).unwrap()[0];
        let fence = engine.create_fence(false).unwrap();
        let desc = submit_desc(&engine, command_buffer, fence);
        engine.state().pending_semaphores.insert(desc.wait_semaphore, true);

        engine.begin_command_buffer(command_buffer).unwrap();
        engine.end_command_buffer(command_buffer).unwrap();
        engine.queue_submit(&desc).unwrap();
        engine.begin_command_buffer(command_buffer).unwrap();

        assert_eq!(
            engine.violations(),
            vec![Violation::CommandBufferInUse { command_buffer }]
        );
    }

    #[test]
    fn test_wait_on_unsubmitted_fence_times_out() {
        let engine = HeadlessEngine::new();
        let fence = engine.create_fence(false).unwrap();
        assert!(matches!(
            engine.wait_for_fence(fence, 0),
            Err(RenderError::Api(vk::Result::TIMEOUT))
        ));
        assert_eq!(
            engine.violations(),
            vec![Violation::WaitOnUnsubmittedFence { fence }]
        );
    }

    #[test]
    fn test_reacquire_without_consuming_semaphore() {
        let engine = HeadlessEngine::new();
        let swapchain = engine
            .create_swapchain(&SwapchainDesc {
                min_image_count: 2,
                surface_format: vk::SurfaceFormatKHR::default(),
                extent: vk::Extent2D { width: 4, height: 4 },
                present_mode: vk::PresentModeKHR::FIFO,
                pre_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                old_swapchain: vk::SwapchainKHR::null(),
            })
            .unwrap();
        let semaphore = engine.create_semaphore().unwrap();

        let first = engine.acquire_next_image(swapchain, 0, semaphore).unwrap();
        assert_eq!(first, AcquireOutcome::Acquired { index: 0, suboptimal: false });
        engine.acquire_next_image(swapchain, 0, semaphore).unwrap();
        assert_eq!(
            engine.violations(),
            vec![Violation::SemaphoreReacquired { semaphore }]
        );
    }

    #[test]
    fn test_scripted_out_of_date_signals_nothing() {
        let engine = HeadlessEngine::new();
        engine.push_acquire_result(ScriptedResult::OutOfDate);
        let semaphore = engine.create_semaphore().unwrap();

        let outcome = engine
            .acquire_next_image(vk::SwapchainKHR::null(), 0, semaphore)
            .unwrap();
        assert_eq!(outcome, AcquireOutcome::OutOfDate);
        assert!(!engine.state().pending_semaphores[&semaphore]);
    }

    #[test]
    fn test_double_destroy_is_violation() {
        let engine = HeadlessEngine::new();
        let view = engine
            .create_image_view(vk::Image::null(), vk::Format::UNDEFINED, vk::ImageAspectFlags::COLOR)
            .unwrap();
        engine.destroy_image_view(view);
        engine.destroy_image_view(view);
        assert_eq!(
            engine.violations(),
            vec![Violation::UnknownObject {
                kind: ObjectKind::ImageView,
                raw: view.as_raw()
            }]
        );
    }

    #[test]
    fn test_lenient_pool_ignores_capacity() {
        let engine = HeadlessEngine::new();
        engine.set_lenient_descriptor_pools(true);
        let layout = engine
            .create_descriptor_set_layout(&[LayoutBinding {
                binding: 0,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                stage_flags: vk::ShaderStageFlags::VERTEX,
                count: 1,
            }])
            .unwrap();
        let pool = engine
            .create_descriptor_pool(1, &[], vk::DescriptorPoolCreateFlags::empty())
            .unwrap();
        assert!(engine.allocate_descriptor_set(pool, layout).unwrap().is_some());
        assert!(engine.allocate_descriptor_set(pool, layout).unwrap().is_some());
    }

    #[test]
    fn test_event_log_keeps_most_recent() {
        let engine = HeadlessEngine::new();
        let command_buffer = engine.allocate_command_buffers(1).unwrap()[0];
        engine.begin_command_buffer(command_buffer).unwrap();
        for _ in 0..EVENT_LOG_CAPACITY {
            engine.device_wait_idle().unwrap();
        }

        let events = engine.events();
        assert_eq!(events.len(), EVENT_LOG_CAPACITY);
        assert!(events.iter().all(|e| *e == EngineEvent::DeviceWaitIdle));
    }
}
