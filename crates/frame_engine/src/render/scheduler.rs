//! Frame scheduling
//!
//! The scheduler is a two-state machine (Idle, FrameInProgress) over a ring of
//! [`FrameSlot`]s. Each tick the caller brackets its command recording with
//! [`FrameScheduler::begin_frame`] and [`FrameScheduler::end_frame`]:
//!
//! ```text
//! Idle --begin_frame (image acquired)--> InProgress --end_frame--> Idle
//!   \--begin_frame (out of date: rebuild, returns None)--/
//! ```
//!
//! Stale or suboptimal chains, surface resizes and degenerate extents are
//! handled here and never reach the caller as errors. Calling the frame API
//! out of order is a programming error and panics.

use ash::vk;

use super::engine::{AcquireOutcome, EngineRef, RenderPassBeginDesc};
use super::error::{RenderError, RenderResult};
use super::swapchain::{Rebuild, SwapchainManager, SwapchainPreferences};
use super::sync::FrameSlot;
use crate::config::RendererConfig;
use crate::platform::surface::{is_degenerate, SurfaceProvider};

/// Frame slots the CPU may record ahead of the GPU unless configured otherwise
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    InProgress { image_index: u32 },
}

/// Counters describing what the scheduler did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames that acquired an image and began recording
    pub frames_begun: u64,
    /// Frames submitted and presented
    pub frames_submitted: u64,
    /// Ticks where `begin_frame` returned `None`
    pub skipped_ticks: u64,
    /// Completed swapchain rebuilds
    pub rebuilds: u64,
}

/// Frame-in-flight state machine driving a [`SwapchainManager`]
pub struct FrameScheduler {
    engine: EngineRef,
    swapchains: SwapchainManager,
    slots: Vec<FrameSlot>,
    current_frame: usize,
    state: FrameState,
    rebuild_pending: bool,
    clear_color: [f32; 4],
    stats: FrameStats,
}

impl FrameScheduler {
    /// Build the first chain and the slot ring
    ///
    /// Blocks on `surface` events while its extent is zero.
    pub fn new(
        engine: EngineRef,
        surface: &mut dyn SurfaceProvider,
        config: &RendererConfig,
    ) -> RenderResult<Self> {
        let frames_in_flight = config.frames_in_flight.max(1);

        let mut extent = surface.current_extent();
        while is_degenerate(extent) {
            if surface.is_closing() {
                return Err(RenderError::InitializationFailed(
                    "surface closed before the first swapchain was built".to_string(),
                ));
            }
            surface.wait_for_events();
            extent = surface.current_extent();
        }
        surface.reset_resized_flag();

        let preferences = SwapchainPreferences {
            present_mode: config.present_mode.to_vk(),
        };
        let swapchains =
            SwapchainManager::new(engine.clone(), extent, preferences, config.fence_timeout())?;

        let slot_count = u32::try_from(frames_in_flight).map_err(|_| {
            RenderError::InitializationFailed(format!("{frames_in_flight} frames in flight"))
        })?;
        let command_buffers = engine.allocate_command_buffers(slot_count)?;
        let slots = command_buffers
            .iter()
            .map(|&command_buffer| FrameSlot::new(&engine, command_buffer))
            .collect::<RenderResult<Vec<_>>>();
        let slots = match slots {
            Ok(slots) => slots,
            Err(e) => {
                engine.free_command_buffers(&command_buffers);
                return Err(e);
            }
        };

        log::info!("Frame scheduler ready with {frames_in_flight} frames in flight");

        Ok(Self {
            engine,
            swapchains,
            slots,
            current_frame: 0,
            state: FrameState::Idle,
            rebuild_pending: false,
            clear_color: config.clear_color,
            stats: FrameStats::default(),
        })
    }

    /// Start a frame and return the command buffer to record into
    ///
    /// Returns `Ok(None)` when the chain was stale and had to be rebuilt; the
    /// caller skips this tick.
    ///
    /// # Panics
    /// If a frame is already in progress.
    pub fn begin_frame(
        &mut self,
        surface: &mut dyn SurfaceProvider,
    ) -> RenderResult<Option<vk::CommandBuffer>> {
        assert!(
            self.state == FrameState::Idle,
            "Can't call begin_frame while a frame is already in progress"
        );

        if self.rebuild_pending && self.recreate_swapchain(surface)? == Rebuild::Deferred {
            self.stats.skipped_ticks += 1;
            return Ok(None);
        }

        let slot = &self.slots[self.current_frame];
        match self.swapchains.acquire_next_image(slot)? {
            AcquireOutcome::OutOfDate => {
                log::warn!("Swapchain out of date during acquire; rebuilding");
                self.stats.skipped_ticks += 1;
                self.recreate_swapchain(surface)?;
                Ok(None)
            }
            AcquireOutcome::Acquired { index, suboptimal } => {
                if suboptimal {
                    log::debug!("Acquired image {index} from a suboptimal swapchain");
                    self.rebuild_pending = true;
                }
                let command_buffer = slot.command_buffer;
                self.engine.begin_command_buffer(command_buffer)?;
                self.state = FrameState::InProgress { image_index: index };
                self.stats.frames_begun += 1;
                Ok(Some(command_buffer))
            }
        }
    }

    /// Finish recording, submit, present and advance to the next slot
    ///
    /// Rebuilds the chain when presentation reported it stale, the surface
    /// was resized, or a rebuild is pending.
    ///
    /// # Panics
    /// If no frame is in progress.
    pub fn end_frame(&mut self, surface: &mut dyn SurfaceProvider) -> RenderResult<()> {
        let FrameState::InProgress { image_index } = self.state else {
            panic!("Can't call end_frame while frame is not in progress");
        };

        let slot = &self.slots[self.current_frame];
        self.engine.end_command_buffer(slot.command_buffer)?;
        let outcome = self.swapchains.submit(slot, image_index)?;

        self.state = FrameState::Idle;
        self.current_frame = (self.current_frame + 1) % self.slots.len();
        self.stats.frames_submitted += 1;

        if outcome.needs_rebuild() || surface.was_resized() || self.rebuild_pending {
            self.recreate_swapchain(surface)?;
        }
        Ok(())
    }

    /// Begin the swapchain render pass on the current frame's command buffer
    ///
    /// Clears color to the configured clear color and depth to 1.0, then sets
    /// a full-extent viewport and scissor.
    ///
    /// # Panics
    /// If no frame is in progress or `command_buffer` belongs to another frame.
    pub fn begin_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        let FrameState::InProgress { image_index } = self.state else {
            panic!("Can't call begin_swapchain_render_pass if frame is not in progress");
        };
        assert_eq!(
            command_buffer,
            self.slots[self.current_frame].command_buffer,
            "Can't begin render pass on command buffer from a different frame"
        );

        let extent = self.swapchains.extent();
        self.engine.cmd_begin_render_pass(
            command_buffer,
            &RenderPassBeginDesc {
                render_pass: self.swapchains.render_pass(),
                framebuffer: self.swapchains.framebuffer(image_index as usize),
                extent,
                clear_color: self.clear_color,
                clear_depth: 1.0,
                clear_stencil: 0,
            },
        );

        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        self.engine.cmd_set_viewport(command_buffer, viewport);
        self.engine.cmd_set_scissor(command_buffer, scissor);
    }

    /// End the swapchain render pass
    ///
    /// # Panics
    /// If no frame is in progress or `command_buffer` belongs to another frame.
    pub fn end_swapchain_render_pass(&self, command_buffer: vk::CommandBuffer) {
        assert!(
            self.is_frame_in_progress(),
            "Can't call end_swapchain_render_pass if frame is not in progress"
        );
        assert_eq!(
            command_buffer,
            self.slots[self.current_frame].command_buffer,
            "Can't end render pass on command buffer from a different frame"
        );
        self.engine.cmd_end_render_pass(command_buffer);
    }

    /// Rebuild the chain for the surface's current extent
    ///
    /// Waits on surface events while the extent is zero. When the surface
    /// starts closing during that wait the rebuild is abandoned and stays
    /// pending.
    ///
    /// # Panics
    /// If a frame is in progress.
    pub fn recreate_swapchain(&mut self, surface: &mut dyn SurfaceProvider) -> RenderResult<Rebuild> {
        assert!(
            !self.is_frame_in_progress(),
            "Can't rebuild the swapchain while a frame is in progress"
        );

        let mut extent = surface.current_extent();
        while is_degenerate(extent) {
            if surface.is_closing() {
                log::debug!("Surface closing while minimized; rebuild stays pending");
                self.rebuild_pending = true;
                return Ok(Rebuild::Deferred);
            }
            surface.wait_for_events();
            extent = surface.current_extent();
        }
        surface.reset_resized_flag();

        let rebuild = self.swapchains.recreate(extent)?;
        if let Rebuild::Rebuilt {
            image_count_changed,
        } = rebuild
        {
            if image_count_changed {
                self.reallocate_command_buffers()?;
            }
            self.rebuild_pending = false;
            self.stats.rebuilds += 1;
        }
        Ok(rebuild)
    }

    fn reallocate_command_buffers(&mut self) -> RenderResult<()> {
        let old: Vec<vk::CommandBuffer> = self.slots.iter().map(|s| s.command_buffer).collect();
        self.engine.free_command_buffers(&old);

        let count = u32::try_from(self.slots.len()).unwrap_or(u32::MAX);
        let fresh = self.engine.allocate_command_buffers(count)?;
        for (slot, command_buffer) in self.slots.iter_mut().zip(fresh) {
            slot.command_buffer = command_buffer;
        }
        log::debug!("Reallocated {} frame command buffers", self.slots.len());
        Ok(())
    }

    /// Block until the device has finished all submitted work
    pub fn wait_idle(&self) -> RenderResult<()> {
        self.engine.device_wait_idle()
    }

    /// Index of the current frame slot
    ///
    /// # Panics
    /// If no frame is in progress.
    pub fn frame_index(&self) -> usize {
        assert!(
            self.is_frame_in_progress(),
            "Cannot get frame index when frame not in progress"
        );
        self.current_frame
    }

    /// Command buffer of the frame in progress
    ///
    /// # Panics
    /// If no frame is in progress.
    pub fn current_command_buffer(&self) -> vk::CommandBuffer {
        assert!(
            self.is_frame_in_progress(),
            "Cannot get command buffer when frame not in progress"
        );
        self.slots[self.current_frame].command_buffer
    }

    /// Whether `begin_frame` succeeded and `end_frame` has not run yet
    pub fn is_frame_in_progress(&self) -> bool {
        matches!(self.state, FrameState::InProgress { .. })
    }

    /// Whether a rebuild will run before or after the next frame
    pub const fn is_rebuild_pending(&self) -> bool {
        self.rebuild_pending
    }

    /// Width over height of the live chain
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchains.aspect_ratio()
    }

    /// Render pass of the live chain
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchains.render_pass()
    }

    /// Presentable image count of the live chain
    pub fn image_count(&self) -> usize {
        self.swapchains.image_count()
    }

    /// Extent of the live chain
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchains.extent()
    }

    /// Swapchain manager
    pub fn swapchains(&self) -> &SwapchainManager {
        &self.swapchains
    }

    /// Change the color the swapchain render pass clears to
    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Counters since creation
    pub const fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Engine driving this scheduler
    pub fn engine(&self) -> &EngineRef {
        &self.engine
    }
}

impl Drop for FrameScheduler {
    fn drop(&mut self) {
        if let Err(e) = self.engine.device_wait_idle() {
            log::error!("Failed to wait for device idle during shutdown: {e}");
        }
        let command_buffers: Vec<vk::CommandBuffer> =
            self.slots.iter().map(|s| s.command_buffer).collect();
        self.engine.free_command_buffers(&command_buffers);
    }
}
