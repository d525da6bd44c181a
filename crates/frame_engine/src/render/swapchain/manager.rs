//! Swapchain lifecycle: acquire, submit/present and transactional rebuilds

use ash::vk;

use super::chain::{Swapchain, SwapchainPreferences};
use crate::platform::surface::is_degenerate;
use crate::render::engine::{AcquireOutcome, EngineRef, PresentOutcome, SubmitDesc};
use crate::render::error::RenderResult;
use crate::render::sync::FrameSlot;

/// Result of a rebuild request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    /// A new chain replaced the old one
    Rebuilt {
        /// The new chain has a different number of images
        image_count_changed: bool,
    },
    /// The extent was degenerate; nothing was created
    Deferred,
}

/// Owner of the live swapchain
///
/// Besides the chain, the manager tracks which frame slot's fence last
/// rendered into each presentable image so a slot never renders into an image
/// another slot's unfinished frame still uses.
pub struct SwapchainManager {
    engine: EngineRef,
    swapchain: Swapchain,
    preferences: SwapchainPreferences,
    fence_timeout: u64,
    images_in_flight: Vec<vk::Fence>,
}

impl SwapchainManager {
    /// Build the first chain
    pub fn new(
        engine: EngineRef,
        extent: vk::Extent2D,
        preferences: SwapchainPreferences,
        fence_timeout: u64,
    ) -> RenderResult<Self> {
        let swapchain = Swapchain::new(engine.clone(), extent, &preferences, None, 0)?;
        log::info!(
            "Swapchain ready on {} engine: {}x{}, {} images, {:?}",
            engine.name(),
            swapchain.extent().width,
            swapchain.extent().height,
            swapchain.image_count(),
            swapchain.present_mode()
        );
        let images_in_flight = vec![vk::Fence::null(); swapchain.image_count()];

        Ok(Self {
            engine,
            swapchain,
            preferences,
            fence_timeout,
            images_in_flight,
        })
    }

    /// Replace the chain with one sized for `new_extent`
    ///
    /// The device is drained before anything is created. On a format mismatch
    /// the old chain stays in place and the error is returned.
    pub fn recreate(&mut self, new_extent: vk::Extent2D) -> RenderResult<Rebuild> {
        if is_degenerate(new_extent) {
            log::debug!(
                "Deferring swapchain rebuild for degenerate extent {}x{}",
                new_extent.width,
                new_extent.height
            );
            return Ok(Rebuild::Deferred);
        }

        self.engine.device_wait_idle()?;

        let successor = Swapchain::new(
            self.engine.clone(),
            new_extent,
            &self.preferences,
            Some(&self.swapchain),
            self.swapchain.generation() + 1,
        )?;
        self.swapchain.compare_formats(&successor)?;

        let image_count_changed = successor.image_count() != self.swapchain.image_count();
        self.images_in_flight = vec![vk::Fence::null(); successor.image_count()];
        // Dropping the predecessor destroys its framebuffers, views and handle
        self.swapchain = successor;

        log::debug!(
            "Swapchain rebuilt: generation {}, {}x{}",
            self.swapchain.generation(),
            self.swapchain.extent().width,
            self.swapchain.extent().height
        );
        Ok(Rebuild::Rebuilt {
            image_count_changed,
        })
    }

    /// Wait for `slot` to retire, then acquire an image with its semaphore
    pub fn acquire_next_image(&self, slot: &FrameSlot) -> RenderResult<AcquireOutcome> {
        slot.in_flight.wait(self.fence_timeout)?;
        self.engine.acquire_next_image(
            self.swapchain.handle(),
            self.fence_timeout,
            slot.image_available.handle(),
        )
    }

    /// Submit `slot`'s command buffer and present `image_index`
    pub fn submit(&mut self, slot: &FrameSlot, image_index: u32) -> RenderResult<PresentOutcome> {
        let index = image_index as usize;
        let owner = self.images_in_flight[index];
        let fence = slot.in_flight.handle();
        if owner != vk::Fence::null() && owner != fence {
            self.engine.wait_for_fence(owner, self.fence_timeout)?;
        }
        self.images_in_flight[index] = fence;

        slot.in_flight.reset()?;
        self.engine.queue_submit(&SubmitDesc {
            command_buffer: slot.command_buffer,
            wait_semaphore: slot.image_available.handle(),
            wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
            signal_semaphore: slot.render_finished.handle(),
            fence,
        })?;

        let outcome = self.engine.queue_present(
            self.swapchain.handle(),
            image_index,
            slot.render_finished.handle(),
        )?;
        if outcome != PresentOutcome::Presented {
            log::warn!("Present reported {outcome:?}");
        }
        Ok(outcome)
    }

    /// The live chain
    pub fn swapchain(&self) -> &Swapchain {
        &self.swapchain
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        self.swapchain.aspect_ratio()
    }

    /// Render pass of the live chain
    pub fn render_pass(&self) -> vk::RenderPass {
        self.swapchain.render_pass()
    }

    /// Framebuffer for presentable image `index`
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.swapchain.framebuffer(index)
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// Generation of the live chain
    pub fn generation(&self) -> u64 {
        self.swapchain.generation()
    }

    /// Color format
    pub fn color_format(&self) -> vk::Format {
        self.swapchain.color_format()
    }

    /// Depth format
    pub fn depth_format(&self) -> vk::Format {
        self.swapchain.depth_format()
    }

    /// Present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode()
    }
}
