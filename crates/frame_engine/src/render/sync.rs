//! Synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, plus the per-slot bundle used by
//! the frame scheduler's ring of frames in flight.
//!
//! ## Frame Slot Protocol
//!
//! ```text
//! wait(in_flight) -> acquire(image_available) -> record -> reset(in_flight)
//!   -> submit(wait image_available, signal render_finished + in_flight)
//!   -> present(wait render_finished)
//! ```
//!
//! A slot's fence is created signaled so the first wait returns at once. The
//! command buffer of a slot is only re-recorded after its fence has been
//! waited, which bounds the CPU to `frames_in_flight` frames ahead of the GPU.

use ash::vk;

use super::engine::EngineRef;
use super::error::RenderResult;

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    engine: EngineRef,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(engine: EngineRef) -> RenderResult<Self> {
        let semaphore = engine.create_semaphore()?;
        Ok(Self { engine, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.engine.destroy_semaphore(self.semaphore);
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    engine: EngineRef,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(engine: EngineRef, signaled: bool) -> RenderResult<Self> {
        let fence = engine.create_fence(signaled)?;
        Ok(Self { engine, fence })
    }

    /// Wait for fence
    pub fn wait(&self, timeout: u64) -> RenderResult<()> {
        self.engine.wait_for_fence(self.fence, timeout)
    }

    /// Reset fence
    pub fn reset(&self) -> RenderResult<()> {
        self.engine.reset_fence(self.fence)
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.engine.destroy_fence(self.fence);
    }
}

/// Synchronization objects and command buffer of one frame in flight
///
/// The command buffer is owned by the scheduler, which allocates and frees
/// all slot buffers together.
pub struct FrameSlot {
    /// Command buffer recorded for this slot
    pub command_buffer: vk::CommandBuffer,
    /// Signaled when the acquired image is ready
    pub image_available: Semaphore,
    /// Signaled when this slot's submission finishes rendering
    pub render_finished: Semaphore,
    /// Signaled when the GPU is done with this slot
    pub in_flight: Fence,
}

impl FrameSlot {
    /// Create a slot around an allocated command buffer
    pub fn new(engine: &EngineRef, command_buffer: vk::CommandBuffer) -> RenderResult<Self> {
        let image_available = Semaphore::new(engine.clone())?;
        let render_finished = Semaphore::new(engine.clone())?;
        let in_flight = Fence::new(engine.clone(), true)?;

        Ok(Self {
            command_buffer,
            image_available,
            render_finished,
            in_flight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{HeadlessEngine, ObjectKind};
    use std::sync::Arc;

    #[test]
    fn test_frame_slot_objects_destroyed_on_drop() {
        let headless = Arc::new(HeadlessEngine::new());
        let engine: EngineRef = headless.clone();
        let command_buffer = engine.allocate_command_buffers(1).unwrap()[0];

        let slot = FrameSlot::new(&engine, command_buffer).unwrap();
        assert_eq!(headless.live_count(ObjectKind::Semaphore), 2);
        assert_eq!(headless.live_count(ObjectKind::Fence), 1);

        drop(slot);
        assert_eq!(headless.live_count(ObjectKind::Semaphore), 0);
        assert_eq!(headless.live_count(ObjectKind::Fence), 0);
        assert!(headless.violations().is_empty());
    }

    #[test]
    fn test_slot_fence_starts_signaled() {
        let headless = Arc::new(HeadlessEngine::new());
        let engine: EngineRef = headless.clone();

        let fence = Fence::new(engine, true).unwrap();
        assert!(headless.is_fence_signaled(fence.handle()));
        fence.reset().unwrap();
        assert!(!headless.is_fence_signaled(fence.handle()));
    }
}
