//! # Rendering
//!
//! Frame orchestration over a [`PresentationEngine`].
//!
//! ## Architecture
//!
//! - **FrameScheduler**: begin/end frame state machine over the frame-slot ring
//! - **SwapchainManager**: generation-tagged swapchain plus its per-image attachments
//! - **Descriptors**: layout builder, bounded pools and a validating writer
//! - **Backends**: `ash` Vulkan device and a simulated headless device
//!
//! Render systems see only a [`FrameContext`] for the frame being recorded.

pub mod backends;
pub mod buffer;
pub mod descriptors;
pub mod engine;
pub mod error;
pub mod frame;
pub mod scheduler;
pub mod swapchain;
pub mod sync;
pub mod ubo;

pub use buffer::UniformBuffer;
pub use engine::{AcquireOutcome, EngineRef, PresentOutcome, PresentationEngine};
pub use error::{RenderError, RenderResult};
pub use frame::{FrameContext, GlobalFrameResources, RenderSystem};
pub use scheduler::{FrameScheduler, FrameStats, MAX_FRAMES_IN_FLIGHT};
pub use swapchain::{Rebuild, SwapchainManager};
pub use ubo::{GlobalUbo, MaterialUbo};
