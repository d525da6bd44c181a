//! # Frame Engine
//!
//! Frame orchestration and swapchain lifecycle for Vulkan renderers.
//!
//! ## Features
//!
//! - **Frame Scheduling**: begin/end frame state machine over a ring of frames in flight
//! - **Swapchain Lifecycle**: generation-tagged chains rebuilt on resize or staleness
//! - **Descriptor Allocation**: bounded arena pools, layout builder and validating writer
//! - **Backends**: `ash` Vulkan backend plus a headless simulated backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use frame_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EngineConfig::default();
//!     let mut window = Window::new(&config.window)?;
//!     let engine: EngineRef = Arc::new(VulkanEngine::new(&mut window, &config.renderer)?);
//!     let mut scheduler = FrameScheduler::new(engine, &mut window, &config.renderer)?;
//!
//!     while !window.should_close() {
//!         window.poll_events();
//!         if let Some(command_buffer) = scheduler.begin_frame(&mut window)? {
//!             scheduler.begin_swapchain_render_pass(command_buffer);
//!             // Record draw commands into `command_buffer`
//!             scheduler.end_swapchain_render_pass(command_buffer);
//!             scheduler.end_frame(&mut window)?;
//!         }
//!     }
//!     scheduler.wait_idle()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod platform;
pub mod render;
pub mod scene;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, EngineConfig, RendererConfig, WindowConfig},
        foundation::{
            math::{Mat4, Vec3},
            time::FrameTimer,
        },
        platform::{InputState, SurfaceProvider, Window},
        render::{
            backends::{
                headless::{HeadlessEngine, ScriptedSurface},
                vulkan::VulkanEngine,
            },
            descriptors::{
                DescriptorPool, DescriptorPoolBuilder, DescriptorSetLayout,
                DescriptorSetLayoutBuilder, DescriptorWriter,
            },
            EngineRef, FrameContext, FrameScheduler, PresentationEngine, RenderError,
            RenderResult, RenderSystem,
        },
        scene::{Camera, CameraController, GameObject, Scene},
    };
}
