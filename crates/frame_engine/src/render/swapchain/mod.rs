//! Swapchain management
//!
//! A [`Swapchain`] is one generation of the presentation chain and everything
//! sized to it. The [`SwapchainManager`] owns the live generation, drives
//! acquire and present, and replaces the chain when the surface changes.

mod attachments;
mod chain;
mod manager;

pub use attachments::{DepthBuffer, Framebuffer, ImageView, RenderPass};
pub use chain::{
    choose_extent, choose_image_count, choose_present_mode, choose_surface_format,
    find_depth_format, Swapchain, SwapchainPreferences, DEPTH_FORMAT_CANDIDATES,
    PREFERRED_SURFACE_FORMAT,
};
pub use manager::{Rebuild, SwapchainManager};
