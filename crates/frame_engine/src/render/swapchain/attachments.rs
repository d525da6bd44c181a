//! Per-image attachments owned by a swapchain
//!
//! Handles image view, depth buffer, render pass and framebuffer lifetimes
//! following RAII principles.

use ash::vk;

use crate::render::engine::EngineRef;
use crate::render::error::RenderResult;

/// Image view wrapper with RAII cleanup
pub struct ImageView {
    engine: EngineRef,
    view: vk::ImageView,
}

impl ImageView {
    /// Create a color view over a presentable image
    pub fn new_color(engine: EngineRef, image: vk::Image, format: vk::Format) -> RenderResult<Self> {
        let view = engine.create_image_view(image, format, vk::ImageAspectFlags::COLOR)?;
        Ok(Self { engine, view })
    }

    /// Get the image view handle
    pub fn handle(&self) -> vk::ImageView {
        self.view
    }
}

impl Drop for ImageView {
    fn drop(&mut self) {
        self.engine.destroy_image_view(self.view);
    }
}

/// Depth image, its memory and its view
pub struct DepthBuffer {
    engine: EngineRef,
    image: vk::Image,
    memory: vk::DeviceMemory,
    image_view: vk::ImageView,
}

impl DepthBuffer {
    /// Create a new depth buffer
    pub fn new(engine: EngineRef, extent: vk::Extent2D, format: vk::Format) -> RenderResult<Self> {
        let (image, memory) = engine.create_depth_image(extent, format)?;
        let image_view = match engine.create_image_view(image, format, vk::ImageAspectFlags::DEPTH) {
            Ok(view) => view,
            Err(e) => {
                engine.destroy_image(image, memory);
                return Err(e);
            }
        };

        Ok(Self {
            engine,
            image,
            memory,
            image_view,
        })
    }

    /// Get the image view handle
    pub fn image_view(&self) -> vk::ImageView {
        self.image_view
    }
}

impl Drop for DepthBuffer {
    fn drop(&mut self) {
        self.engine.destroy_image_view(self.image_view);
        self.engine.destroy_image(self.image, self.memory);
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    engine: EngineRef,
    render_pass: vk::RenderPass,
}

impl RenderPass {
    /// Create the forward pass: color cleared and presented, depth cleared
    pub fn new_forward_pass(
        engine: EngineRef,
        color_format: vk::Format,
        depth_format: vk::Format,
    ) -> RenderResult<Self> {
        let render_pass = engine.create_render_pass(color_format, depth_format)?;
        Ok(Self {
            engine,
            render_pass,
        })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.engine.destroy_render_pass(self.render_pass);
    }
}

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    engine: EngineRef,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a framebuffer over `[color, depth]`
    pub fn new(
        engine: EngineRef,
        render_pass: vk::RenderPass,
        color: vk::ImageView,
        depth: vk::ImageView,
        extent: vk::Extent2D,
    ) -> RenderResult<Self> {
        let framebuffer = engine.create_framebuffer(render_pass, &[color, depth], extent)?;
        Ok(Self {
            engine,
            framebuffer,
        })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.engine.destroy_framebuffer(self.framebuffer);
    }
}
