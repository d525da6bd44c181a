//! Swapchain construction
//!
//! Handles surface format, present mode, extent and image count selection, and
//! builds the per-image attachments (views, depth buffers, framebuffers) that
//! live and die with the chain.

use ash::vk;

use super::attachments::{DepthBuffer, Framebuffer, ImageView, RenderPass};
use crate::render::engine::{EngineRef, PresentationEngine, SwapchainDesc};
use crate::render::error::{RenderError, RenderResult};

/// Preferred color format and color space
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Depth formats tried in order
pub const DEPTH_FORMAT_CANDIDATES: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Caller-controlled swapchain choices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainPreferences {
    /// Present mode used when supported; FIFO otherwise
    pub present_mode: vk::PresentModeKHR,
}

impl Default for SwapchainPreferences {
    fn default() -> Self {
        Self {
            present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

/// Pick the preferred sRGB format, else the first reported one
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> RenderResult<vk::SurfaceFormatKHR> {
    let first = formats.first().copied().ok_or(RenderError::NoSurfaceFormats)?;
    Ok(formats
        .iter()
        .copied()
        .find(|sf| {
            sf.format == PREFERRED_SURFACE_FORMAT.format
                && sf.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .unwrap_or(first))
}

/// Pick `preferred` when supported, else FIFO
pub fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    preferred: vk::PresentModeKHR,
) -> vk::PresentModeKHR {
    modes
        .iter()
        .copied()
        .find(|&mode| mode == preferred)
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's extent when it reports one, else clamp the request
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: requested.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: requested.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One image more than the minimum, capped by the maximum when there is one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// First depth candidate usable as an optimal-tiling depth attachment
pub fn find_depth_format(engine: &dyn PresentationEngine) -> RenderResult<vk::Format> {
    DEPTH_FORMAT_CANDIDATES
        .iter()
        .copied()
        .find(|&format| engine.supports_depth_format(format))
        .ok_or(RenderError::NoSupportedDepthFormat)
}

struct SwapchainHandle {
    engine: EngineRef,
    swapchain: vk::SwapchainKHR,
}

impl Drop for SwapchainHandle {
    fn drop(&mut self) {
        self.engine.destroy_swapchain(self.swapchain);
    }
}

/// Generation-tagged presentation chain with its dependent resources
///
/// Per-image arrays all have `image_count` entries.
pub struct Swapchain {
    // Field order is drop order: attachments go before the chain itself.
    framebuffers: Vec<Framebuffer>,
    depth_buffers: Vec<DepthBuffer>,
    image_views: Vec<ImageView>,
    render_pass: RenderPass,
    handle: SwapchainHandle,
    images: Vec<vk::Image>,
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
    generation: u64,
}

impl Swapchain {
    /// Create a new swapchain
    ///
    /// When `previous` is given its handle is passed as the retired chain;
    /// `previous` itself stays alive and is released by the caller.
    pub fn new(
        engine: EngineRef,
        requested_extent: vk::Extent2D,
        preferences: &SwapchainPreferences,
        previous: Option<&Self>,
        generation: u64,
    ) -> RenderResult<Self> {
        let support = engine.surface_support()?;
        let surface_format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes, preferences.present_mode);
        let extent = choose_extent(&support.capabilities, requested_extent);
        let image_count = choose_image_count(&support.capabilities);
        let depth_format = find_depth_format(engine.as_ref())?;

        let swapchain = engine.create_swapchain(&SwapchainDesc {
            min_image_count: image_count,
            surface_format,
            extent,
            present_mode,
            pre_transform: support.capabilities.current_transform,
            old_swapchain: previous.map_or_else(vk::SwapchainKHR::null, Self::handle),
        })?;
        let handle = SwapchainHandle {
            engine: engine.clone(),
            swapchain,
        };

        let images = engine.swapchain_images(swapchain)?;
        let image_views = images
            .iter()
            .map(|&image| ImageView::new_color(engine.clone(), image, surface_format.format))
            .collect::<RenderResult<Vec<_>>>()?;
        let depth_buffers = images
            .iter()
            .map(|_| DepthBuffer::new(engine.clone(), extent, depth_format))
            .collect::<RenderResult<Vec<_>>>()?;
        let render_pass =
            RenderPass::new_forward_pass(engine.clone(), surface_format.format, depth_format)?;
        let framebuffers = image_views
            .iter()
            .zip(&depth_buffers)
            .map(|(view, depth)| {
                Framebuffer::new(
                    engine.clone(),
                    render_pass.handle(),
                    view.handle(),
                    depth.image_view(),
                    extent,
                )
            })
            .collect::<RenderResult<Vec<_>>>()?;

        log::debug!(
            "Created swapchain generation {} ({}x{}, {} images, {:?}, {:?}/{:?})",
            generation,
            extent.width,
            extent.height,
            images.len(),
            present_mode,
            surface_format.format,
            depth_format
        );

        Ok(Self {
            framebuffers,
            depth_buffers,
            image_views,
            render_pass,
            handle,
            images,
            surface_format,
            depth_format,
            present_mode,
            extent,
            generation,
        })
    }

    /// Fail when `other` changed the color or depth format
    pub fn compare_formats(&self, other: &Self) -> RenderResult<()> {
        if self.surface_format.format == other.surface_format.format
            && self.depth_format == other.depth_format
        {
            Ok(())
        } else {
            Err(RenderError::FormatMismatch {
                old_color: self.surface_format.format,
                new_color: other.surface_format.format,
                old_depth: self.depth_format,
                new_depth: other.depth_format,
            })
        }
    }

    /// Get the swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle.swapchain
    }

    /// Image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Width over height
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect_ratio(&self) -> f32 {
        self.extent.width as f32 / self.extent.height as f32
    }

    /// Color format
    pub fn color_format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Depth format
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Present mode in use
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Rebuild counter, starting at 0
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Render pass compatible with the chain's formats
    pub fn render_pass(&self) -> vk::RenderPass {
        self.render_pass.handle()
    }

    /// Framebuffer for presentable image `index`
    pub fn framebuffer(&self, index: usize) -> vk::Framebuffer {
        self.framebuffers[index].handle()
    }
}
