//! Render error types

use ash::vk;
use thiserror::Error;

use crate::platform::WindowError;

/// Fatal rendering errors
///
/// Protocol signals such as an out-of-date swapchain or a degenerate surface
/// extent are not errors; they are handled inside the scheduler and never
/// surface through this type.
#[derive(Error, Debug)]
pub enum RenderError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A GPU object could not be created
    #[error("Failed to create {resource}: {result:?}")]
    ResourceCreation {
        /// Kind of object that failed
        resource: &'static str,
        /// Result reported by the driver
        result: vk::Result,
    },

    /// A rebuilt swapchain changed its color or depth format
    ///
    /// Pipelines and render passes built against the old formats would be
    /// silently incompatible, so this is not recoverable.
    #[error(
        "Swapchain image or depth format has changed: color {old_color:?} -> {new_color:?}, depth {old_depth:?} -> {new_depth:?}"
    )]
    FormatMismatch {
        /// Color format of the previous chain
        old_color: vk::Format,
        /// Color format of the rebuilt chain
        new_color: vk::Format,
        /// Depth format of the previous chain
        old_depth: vk::Format,
        /// Depth format of the rebuilt chain
        new_depth: vk::Format,
    },

    /// The surface reported no formats at all
    #[error("Surface reports no supported formats")]
    NoSurfaceFormats,

    /// None of the depth candidates can be used as a depth attachment
    #[error("No supported depth attachment format")]
    NoSupportedDepthFormat,

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Instance, device or surface setup failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// Window error
    #[error(transparent)]
    Window(#[from] WindowError),
}

impl From<vk::Result> for RenderError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

impl RenderError {
    /// Map a creation failure for `resource`
    pub fn creation(resource: &'static str) -> impl Fn(vk::Result) -> Self {
        move |result| Self::ResourceCreation { resource, result }
    }
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
