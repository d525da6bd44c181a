//! Drawable-surface abstraction consumed by the frame scheduler

use ash::vk;

/// Source of the drawable extent and resize notifications
///
/// The scheduler polls this during rebuilds. A zero width or height means the
/// surface is minimized and nothing may be created for it.
pub trait SurfaceProvider {
    /// Current drawable extent in pixels
    fn current_extent(&self) -> vk::Extent2D;

    /// Whether the surface was resized since the flag was last reset
    fn was_resized(&self) -> bool;

    /// Clear the resize flag
    fn reset_resized_flag(&mut self);

    /// Block until at least one platform event arrives
    fn wait_for_events(&mut self);

    /// Whether the user asked to close the surface
    fn is_closing(&self) -> bool {
        false
    }
}

/// Returns true when either dimension is zero
pub const fn is_degenerate(extent: vk::Extent2D) -> bool {
    extent.width == 0 || extent.height == 0
}
