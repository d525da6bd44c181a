//! Scripted surface for headless runs

use std::collections::VecDeque;

use ash::vk;

use crate::platform::SurfaceProvider;

/// Surface whose extent changes follow a script
///
/// Each `wait_for_events` call applies the next scripted extent. When the
/// script runs dry while the extent is still degenerate, the surface reports
/// itself as closing so a rebuild loop cannot wait forever.
#[derive(Debug, Clone)]
pub struct ScriptedSurface {
    extent: vk::Extent2D,
    resized: bool,
    closing: bool,
    on_wait: VecDeque<vk::Extent2D>,
    wait_count: usize,
}

impl ScriptedSurface {
    /// Create a surface with an initial extent
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            resized: false,
            closing: false,
            on_wait: VecDeque::new(),
            wait_count: 0,
        }
    }

    /// Change the extent immediately and raise the resize flag
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resized = true;
    }

    /// Queue an extent applied by the next unconsumed `wait_for_events`
    pub fn push_extent_on_wait(&mut self, width: u32, height: u32) {
        self.on_wait.push_back(vk::Extent2D { width, height });
    }

    /// Mark the surface as closing
    pub fn set_closing(&mut self, closing: bool) {
        self.closing = closing;
    }

    /// Number of blocking waits performed
    pub const fn wait_count(&self) -> usize {
        self.wait_count
    }
}

impl SurfaceProvider for ScriptedSurface {
    fn current_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_for_events(&mut self) {
        self.wait_count += 1;
        if let Some(extent) = self.on_wait.pop_front() {
            self.extent = extent;
            self.resized = true;
        } else if crate::platform::surface::is_degenerate(self.extent) {
            log::warn!("Surface script exhausted while minimized; closing");
            self.closing = true;
        }
    }

    fn is_closing(&self) -> bool {
        self.closing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wait_applies_scripted_extents_in_order() {
        let mut surface = ScriptedSurface::new(0, 0);
        surface.push_extent_on_wait(0, 0);
        surface.push_extent_on_wait(640, 480);

        surface.wait_for_events();
        assert_eq!(surface.current_extent().width, 0);
        surface.wait_for_events();
        assert_eq!(surface.current_extent().width, 640);
        assert!(surface.was_resized());
        assert_eq!(surface.wait_count(), 2);
        assert!(!surface.is_closing());
    }

    #[test]
    fn test_exhausted_script_while_minimized_closes() {
        let mut surface = ScriptedSurface::new(0, 600);
        surface.wait_for_events();
        assert!(surface.is_closing());
    }
}
