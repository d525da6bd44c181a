//! Platform layer: windowing, surface extent and input

pub mod input;
pub mod surface;
pub mod window;

pub use input::{CameraKeys, InputState};
pub use surface::SurfaceProvider;
pub use window::{Window, WindowError, WindowResult};
