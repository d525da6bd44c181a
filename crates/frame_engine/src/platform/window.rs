//! GLFW-based window management for Vulkan rendering
//!
//! Creates a client-API-less window, tracks framebuffer resizes for the frame
//! scheduler and folds input events into an [`InputState`].

use ash::vk;
use thiserror::Error;

use super::input::{CameraKeys, InputState};
use super::surface::SurfaceProvider;
use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result alias for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    resized: bool,
    input: InputState,
}

impl Window {
    /// Create a resizable window without an OpenGL context
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        let mut glfw =
            glfw::init(glfw::fail_on_errors).map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(
                config.width,
                config.height,
                &config.title,
                glfw::WindowMode::Windowed,
            )
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);
        window.set_cursor_pos_polling(true);
        window.set_mouse_button_polling(true);
        window.set_scroll_polling(true);

        let (width, height) = window.get_framebuffer_size();
        log::info!("Created window '{}' ({}x{})", config.title, width, height);

        Ok(Self {
            glfw,
            window,
            events,
            resized: false,
            input: InputState::new(width as f32, height as f32),
        })
    }

    /// Whether the user requested close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request or cancel close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll pending events without blocking
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.process_events();
    }

    /// Framebuffer size in pixels
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    /// Input accumulated since the last [`Window::end_input_frame`]
    pub fn input(&self) -> &InputState {
        &self.input
    }

    /// Clear per-tick input deltas
    pub fn end_input_frame(&mut self) {
        self.input.end_frame();
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "Failed to create Vulkan surface: {result:?}"
            )))
        }
    }

    fn process_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    self.resized = true;
                    self.input.viewport = [width as f32, height as f32];
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _) => {
                    self.window.set_should_close(true);
                }
                glfw::WindowEvent::Key(key, _, action, _) => {
                    if let Some(camera_key) = camera_key_for(key) {
                        self.input
                            .set_key(camera_key, action != glfw::Action::Release);
                    }
                }
                glfw::WindowEvent::CursorPos(x, y) => {
                    self.input.cursor_moved(x as f32, y as f32);
                }
                glfw::WindowEvent::MouseButton(glfw::MouseButton::Button1, action, _) => {
                    self.input.left_button = action != glfw::Action::Release;
                }
                glfw::WindowEvent::Scroll(_, y) => {
                    self.input.scroll_delta += y as f32;
                }
                _ => {}
            }
        }
    }
}

impl SurfaceProvider for Window {
    fn current_extent(&self) -> vk::Extent2D {
        let (width, height) = self.get_framebuffer_size();
        vk::Extent2D { width, height }
    }

    fn was_resized(&self) -> bool {
        self.resized
    }

    fn reset_resized_flag(&mut self) {
        self.resized = false;
    }

    fn wait_for_events(&mut self) {
        self.glfw.wait_events();
        self.process_events();
    }

    fn is_closing(&self) -> bool {
        self.should_close()
    }
}

fn camera_key_for(key: glfw::Key) -> Option<CameraKeys> {
    let mapped = match key {
        glfw::Key::W => CameraKeys::MOVE_FORWARD,
        glfw::Key::S => CameraKeys::MOVE_BACKWARD,
        glfw::Key::A => CameraKeys::MOVE_LEFT,
        glfw::Key::D => CameraKeys::MOVE_RIGHT,
        glfw::Key::E => CameraKeys::MOVE_UP,
        glfw::Key::Q => CameraKeys::MOVE_DOWN,
        glfw::Key::Left => CameraKeys::LOOK_LEFT,
        glfw::Key::Right => CameraKeys::LOOK_RIGHT,
        glfw::Key::Up => CameraKeys::LOOK_UP,
        glfw::Key::Down => CameraKeys::LOOK_DOWN,
        _ => return None,
    };
    Some(mapped)
}
