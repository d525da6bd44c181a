//! Configuration system

use ash::vk;
pub use serde::{Deserialize, Serialize};

/// Upper bound accepted for `renderer.frames_in_flight`
pub const MAX_SUPPORTED_FRAMES_IN_FLIGHT: usize = 4;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: &str) -> Result<Self, ConfigError> {
        // Format follows the file extension; unknown ones are rejected unread
        let is_toml = path.ends_with(".toml");
        if !is_toml && !path.ends_with(".ron") {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        }

        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        if is_toml {
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        } else {
            ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string()))
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: &str) -> Result<(), ConfigError> {
        let contents = if path.ends_with(".toml") {
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else if path.ends_with(".ron") {
            ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?
        } else {
            return Err(ConfigError::UnsupportedFormat(path.to_string()));
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Values parsed but rejected by validation
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Window settings
    pub window: WindowConfig,
    /// Renderer settings
    pub renderer: RendererConfig,
    /// Descriptor pool sizing
    pub descriptors: DescriptorConfig,
}

impl Config for EngineConfig {}

impl EngineConfig {
    /// Reject values the renderer cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let frames = self.renderer.frames_in_flight;
        if frames == 0 || frames > MAX_SUPPORTED_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "renderer.frames_in_flight must be within 1..={MAX_SUPPORTED_FRAMES_IN_FLIGHT}, got {frames}"
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "window extent must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if self.descriptors.global_max_sets_per_frame == 0 {
            return Err(ConfigError::Invalid(
                "descriptors.global_max_sets_per_frame must be non-zero".to_string(),
            ));
        }
        if self.descriptors.material_sets == 0 {
            return Err(ConfigError::Invalid(
                "descriptors.material_sets must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from `path`, then validate
    pub fn load_validated(path: &str) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Window configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Window title
    pub title: String,
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Frame Engine Viewer".to_string(),
            width: 800,
            height: 600,
        }
    }
}

/// Preferred low-latency present mode; FIFO is always the fallback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresentModePreference {
    /// Triple-buffered, no tearing
    Mailbox,
    /// No vsync, may tear
    Immediate,
    /// Vsync
    Fifo,
}

impl PresentModePreference {
    /// Vulkan present mode for this preference
    pub const fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
            Self::Fifo => vk::PresentModeKHR::FIFO,
        }
    }
}

/// Renderer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Number of frame slots the CPU may record ahead of the GPU
    pub frames_in_flight: usize,
    /// Preferred present mode
    pub present_mode: PresentModePreference,
    /// RGBA clear color of the swapchain render pass
    pub clear_color: [f32; 4],
    /// Upper bound on each fence wait and image acquire, in nanoseconds
    ///
    /// `None` waits forever. TOML integers are signed, so the unbounded wait
    /// is spelled by omission rather than by `u64::MAX`.
    pub fence_timeout_ns: Option<u64>,
    /// Force validation layers on or off; `None` follows the build profile
    pub enable_validation: Option<bool>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            present_mode: PresentModePreference::Mailbox,
            clear_color: [0.01, 0.01, 0.01, 1.0],
            fence_timeout_ns: None,
            enable_validation: None,
        }
    }
}

impl RendererConfig {
    /// Fence and acquire timeout handed to the engine
    pub fn fence_timeout(&self) -> u64 {
        self.fence_timeout_ns.unwrap_or(u64::MAX)
    }

    /// Whether validation layers should be requested
    pub const fn validation_enabled(&self) -> bool {
        match self.enable_validation {
            Some(enabled) => enabled,
            None => cfg!(debug_assertions),
        }
    }
}

/// Descriptor pool sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorConfig {
    /// Global descriptor sets reserved per frame slot
    pub global_max_sets_per_frame: u32,
    /// Capacity of the material pool
    pub material_sets: u32,
}

impl Default for DescriptorConfig {
    fn default() -> Self {
        Self {
            global_max_sets_per_frame: 1,
            material_sets: 1000,
        }
    }
}
