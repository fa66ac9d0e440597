//! # Unified Configuration System
//!
//! Configuration structures for the renderer and the engine around it. All of
//! them are serde types so they can be persisted through [`Config`] as TOML
//! or RON.
//!
//! ## Configuration Categories
//!
//! - **Renderer Config**: surface, MSAA, shader location, descriptor capacity,
//!   per-material rasterization policy
//! - **Engine Config**: logging and debug behavior
//! - **Application Config**: the two above combined

use ash::vk;
use serde::{Serialize, Deserialize};

pub use crate::config::{Config, ConfigError};
use crate::render::material::MaterialType;
use crate::render::pipeline::PolygonMode;

/// Upper bound for `frames_in_flight`
pub const MAX_FRAMES_IN_FLIGHT: usize = 8;

/// Depth attachment formats the renderer knows how to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepthFormat {
    /// 32-bit float depth, no stencil
    D32Sfloat,
    /// 24-bit depth with 8-bit stencil
    D24UnormS8Uint,
    /// 16-bit depth
    D16Unorm,
}

impl DepthFormat {
    /// The matching Vulkan format
    pub fn to_vk(self) -> vk::Format {
        match self {
            Self::D32Sfloat => vk::Format::D32_SFLOAT,
            Self::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
            Self::D16Unorm => vk::Format::D16_UNORM,
        }
    }
}

/// # Renderer Configuration
///
/// Settings consumed by the render orchestrator and the Vulkan backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Application name for Vulkan instance creation
    pub application_name: String,
    /// Directory that material shader paths are resolved against
    pub shader_directory: String,
    /// Requested MSAA sample count; clamped to what the device supports
    pub msaa_samples: u32,
    /// Depth attachment format
    pub depth_format: DepthFormat,
    /// Maximum number of drawable objects (sizes the descriptor pool)
    pub max_objects: u32,
    /// Maximum frames in flight for the frame driver
    pub frames_in_flight: usize,
    /// Command buffers allocated per command recording unit
    pub command_buffers_per_unit: u32,
    /// Fence wait timeout in nanoseconds
    pub fence_timeout_ns: u64,
    /// Materials rasterized in line mode instead of solid fill
    pub wireframe_materials: Vec<MaterialType>,
    /// Whether to enable Vulkan validation layers (`None` = debug builds only)
    pub enable_validation: Option<bool>,
}

impl RendererConfig {
    /// Create a new renderer configuration
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            shader_directory: "target/shaders".to_string(),
            msaa_samples: 4,
            depth_format: DepthFormat::D32Sfloat,
            max_objects: 1024,
            frames_in_flight: 2,
            command_buffers_per_unit: 1,
            fence_timeout_ns: u64::MAX,
            wireframe_materials: Vec::new(),
            enable_validation: None,
        }
    }

    /// Set the shader directory
    pub fn with_shader_directory(mut self, dir: impl Into<String>) -> Self {
        self.shader_directory = dir.into();
        self
    }

    /// Set the requested MSAA sample count
    pub fn with_msaa_samples(mut self, samples: u32) -> Self {
        self.msaa_samples = samples;
        self
    }

    /// Set the maximum object count
    pub fn with_max_objects(mut self, max_objects: u32) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set maximum frames in flight
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Render the given material in wireframe
    pub fn with_wireframe(mut self, material: MaterialType) -> Self {
        if !self.wireframe_materials.contains(&material) {
            self.wireframe_materials.push(material);
        }
        self
    }

    /// Enable or disable validation layers
    pub fn with_validation(mut self, enabled: bool) -> Self {
        self.enable_validation = Some(enabled);
        self
    }

    /// Whether validation layers should be enabled
    pub fn validation_enabled(&self) -> bool {
        self.enable_validation.unwrap_or(cfg!(debug_assertions))
    }

    /// Polygon mode policy for a material
    pub fn polygon_mode_for(&self, material: MaterialType) -> PolygonMode {
        if self.wireframe_materials.contains(&material) {
            PolygonMode::Line
        } else {
            PolygonMode::Fill
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }

        if !self.msaa_samples.is_power_of_two() || self.msaa_samples > 64 {
            return Err(ConfigError::Invalid(format!(
                "MSAA sample count must be a power of two up to 64, got {}",
                self.msaa_samples
            )));
        }

        if self.max_objects == 0 {
            return Err(ConfigError::Invalid("Max objects must be at least 1".to_string()));
        }

        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid("Frames in flight must be at least 1".to_string()));
        }

        if self.frames_in_flight > MAX_FRAMES_IN_FLIGHT {
            return Err(ConfigError::Invalid(format!(
                "Frames in flight should not exceed {MAX_FRAMES_IN_FLIGHT}"
            )));
        }

        if self.command_buffers_per_unit == 0 {
            return Err(ConfigError::Invalid("Command recording units need at least one buffer".to_string()));
        }

        Ok(())
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self::new("Forward Engine Application")
    }
}

/// # Engine Configuration
///
/// Logging and debug behavior shared by everything built on the renderer.
/// `debug_mode` raises logging to at least `debug` and turns on validation
/// layers unless the renderer config says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter (overridden by `RUST_LOG`)
    pub log_level: String,
    /// Whether to enable debug features
    pub debug_mode: bool,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            debug_mode: cfg!(debug_assertions),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Enable or disable debug features
    pub fn with_debug_mode(mut self, enabled: bool) -> Self {
        self.debug_mode = enabled;
        self
    }

    /// Log filter to install, with `debug_mode` applied
    ///
    /// Module-level filters such as `forward_engine=trace` are passed through
    /// unchanged.
    pub fn log_filter(&self) -> String {
        match self.log_level.parse::<log::LevelFilter>() {
            Ok(level) if self.debug_mode => level.max(log::LevelFilter::Debug).to_string().to_lowercase(),
            Ok(level) => level.to_string().to_lowercase(),
            Err(_) => self.log_level.clone(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core configuration
    pub engine: EngineConfig,
    /// Rendering system configuration
    pub renderer: RendererConfig,
}

impl ApplicationConfig {
    /// Create a new application configuration with defaults
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            engine: EngineConfig::default(),
            renderer: RendererConfig::new(app_name),
        }
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.log_level.is_empty() {
            return Err(ConfigError::Invalid("Log level cannot be empty".to_string()));
        }
        self.renderer.validate()
    }

    /// Renderer settings with engine defaults applied
    ///
    /// Validation layers follow `debug_mode` unless the renderer config sets
    /// them explicitly.
    pub fn renderer_config(&self) -> RendererConfig {
        let mut renderer = self.renderer.clone();
        renderer.enable_validation.get_or_insert(self.engine.debug_mode);
        renderer
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(RendererConfig::default().validate().is_ok());
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RendererConfig::default().with_frames_in_flight(0).validate().is_err());
        assert!(RendererConfig::default().with_frames_in_flight(9).validate().is_err());
        assert!(RendererConfig::default().with_msaa_samples(3).validate().is_err());
        assert!(RendererConfig::default().with_max_objects(0).validate().is_err());
        assert!(RendererConfig::new("").validate().is_err());
    }

    #[test]
    fn test_polygon_mode_policy_defaults_to_fill() {
        let config = RendererConfig::default().with_wireframe(MaterialType::SolidColor);
        assert_eq!(config.polygon_mode_for(MaterialType::SolidColor), PolygonMode::Line);
        assert_eq!(config.polygon_mode_for(MaterialType::Textured), PolygonMode::Fill);
        assert_eq!(config.polygon_mode_for(MaterialType::Text), PolygonMode::Fill);
    }

    #[test]
    fn test_debug_mode_raises_log_filter() {
        let quiet = EngineConfig::new().with_log_level("warn").with_debug_mode(false);
        assert_eq!(quiet.log_filter(), "warn");
        assert_eq!(quiet.clone().with_debug_mode(true).log_filter(), "debug");
        assert_eq!(quiet.with_log_level("TRACE").with_debug_mode(true).log_filter(), "trace");

        let scoped = EngineConfig::new().with_log_level("forward_engine=trace").with_debug_mode(true);
        assert_eq!(scoped.log_filter(), "forward_engine=trace");
    }

    #[test]
    fn test_renderer_config_follows_debug_mode() {
        let mut config = ApplicationConfig::new("debug");
        config.engine.debug_mode = true;
        assert!(config.renderer_config().validation_enabled());

        config.engine.debug_mode = false;
        assert!(!config.renderer_config().validation_enabled());

        config.renderer = config.renderer.with_validation(true);
        assert!(config.renderer_config().validation_enabled());

        config.engine.log_level.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        let mut config = ApplicationConfig::new("round trip");
        config.renderer = config.renderer.with_wireframe(MaterialType::Pulse).with_msaa_samples(8);
        config.renderer.fence_timeout_ns = 1_000_000_000;

        config.save_to_file(&path).unwrap();
        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_ron_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.ron");
        std::fs::write(&path, "(renderer: (msaa_samples: 2, wireframe_materials: [Ripple]))").unwrap();

        let loaded = ApplicationConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.renderer.msaa_samples, 2);
        assert_eq!(loaded.renderer.wireframe_materials, vec![MaterialType::Ripple]);
        assert_eq!(loaded.renderer.max_objects, RendererConfig::default().max_objects);
        assert_eq!(loaded.engine, EngineConfig::default());
    }
}
