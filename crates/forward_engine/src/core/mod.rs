//! # Core Engine Module
//!
//! Configuration shared by the renderer and the application around it.

pub mod config;

pub use config::{ApplicationConfig, Config, ConfigError, DepthFormat, EngineConfig, RendererConfig};
