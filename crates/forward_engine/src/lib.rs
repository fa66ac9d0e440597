//! # Forward Engine
//!
//! A Vulkan forward renderer built around precompiled command buffers.
//!
//! ## Features
//!
//! - **Pipeline Cache**: one pipeline per material, vertex layout and topology,
//!   built concurrently the first time a shape appears
//! - **Double-Buffered Recording**: changes are recorded into a pending set
//!   that replaces the active set only after in-flight frames finish
//! - **Deferred Teardown**: removed objects keep their GPU resources until no
//!   submitted command buffer can reference them
//! - **Resize Handling**: surface-dependent state is rebuilt from scratch
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use forward_engine::prelude::*;
//!
//! fn run(device: Arc<dyn GpuDevice>, mut objects: Vec<RenderableObject>) -> VulkanResult<()> {
//!     let app = ApplicationConfig::load_from_file("forward_engine.toml").unwrap_or_default();
//!     forward_engine::foundation::logging::init_from_config(&app.engine);
//!     let config = app.renderer_config();
//!     let shaders = Arc::new(ShaderCache::new(device.clone(), &config.shader_directory));
//!     let window = vk::Extent2D { width: 1280, height: 720 };
//!
//!     let mut orchestrator = RenderOrchestrator::construct(device, shaders, config, window, &mut objects)?;
//!     let mut driver = FrameDriver::new(&orchestrator)?;
//!     let mut frame = FrameContext::default();
//!
//!     loop {
//!         frame.advance(1.0 / 60.0);
//!         orchestrator.synchronize_objects(&mut objects)?;
//!         if driver.draw_frame(&mut orchestrator, &objects, &frame)? == FrameStatus::SurfaceOutdated {
//!             driver.recreate_surface(&mut orchestrator, window, &mut objects)?;
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod scene;

/// Common imports for renderer users
pub mod prelude {
    pub use crate::{
        core::config::{ApplicationConfig, Config, EngineConfig, RendererConfig},
        foundation::math::{Mat4, Vec3, Vec4},
        render::{
            FrameDriver, FrameStatus, GpuDevice, MaterialType, MeshBinding, RenderOrchestrator,
            RenderableObject, ShaderCache, ShaderProvider, TextureBinding, Topology, UniformProducer,
            VulkanDevice, VulkanError, VulkanResult,
        },
        scene::{Camera, FrameContext},
    };
}
