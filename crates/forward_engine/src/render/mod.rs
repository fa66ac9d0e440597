//! # Rendering System
//!
//! A forward renderer that keeps one Vulkan pipeline per distinct shape
//! signature and records every swapchain image's draws ahead of time.
//!
//! ## Architecture
//!
//! - **Device API**: [`api::GpuDevice`], the narrow interface every GPU call
//!   goes through
//! - **Vulkan Backend**: ash implementation of that interface plus RAII
//!   wrappers for swapchain, render pass, buffers, descriptors and commands
//! - **Pipelines**: fixed-function policy per material and the signature-keyed
//!   cache
//! - **Orchestrator**: double-buffered command sets, object lifecycle and the
//!   deferred removal queue
//! - **Frame Driver**: acquire, submit and present with frames in flight
//!
//! ## Frame Flow
//!
//! ```text
//! synchronize_objects ──> pending set re-recorded
//! draw_frame ──> wait fence ──> acquire ──> update (swap + release)
//!            ──> update_uniforms ──> submit active ──> present
//! ```

pub mod api;
pub mod frame;
pub mod material;
pub mod object;
pub mod orchestrator;
pub mod pipeline;
pub mod vulkan;

#[cfg(test)]
pub mod testing;

pub use api::GpuDevice;
pub use frame::{FrameDriver, FrameStatus};
pub use material::{MaterialType, Topology, UniformData, UniformLayout, UniformProducer, VertexLayout};
pub use object::{MeshBinding, ObjectId, RenderableObject, ShapeSignature, TextureBinding};
pub use orchestrator::{ObjectState, RenderOrchestrator, SyncReport};
pub use pipeline::{BlendMode, CullMode, PipelinePolicy, PolygonMode};
pub use vulkan::{ShaderCache, ShaderProvider, VulkanDevice, VulkanError, VulkanResult};
