//! Pipeline management
//!
//! Per-material fixed-function policy, the pipeline object built for one shape
//! signature, and the signature-keyed cache shared by every object.

pub mod graphics_pipeline;
pub mod pipeline_cache;
pub mod pipeline_config;

pub use graphics_pipeline::PipelineObject;
pub use pipeline_cache::PipelineCache;
pub use pipeline_config::{BlendMode, CullMode, PipelinePolicy, PolygonMode};
