//! Material system
//!
//! Material tags, the vertex layouts meshes are built with, and the uniform
//! blocks objects feed their shaders.

pub mod material_type;
pub mod uniforms;
pub mod vertex_layout;

pub use material_type::{MaterialType, ShaderPair};
pub use uniforms::{
    ModelViewProjTimeUniform, ModelViewProjUniform, RippleUniform, TintColorUniform,
    UniformData, UniformLayout, UniformProducer,
};
pub use vertex_layout::{Topology, VertexLayout};
