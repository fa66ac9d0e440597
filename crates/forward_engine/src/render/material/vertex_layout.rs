//! Vertex layout definitions
//!
//! Meshes are uploaded by external loaders; the renderer only needs to know
//! how each layout is laid out in the vertex buffer so it can describe the
//! input state of a pipeline.

use ash::vk;
use serde::{Serialize, Deserialize};

const F32: u32 = std::mem::size_of::<f32>() as u32;

/// Supported interleaved vertex layouts (single binding)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VertexLayout {
    /// vec3 position, vec4 color
    PositionColor,
    /// vec3 position, vec2 uv
    PositionUv,
    /// vec3 position, vec3 normal, vec2 uv
    PositionNormalUv,
    /// vec3 position, vec3 normal, vec2 uv, vec4 color
    PositionNormalUvColor,
}

impl VertexLayout {
    /// Component counts of each attribute in location order
    fn components(self) -> &'static [u32] {
        match self {
            Self::PositionColor => &[3, 4],
            Self::PositionUv => &[3, 2],
            Self::PositionNormalUv => &[3, 3, 2],
            Self::PositionNormalUvColor => &[3, 3, 2, 4],
        }
    }

    /// Number of vertex attributes
    pub fn attribute_count(self) -> u32 {
        self.components().len() as u32
    }

    /// Bytes between consecutive vertices
    pub fn stride(self) -> u32 {
        self.components().iter().sum::<u32>() * F32
    }

    /// Binding description for binding 0
    pub fn binding_description(self) -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: self.stride(),
            input_rate: vk::VertexInputRate::VERTEX,
        }
    }

    /// Attribute descriptions, locations numbered from 0
    pub fn attribute_descriptions(self) -> Vec<vk::VertexInputAttributeDescription> {
        let mut offset = 0;
        self.components()
            .iter()
            .enumerate()
            .map(|(location, &components)| {
                let format = match components {
                    2 => vk::Format::R32G32_SFLOAT,
                    3 => vk::Format::R32G32B32_SFLOAT,
                    _ => vk::Format::R32G32B32A32_SFLOAT,
                };
                let description = vk::VertexInputAttributeDescription {
                    binding: 0,
                    location: location as u32,
                    format,
                    offset,
                };
                offset += components * F32;
                description
            })
            .collect()
    }
}

/// Primitive topology of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Topology {
    /// Independent triangles
    TriangleList,
    /// Triangle strip
    TriangleStrip,
}

impl Topology {
    /// Vulkan primitive topology
    pub fn to_vk(self) -> vk::PrimitiveTopology {
        match self {
            Self::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
            Self::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        }
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::TriangleList
    }
}
