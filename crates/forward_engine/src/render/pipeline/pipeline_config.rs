//! Pipeline configuration and type definitions
//!
//! Fixed-function state is a pure function of the material, plus the polygon
//! mode chosen by [`RendererConfig::polygon_mode_for`](crate::core::config::RendererConfig::polygon_mode_for).

use ash::vk;

use crate::render::material::MaterialType;

/// Blending modes for different rendering effects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// Blending disabled
    Opaque,
    /// `ONE, ONE_MINUS_SRC_ALPHA` on color and alpha
    Premultiplied,
}

impl BlendMode {
    /// Source and destination factors, `None` when blending is off
    pub fn factors(self) -> Option<(vk::BlendFactor, vk::BlendFactor)> {
        match self {
            Self::Opaque => None,
            Self::Premultiplied => Some((vk::BlendFactor::ONE, vk::BlendFactor::ONE_MINUS_SRC_ALPHA)),
        }
    }
}

/// Polygon rendering mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolygonMode {
    /// Normal solid rendering
    #[default]
    Fill,
    /// Wireframe mode
    Line,
}

impl PolygonMode {
    /// Vulkan polygon mode
    pub fn to_vk(self) -> vk::PolygonMode {
        match self {
            Self::Fill => vk::PolygonMode::FILL,
            Self::Line => vk::PolygonMode::LINE,
        }
    }
}

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull back faces
    Back,
}

impl CullMode {
    /// Vulkan cull flags
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            Self::None => vk::CullModeFlags::NONE,
            Self::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Fixed-function state for one material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelinePolicy {
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writing
    pub depth_write: bool,
    /// Color blending
    pub blend_mode: BlendMode,
    /// Cull mode for backface culling
    pub cull_mode: CullMode,
    /// Fill or wireframe
    pub polygon_mode: PolygonMode,
}

impl PipelinePolicy {
    /// Policy for a material
    ///
    /// The overlay class blends and leaves the depth buffer untouched; every
    /// other material is opaque and back-face culled.
    pub fn for_material(material: MaterialType, polygon_mode: PolygonMode) -> Self {
        if material.is_overlay() {
            Self {
                depth_test: true,
                depth_write: false,
                blend_mode: BlendMode::Premultiplied,
                cull_mode: CullMode::None,
                polygon_mode,
            }
        } else {
            Self {
                depth_test: true,
                depth_write: true,
                blend_mode: BlendMode::Opaque,
                cull_mode: CullMode::Back,
                polygon_mode,
            }
        }
    }
}
