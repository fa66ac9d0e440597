//! Material type definitions
//!
//! A material is a tag. Everything the renderer needs to know about it
//! (shaders, default vertex layout, uniform layouts, texture use, draw class)
//! is a fixed property of the tag.

use serde::{Serialize, Deserialize};

use super::uniforms::UniformLayout;
use super::vertex_layout::VertexLayout;

/// Enumeration of supported material types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaterialType {
    /// No material assigned; never drawn
    Unspecified,
    /// Flat per-vertex color
    SolidColor,
    /// Single sampled texture
    Textured,
    /// Color that pulses over time
    Pulse,
    /// Vertex displacement ripple
    Ripple,
    /// Screen-space overlay quad, blended over the scene
    Overlay,
    /// Glyph quads sampling a font atlas, blended over the scene
    Text,
}

/// Vertex and fragment shader file names for a material
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderPair {
    /// Vertex shader file, relative to the shader directory
    pub vertex: &'static str,
    /// Fragment shader file, relative to the shader directory
    pub fragment: &'static str,
}

impl MaterialType {
    /// All materials that produce draw calls
    pub const DRAWABLE: [Self; 6] = [
        Self::SolidColor,
        Self::Textured,
        Self::Pulse,
        Self::Ripple,
        Self::Overlay,
        Self::Text,
    ];

    /// Whether objects with this material can be drawn at all
    pub fn is_drawable(self) -> bool {
        self != Self::Unspecified
    }

    /// Overlay and text materials are drawn after everything else with
    /// blending on and depth writes off
    pub fn is_overlay(self) -> bool {
        matches!(self, Self::Overlay | Self::Text)
    }

    /// Whether the material binds a combined image sampler
    pub fn samples_texture(self) -> bool {
        matches!(self, Self::Textured | Self::Ripple | Self::Text)
    }

    /// Shader files for this material
    pub fn shaders(self) -> Option<ShaderPair> {
        let (vertex, fragment) = match self {
            Self::Unspecified => return None,
            Self::SolidColor => ("solid_color_vert.spv", "solid_color_frag.spv"),
            Self::Textured => ("textured_vert.spv", "textured_frag.spv"),
            Self::Pulse => ("pulse_vert.spv", "pulse_frag.spv"),
            Self::Ripple => ("ripple_vert.spv", "textured_frag.spv"),
            Self::Overlay => ("overlay_vert.spv", "overlay_frag.spv"),
            Self::Text => ("text_vert.spv", "text_frag.spv"),
        };
        Some(ShaderPair { vertex, fragment })
    }

    /// Vertex layout meshes for this material are normally built with
    pub fn default_vertex_layout(self) -> VertexLayout {
        match self {
            Self::Unspecified | Self::SolidColor | Self::Overlay => VertexLayout::PositionColor,
            Self::Textured | Self::Ripple => VertexLayout::PositionNormalUv,
            Self::Pulse => VertexLayout::PositionNormalUvColor,
            Self::Text => VertexLayout::PositionUv,
        }
    }

    /// Uniform layout bound to the vertex stage (binding 0)
    pub fn vertex_uniform_layout(self) -> UniformLayout {
        match self {
            Self::Pulse => UniformLayout::ModelViewProjTime,
            Self::Ripple => UniformLayout::ModelViewProjRipple,
            _ => UniformLayout::ModelViewProj,
        }
    }

    /// Uniform layout bound to the fragment stage (binding 1), if any
    pub fn fragment_uniform_layout(self) -> Option<UniformLayout> {
        match self {
            Self::Overlay | Self::Text => Some(UniformLayout::TintColor),
            _ => None,
        }
    }
}

impl Default for MaterialType {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl std::fmt::Display for MaterialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_class() {
        let overlay: Vec<_> = MaterialType::DRAWABLE.iter().filter(|m| m.is_overlay()).collect();
        assert_eq!(overlay, vec![&MaterialType::Overlay, &MaterialType::Text]);
        assert!(!MaterialType::Unspecified.is_overlay());
    }

    #[test]
    fn test_every_drawable_material_has_shaders() {
        for material in MaterialType::DRAWABLE {
            assert!(material.shaders().is_some(), "{material} has no shaders");
        }
        assert!(MaterialType::Unspecified.shaders().is_none());
        assert!(!MaterialType::Unspecified.is_drawable());
    }

    #[test]
    fn test_text_material_samples_and_tints() {
        assert!(MaterialType::Text.samples_texture());
        assert_eq!(MaterialType::Text.fragment_uniform_layout(), Some(UniformLayout::TintColor));
        assert_eq!(MaterialType::SolidColor.fragment_uniform_layout(), None);
    }
}
