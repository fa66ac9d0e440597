//! Renderable object data model
//!
//! Objects are owned by the caller. The orchestrator only reads them, flips
//! `initialized_in_engine` once their GPU resources exist, and keys its own
//! bookkeeping by [`ObjectId`]. An object whose flag is set is never
//! registered again, even after its resources are destroyed. Marking an
//! object for deletion takes its whole subtree with it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk;

use crate::render::material::{MaterialType, Topology, UniformLayout, UniformProducer, VertexLayout};
use crate::foundation::math::Mat4;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique object identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Allocate a fresh id
    pub fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Material × vertex layout × topology; one pipeline per distinct value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShapeSignature {
    /// Material tag
    pub material: MaterialType,
    /// Vertex layout of the mesh
    pub vertex_layout: VertexLayout,
    /// Primitive topology of the mesh
    pub topology: Topology,
}

impl ShapeSignature {
    /// Signature using the material's default vertex layout
    pub fn for_material(material: MaterialType, topology: Topology) -> Self {
        Self {
            material,
            vertex_layout: material.default_vertex_layout(),
            topology,
        }
    }
}

impl fmt::Display for ShapeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{:?}/{:?}", self.material, self.vertex_layout, self.topology)
    }
}

/// GPU geometry uploaded by an external mesh loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshBinding {
    /// Interleaved vertex buffer
    pub vertex_buffer: vk::Buffer,
    /// Index buffer
    pub index_buffer: vk::Buffer,
    /// Number of indices to draw
    pub index_count: u32,
    /// Index element type
    pub index_type: vk::IndexType,
    /// Layout of the vertex buffer
    pub vertex_layout: VertexLayout,
    /// Primitive topology
    pub topology: Topology,
}

/// Sampled image supplied by an external texture loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureBinding {
    /// Shader-readable view
    pub image_view: vk::ImageView,
    /// Sampler
    pub sampler: vk::Sampler,
}

/// Something the caller wants drawn
#[derive(Debug, Clone)]
pub struct RenderableObject {
    /// Identity
    pub id: ObjectId,
    /// Debug name
    pub name: String,
    /// Geometry; objects without one are never drawn
    pub mesh: Option<MeshBinding>,
    /// Material tag
    pub material: MaterialType,
    /// Vertex-stage uniform producer; the material default is used when absent
    pub vertex_uniforms: Option<UniformProducer>,
    /// Fragment-stage uniform producer; the material default is used when absent
    pub fragment_uniforms: Option<UniformProducer>,
    /// Texture for materials that sample one
    pub texture: Option<TextureBinding>,
    /// Child objects, drawn after their parent
    pub children: Vec<RenderableObject>,
    /// Set by the orchestrator once GPU resources exist
    pub initialized_in_engine: bool,
    /// Set by gameplay to request teardown
    pub marked_for_deletion: bool,
}

impl RenderableObject {
    /// Create an object with a material and nothing else
    pub fn new(name: impl Into<String>, material: MaterialType) -> Self {
        Self {
            id: ObjectId::next(),
            name: name.into(),
            mesh: None,
            material,
            vertex_uniforms: None,
            fragment_uniforms: None,
            texture: None,
            children: Vec::new(),
            initialized_in_engine: false,
            marked_for_deletion: false,
        }
    }

    /// Attach geometry
    pub fn with_mesh(mut self, mesh: MeshBinding) -> Self {
        self.mesh = Some(mesh);
        self
    }

    /// Attach a vertex-stage uniform producer
    pub fn with_vertex_uniforms(mut self, producer: UniformProducer) -> Self {
        self.vertex_uniforms = Some(producer);
        self
    }

    /// Attach a fragment-stage uniform producer
    pub fn with_fragment_uniforms(mut self, producer: UniformProducer) -> Self {
        self.fragment_uniforms = Some(producer);
        self
    }

    /// Attach a texture
    pub fn with_texture(mut self, texture: TextureBinding) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Attach a child object
    pub fn with_child(mut self, child: RenderableObject) -> Self {
        self.children.push(child);
        self
    }

    /// Request teardown on the next synchronization
    pub fn mark_for_deletion(&mut self) {
        self.marked_for_deletion = true;
    }

    /// Whether the object produces a draw call
    pub fn is_drawable(&self) -> bool {
        self.mesh.is_some() && self.material.is_drawable()
    }

    /// Pipeline signature, if drawable
    pub fn signature(&self) -> Option<ShapeSignature> {
        let mesh = self.mesh.as_ref()?;
        self.material.is_drawable().then_some(ShapeSignature {
            material: self.material,
            vertex_layout: mesh.vertex_layout,
            topology: mesh.topology,
        })
    }

    /// Vertex-stage producer, falling back to the material default
    pub fn vertex_producer(&self) -> UniformProducer {
        self.vertex_uniforms
            .clone()
            .unwrap_or_else(|| default_producer(self.material.vertex_uniform_layout()))
    }

    /// Fragment-stage producer, if the material has a fragment block
    pub fn fragment_producer(&self) -> Option<UniformProducer> {
        let layout = self.material.fragment_uniform_layout()?;
        Some(self.fragment_uniforms.clone().unwrap_or_else(|| default_producer(layout)))
    }

    /// Visit this object and its descendants depth-first, parent first
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a RenderableObject)) {
        f(self);
        for child in &self.children {
            child.visit(f);
        }
    }

    /// Depth-first visit that skips the whole subtree of a marked object
    pub fn visit_unmarked<'a>(&'a self, f: &mut impl FnMut(&'a RenderableObject)) {
        if self.marked_for_deletion {
            return;
        }
        f(self);
        for child in &self.children {
            child.visit_unmarked(f);
        }
    }

    /// Mutable depth-first visit, parent first
    pub fn visit_mut(&mut self, f: &mut impl FnMut(&mut RenderableObject)) {
        f(self);
        for child in &mut self.children {
            child.visit_mut(f);
        }
    }
}

fn default_producer(layout: UniformLayout) -> UniformProducer {
    match layout {
        UniformLayout::ModelViewProj => UniformProducer::model_view_proj(Mat4::identity()),
        UniformLayout::ModelViewProjTime => UniformProducer::model_view_proj_time(Mat4::identity()),
        UniformLayout::ModelViewProjRipple => UniformProducer::ripple(Mat4::identity(), 0.1, 2.0, 1.0),
        UniformLayout::TintColor => UniformProducer::tint(crate::foundation::math::Vec4::new(1.0, 1.0, 1.0, 1.0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn mesh(layout: VertexLayout) -> MeshBinding {
        MeshBinding {
            vertex_buffer: vk::Buffer::from_raw(1),
            index_buffer: vk::Buffer::from_raw(2),
            index_count: 6,
            index_type: vk::IndexType::UINT32,
            vertex_layout: layout,
            topology: Topology::TriangleList,
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let a = RenderableObject::new("a", MaterialType::SolidColor);
        let b = RenderableObject::new("b", MaterialType::SolidColor);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_signature_requires_mesh_and_material() {
        let no_mesh = RenderableObject::new("empty", MaterialType::SolidColor);
        assert_eq!(no_mesh.signature(), None);

        let unspecified = RenderableObject::new("blank", MaterialType::Unspecified)
            .with_mesh(mesh(VertexLayout::PositionColor));
        assert_eq!(unspecified.signature(), None);
        assert!(!unspecified.is_drawable());

        let text = RenderableObject::new("label", MaterialType::Text).with_mesh(mesh(VertexLayout::PositionUv));
        assert_eq!(
            text.signature(),
            Some(ShapeSignature::for_material(MaterialType::Text, Topology::TriangleList))
        );
    }

    #[test]
    fn test_signature_display_names_all_parts() {
        let signature = ShapeSignature::for_material(MaterialType::Pulse, Topology::TriangleStrip);
        assert_eq!(signature.to_string(), "Pulse/PositionNormalUvColor/TriangleStrip");
    }

    #[test]
    fn test_visit_is_depth_first() {
        let tree = RenderableObject::new("root", MaterialType::SolidColor)
            .with_child(RenderableObject::new("a", MaterialType::SolidColor)
                .with_child(RenderableObject::new("a1", MaterialType::SolidColor)))
            .with_child(RenderableObject::new("b", MaterialType::SolidColor));

        let mut names = Vec::new();
        tree.visit(&mut |object| names.push(object.name.clone()));
        assert_eq!(names, ["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_visit_unmarked_skips_marked_subtree() {
        let mut tree = RenderableObject::new("root", MaterialType::SolidColor)
            .with_child(RenderableObject::new("a", MaterialType::SolidColor)
                .with_child(RenderableObject::new("a1", MaterialType::SolidColor)))
            .with_child(RenderableObject::new("b", MaterialType::SolidColor));
        tree.children[0].mark_for_deletion();

        let mut names = Vec::new();
        tree.visit_unmarked(&mut |object| names.push(object.name.clone()));
        assert_eq!(names, ["root", "b"]);

        tree.mark_for_deletion();
        let mut count = 0;
        tree.visit_unmarked(&mut |_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_default_producers_follow_material() {
        let pulse = RenderableObject::new("pulse", MaterialType::Pulse);
        assert_eq!(pulse.vertex_producer().layout(), UniformLayout::ModelViewProjTime);
        assert!(pulse.fragment_producer().is_none());

        let overlay = RenderableObject::new("hud", MaterialType::Overlay);
        assert_eq!(overlay.fragment_producer().map(|p| p.layout()), Some(UniformLayout::TintColor));
    }
}
