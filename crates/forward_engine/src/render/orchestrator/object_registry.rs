//! Orchestrator-side record of every registered object
//!
//! Drawable objects own one uniform buffer per stage and one descriptor set
//! for every swapchain image. Non-drawable objects are recorded without GPU
//! resources so that registering them again is a no-op.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ash::vk;

use crate::render::api::{DescriptorWrite, GpuDevice};
use crate::render::material::UniformProducer;
use crate::render::object::{ObjectId, RenderableObject, ShapeSignature, TextureBinding};
use crate::render::pipeline::{PipelineCache, PipelineObject};
use crate::render::vulkan::descriptor_set::{FRAGMENT_UNIFORM_BINDING, TEXTURE_BINDING, VERTEX_UNIFORM_BINDING};
use crate::render::vulkan::{DescriptorPool, UniformBuffer, VulkanError, VulkanResult};
use crate::scene::camera::FrameContext;

/// Lifecycle of an object as seen by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectState {
    /// Never seen
    Unregistered,
    /// Seen; its pipeline is being built
    PipelineBuilding,
    /// Resources allocated, included in recordings
    Initialized,
    /// Excluded from recordings, resources not yet released
    PendingRemoval,
    /// Resources released
    Destroyed,
}

struct FrameUniforms {
    vertex: UniformBuffer,
    fragment: Option<UniformBuffer>,
}

/// GPU resources of one drawable object
pub struct ObjectResources {
    signature: ShapeSignature,
    frames: Vec<FrameUniforms>,
    descriptor_sets: Vec<vk::DescriptorSet>,
    vertex_producer: UniformProducer,
    fragment_producer: Option<UniformProducer>,
    texture: Option<TextureBinding>,
}

impl ObjectResources {
    /// Allocate buffers and descriptor sets for every swapchain image
    ///
    /// The object's producers are run once against `frame` to check they
    /// match the material, and their output seeds every buffer.
    pub fn allocate(
        device: &Arc<dyn GpuDevice>,
        pool: &mut DescriptorPool,
        pipeline: &PipelineObject,
        object: &RenderableObject,
        image_count: usize,
        frame: &FrameContext,
    ) -> VulkanResult<Self> {
        let signature = pipeline.signature();
        let material = signature.material;
        let invalid = |reason: String| VulkanError::InvalidOperation {
            reason: format!("Object {} ({}): {reason}", object.id, object.name),
        };

        let vertex_producer = object.vertex_producer();
        if vertex_producer.layout() != material.vertex_uniform_layout() {
            return Err(invalid(format!(
                "{material} expects {:?} vertex uniforms, got {:?}",
                material.vertex_uniform_layout(),
                vertex_producer.layout()
            )));
        }
        let fragment_producer = object.fragment_producer();
        if object.fragment_uniforms.is_some() && fragment_producer.is_none() {
            return Err(invalid(format!("{material} has no fragment uniform block")));
        }
        if let Some(producer) = &fragment_producer {
            if Some(producer.layout()) != material.fragment_uniform_layout() {
                return Err(invalid(format!(
                    "{material} expects {:?} fragment uniforms, got {:?}",
                    material.fragment_uniform_layout(),
                    producer.layout()
                )));
            }
        }
        let texture = if material.samples_texture() {
            Some(object.texture.ok_or_else(|| invalid(format!("{material} requires a texture")))?)
        } else {
            None
        };

        let vertex_data = vertex_producer.produce(frame)?;
        let fragment_data = fragment_producer.as_ref().map(|p| p.produce(frame)).transpose()?;

        let mut frames = Vec::with_capacity(image_count);
        for _ in 0..image_count {
            let vertex = UniformBuffer::new(device.clone(), vertex_producer.layout())?;
            vertex.write(&vertex_data)?;
            let fragment = match (&fragment_producer, &fragment_data) {
                (Some(producer), Some(data)) => {
                    let buffer = UniformBuffer::new(device.clone(), producer.layout())?;
                    buffer.write(data)?;
                    Some(buffer)
                }
                _ => None,
            };
            frames.push(FrameUniforms { vertex, fragment });
        }

        let layouts = vec![pipeline.set_layout().handle(); image_count];
        let descriptor_sets = pool.allocate(&layouts)?;

        for (set, uniforms) in descriptor_sets.iter().zip(&frames) {
            let mut writes = vec![DescriptorWrite::UniformBuffer {
                binding: VERTEX_UNIFORM_BINDING,
                buffer: uniforms.vertex.handle(),
                range: uniforms.vertex.size(),
            }];
            if let Some(fragment) = &uniforms.fragment {
                writes.push(DescriptorWrite::UniformBuffer {
                    binding: FRAGMENT_UNIFORM_BINDING,
                    buffer: fragment.handle(),
                    range: fragment.size(),
                });
            }
            if let Some(texture) = texture {
                writes.push(DescriptorWrite::CombinedImageSampler {
                    binding: TEXTURE_BINDING,
                    image_view: texture.image_view,
                    sampler: texture.sampler,
                });
            }
            device.update_descriptor_set(*set, &writes);
        }

        Ok(Self {
            signature,
            frames,
            descriptor_sets,
            vertex_producer,
            fragment_producer,
            texture,
        })
    }

    /// Refresh the buffers of one swapchain image
    ///
    /// Producers set on `object` take precedence over the ones captured at
    /// registration.
    pub fn update(&self, image_index: usize, object: &RenderableObject, frame: &FrameContext) -> VulkanResult<()> {
        let Some(uniforms) = self.frames.get(image_index) else {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Image index {image_index} out of range for object {}", object.id),
            });
        };

        let vertex_producer = object.vertex_uniforms.as_ref().unwrap_or(&self.vertex_producer);
        uniforms.vertex.write(&vertex_producer.produce(frame)?)?;

        if let Some(buffer) = &uniforms.fragment {
            let producer = object.fragment_uniforms.as_ref().or(self.fragment_producer.as_ref());
            if let Some(producer) = producer {
                buffer.write(&producer.produce(frame)?)?;
            }
        }
        Ok(())
    }

    /// Descriptor set for every swapchain image
    pub fn descriptor_sets(&self) -> &[vk::DescriptorSet] {
        &self.descriptor_sets
    }

    /// Signature of the pipeline the object uses
    pub fn signature(&self) -> ShapeSignature {
        self.signature
    }

    /// Texture bound at registration
    pub fn texture(&self) -> Option<TextureBinding> {
        self.texture
    }

    /// Vertex-stage uniform buffer of one image
    pub fn vertex_buffer(&self, image_index: usize) -> Option<vk::Buffer> {
        self.frames.get(image_index).map(|f| f.vertex.handle())
    }

    /// Return the descriptor sets to the pool; buffers are released on drop
    fn release(self, pool: &mut DescriptorPool) -> VulkanResult<()> {
        pool.free(&self.descriptor_sets)
    }
}

struct ObjectRecord {
    state: ObjectState,
    resources: Option<ObjectResources>,
}

/// Every object the orchestrator knows about
#[derive(Default)]
pub struct ObjectRegistry {
    records: HashMap<ObjectId, ObjectRecord>,
    destroyed: HashSet<ObjectId>,
}

impl ObjectRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Lifecycle state of `id`
    pub fn state(&self, id: ObjectId) -> ObjectState {
        match self.records.get(&id) {
            Some(record) => record.state,
            None if self.destroyed.contains(&id) => ObjectState::Destroyed,
            None => ObjectState::Unregistered,
        }
    }

    /// Whether `id` has a live record
    pub fn contains(&self, id: ObjectId) -> bool {
        self.records.contains_key(&id)
    }

    /// Ids with a live record
    pub fn ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.records.keys().copied()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there are no live records
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Record `id` as waiting for its pipeline
    pub fn begin(&mut self, id: ObjectId) {
        self.records.insert(id, ObjectRecord {
            state: ObjectState::PipelineBuilding,
            resources: None,
        });
    }

    /// Mark `id` initialized, optionally with GPU resources
    pub fn complete(&mut self, id: ObjectId, resources: Option<ObjectResources>) {
        self.records.insert(id, ObjectRecord {
            state: ObjectState::Initialized,
            resources,
        });
    }

    /// Exclude `id` from future recordings; returns whether it was initialized
    pub fn mark_pending_removal(&mut self, id: ObjectId) -> bool {
        match self.records.get_mut(&id) {
            Some(record) if record.state == ObjectState::Initialized => {
                record.state = ObjectState::PendingRemoval;
                true
            }
            _ => false,
        }
    }

    /// Resources of an initialized object
    pub fn resources(&self, id: ObjectId) -> Option<&ObjectResources> {
        self.records
            .get(&id)
            .filter(|record| record.state == ObjectState::Initialized)
            .and_then(|record| record.resources.as_ref())
    }

    /// Release everything `id` holds and drop its pipeline use
    ///
    /// The id is remembered as [`ObjectState::Destroyed`] until
    /// [`Self::forget_destroyed`] drops it.
    pub fn destroy(&mut self, id: ObjectId, pool: &mut DescriptorPool, pipelines: &mut PipelineCache) -> VulkanResult<()> {
        if self.records.contains_key(&id) {
            self.destroyed.insert(id);
        }
        self.discard(id, pool, pipelines)?;
        log::debug!("Destroyed resources of object {}", id);
        Ok(())
    }

    /// Drop the record of `id` in any state, releasing what it holds, and
    /// leave it unregistered
    pub fn discard(&mut self, id: ObjectId, pool: &mut DescriptorPool, pipelines: &mut PipelineCache) -> VulkanResult<()> {
        let Some(record) = self.records.remove(&id) else {
            return Ok(());
        };
        if let Some(resources) = record.resources {
            let signature = resources.signature();
            resources.release(pool)?;
            pipelines.release(signature);
        }
        Ok(())
    }

    /// Keep only the destroyed ids for which `keep` returns true
    pub fn forget_destroyed(&mut self, mut keep: impl FnMut(ObjectId) -> bool) {
        self.destroyed.retain(|&id| keep(id));
    }

    /// Number of ids remembered as destroyed
    pub fn destroyed_len(&self) -> usize {
        self.destroyed.len()
    }

    /// Take the resources of every object, leaving its record resource-less
    ///
    /// Used when the swapchain image count changes. Descriptor sets are
    /// returned to `pool`; pipeline uses are kept. Returns the affected ids
    /// with their signatures.
    pub fn release_all_resources(&mut self, pool: &mut DescriptorPool) -> VulkanResult<Vec<(ObjectId, ShapeSignature)>> {
        let mut released = Vec::new();
        for (&id, record) in &mut self.records {
            if let Some(resources) = record.resources.take() {
                released.push((id, resources.signature()));
                resources.release(pool)?;
            }
        }
        Ok(released)
    }

    /// Reattach resources to an object taken by [`Self::release_all_resources`]
    pub fn restore(&mut self, id: ObjectId, resources: ObjectResources) {
        if let Some(record) = self.records.get_mut(&id) {
            record.resources = Some(resources);
        }
    }

    /// Drop every record without touching the pool
    pub fn clear(&mut self) {
        self.records.clear();
        self.destroyed.clear();
    }
}
