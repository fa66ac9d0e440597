//! Descriptor set layouts and the per-object descriptor pool
//!
//! Per-object sets use a fixed binding scheme:
//!
//! | binding | contents | stage |
//! |---|---|---|
//! | 0 | vertex uniform block | vertex |
//! | 1 | fragment uniform block (if the material has one) | fragment |
//! | 2 | combined image sampler (if the material samples a texture) | fragment |

use std::sync::Arc;

use ash::vk;

use crate::render::api::GpuDevice;
use crate::render::material::MaterialType;
use super::{VulkanError, VulkanResult};

/// Binding of the vertex-stage uniform block
pub const VERTEX_UNIFORM_BINDING: u32 = 0;
/// Binding of the fragment-stage uniform block
pub const FRAGMENT_UNIFORM_BINDING: u32 = 1;
/// Binding of the texture sampler
pub const TEXTURE_BINDING: u32 = 2;

/// Descriptor set layout builder for creating reusable layouts
#[derive(Default)]
pub struct DescriptorSetLayoutBuilder {
    bindings: Vec<vk::DescriptorSetLayoutBinding>,
}

impl DescriptorSetLayoutBuilder {
    /// Create a new descriptor set layout builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Bindings a material's per-object set needs
    pub fn for_material(material: MaterialType) -> Self {
        let mut builder = Self::new().add_uniform_buffer(VERTEX_UNIFORM_BINDING, vk::ShaderStageFlags::VERTEX);
        if material.fragment_uniform_layout().is_some() {
            builder = builder.add_uniform_buffer(FRAGMENT_UNIFORM_BINDING, vk::ShaderStageFlags::FRAGMENT);
        }
        if material.samples_texture() {
            builder = builder.add_combined_image_sampler(TEXTURE_BINDING, vk::ShaderStageFlags::FRAGMENT);
        }
        builder
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build()
        );
        self
    }

    /// Add a combined image sampler binding
    pub fn add_combined_image_sampler(mut self, binding: u32, stage_flags: vk::ShaderStageFlags) -> Self {
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::builder()
                .binding(binding)
                .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                .descriptor_count(1)
                .stage_flags(stage_flags)
                .build()
        );
        self
    }

    /// Bindings added so far
    pub fn bindings(&self) -> &[vk::DescriptorSetLayoutBinding] {
        &self.bindings
    }

    /// Build the descriptor set layout
    pub fn build(self, device: Arc<dyn GpuDevice>) -> VulkanResult<DescriptorSetLayout> {
        let layout = device.create_descriptor_set_layout(&self.bindings)?;
        Ok(DescriptorSetLayout {
            layout,
            device,
            bindings: self.bindings.iter().map(|b| (b.binding, b.descriptor_type)).collect(),
        })
    }
}

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Arc<dyn GpuDevice>,
    bindings: Vec<(u32, vk::DescriptorType)>,
}

impl DescriptorSetLayout {
    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Binding numbers and descriptor types of this layout
    pub fn bindings(&self) -> &[(u32, vk::DescriptorType)] {
        &self.bindings
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        self.device.destroy_descriptor_set_layout(self.layout);
    }
}

/// Descriptor pool for per-object sets, freed individually
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Arc<dyn GpuDevice>,
    capacity: u32,
    allocated: u32,
}

impl DescriptorPool {
    /// Create a pool for `max_objects` objects with one set per swapchain image
    ///
    /// Every set may hold two uniform buffers and one sampler.
    pub fn new(device: Arc<dyn GpuDevice>, max_objects: u32, image_count: u32) -> VulkanResult<Self> {
        let capacity = max_objects.saturating_mul(image_count);
        let pool_sizes = [
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::UNIFORM_BUFFER,
                descriptor_count: capacity.saturating_mul(2),
            },
            vk::DescriptorPoolSize {
                ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                descriptor_count: capacity,
            },
        ];

        let pool = device.create_descriptor_pool(capacity, &pool_sizes)?;
        log::debug!("Created descriptor pool for {} sets", capacity);
        Ok(Self { pool, device, capacity, allocated: 0 })
    }

    /// Allocate one set per layout
    pub fn allocate(&mut self, layouts: &[vk::DescriptorSetLayout]) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let requested = layouts.len() as u32;
        if self.allocated + requested > self.capacity {
            return Err(VulkanError::ResourceCreation {
                resource: "descriptor sets",
                source: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
            });
        }

        let sets = self.device.allocate_descriptor_sets(self.pool, layouts)?;
        self.allocated += requested;
        Ok(sets)
    }

    /// Return sets to the pool
    pub fn free(&mut self, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        if sets.is_empty() {
            return Ok(());
        }
        self.device.free_descriptor_sets(self.pool, sets)?;
        self.allocated = self.allocated.saturating_sub(sets.len() as u32);
        Ok(())
    }

    /// Sets currently allocated
    pub fn allocated(&self) -> u32 {
        self.allocated
    }

    /// Maximum number of sets
    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        self.device.destroy_descriptor_pool(self.pool);
    }
}
