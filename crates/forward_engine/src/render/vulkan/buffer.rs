//! Uniform buffers
//!
//! Each drawable object owns one host-visible uniform buffer per stage per
//! swapchain image, rewritten every frame from its uniform producer.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{AllocatedBuffer, GpuDevice};
use crate::render::material::{UniformData, UniformLayout};
use super::{VulkanError, VulkanResult};

/// Host-visible uniform buffer sized for one uniform layout
pub struct UniformBuffer {
    device: Arc<dyn GpuDevice>,
    buffer: AllocatedBuffer,
    layout: UniformLayout,
}

impl UniformBuffer {
    /// Create a buffer for `layout`
    pub fn new(device: Arc<dyn GpuDevice>, layout: UniformLayout) -> VulkanResult<Self> {
        let buffer = device.create_buffer(layout.size() as vk::DeviceSize, vk::BufferUsageFlags::UNIFORM_BUFFER)?;
        Ok(Self { device, buffer, layout })
    }

    /// Overwrite the buffer contents
    pub fn write(&self, data: &UniformData) -> VulkanResult<()> {
        if data.layout() != self.layout {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Uniform buffer holds {:?}, got {:?}", self.layout, data.layout()),
            });
        }
        self.device.write_buffer(&self.buffer, 0, data.as_bytes())
    }

    /// Get buffer handle
    pub fn handle(&self) -> vk::Buffer {
        self.buffer.buffer
    }

    /// Get size
    pub fn size(&self) -> vk::DeviceSize {
        self.buffer.size
    }

    /// Layout this buffer was sized for
    pub fn layout(&self) -> UniformLayout {
        self.layout
    }
}

impl Drop for UniformBuffer {
    fn drop(&mut self) {
        self.device.destroy_buffer(&self.buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::material::{TintColorUniform, UniformProducer};
    use crate::render::testing::MockDevice;
    use crate::scene::camera::FrameContext;

    #[test]
    fn test_write_copies_block_bytes() {
        let device = MockDevice::new();
        let buffer = UniformBuffer::new(device.clone(), UniformLayout::TintColor).unwrap();
        let data = UniformData::TintColor(TintColorUniform { color: [0.25, 0.5, 0.75, 1.0] });

        buffer.write(&data).unwrap();
        assert_eq!(device.buffer_contents(buffer.handle()), data.as_bytes());
        assert_eq!(buffer.size(), 16);
    }

    #[test]
    fn test_write_rejects_other_layout() {
        let device = MockDevice::new();
        let buffer = UniformBuffer::new(device, UniformLayout::TintColor).unwrap();
        let data = UniformProducer::model_view_proj(crate::foundation::math::Mat4::identity())
            .produce(&FrameContext::default())
            .unwrap();
        assert!(buffer.write(&data).is_err());
    }

    #[test]
    fn test_drop_releases_memory() {
        let device = MockDevice::new();
        drop(UniformBuffer::new(device.clone(), UniformLayout::ModelViewProj).unwrap());
        assert_eq!(device.live("buffer"), 0);
        assert_eq!(device.created("buffer"), 1);
    }
}
