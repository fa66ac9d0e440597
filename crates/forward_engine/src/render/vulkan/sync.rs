//! Vulkan synchronization primitives for GPU/CPU coordination
//!
//! RAII wrappers for semaphores and fences, and [`FrameSync`], the set of
//! objects one frame in flight needs:
//!
//! ```text
//! acquire  --signal--> image_available --wait--> submit
//! submit   --signal--> render_finished --wait--> present
//! submit   --signal--> in_flight (CPU waits before reusing the frame slot)
//! ```

use std::sync::Arc;

use ash::vk;

use crate::render::api::GpuDevice;
use super::VulkanResult;

/// GPU-GPU synchronization primitive with automatic resource management
pub struct Semaphore {
    device: Arc<dyn GpuDevice>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a new semaphore
    pub fn new(device: Arc<dyn GpuDevice>) -> VulkanResult<Self> {
        let semaphore = device.create_semaphore()?;
        Ok(Self { device, semaphore })
    }

    /// Get the semaphore handle
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        self.device.destroy_semaphore(self.semaphore);
    }
}

/// Fence wrapper with RAII cleanup
pub struct Fence {
    device: Arc<dyn GpuDevice>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a new fence
    pub fn new(device: Arc<dyn GpuDevice>, signaled: bool) -> VulkanResult<Self> {
        let fence = device.create_fence(signaled)?;
        Ok(Self { device, fence })
    }

    /// Wait for fence
    pub fn wait(&self, timeout: u64) -> VulkanResult<()> {
        self.device.wait_for_fences(&[self.fence], timeout)
    }

    /// Reset fence
    pub fn reset(&self) -> VulkanResult<()> {
        self.device.reset_fence(self.fence)
    }

    /// Get the fence handle
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        self.device.destroy_fence(self.fence);
    }
}

/// Frame synchronization objects for in-flight frame management
pub struct FrameSync {
    /// Signaled when the acquired image is ready to be rendered to
    pub image_available: Semaphore,
    /// Signaled when rendering finished and the image can be presented
    pub render_finished: Semaphore,
    /// Signaled when the GPU is done with this frame slot (created signaled)
    pub in_flight: Fence,
}

impl FrameSync {
    /// Create frame synchronization objects
    pub fn new(device: Arc<dyn GpuDevice>) -> VulkanResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        let in_flight = Fence::new(device, true)?;

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }
}
