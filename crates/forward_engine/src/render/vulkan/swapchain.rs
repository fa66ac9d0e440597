//! Vulkan swapchain management
//!
//! Selection rules for format, present mode, extent and image count are pure
//! functions over the surface support. The [`Swapchain`] wrapper is never
//! patched in place: on resize it is dropped and built again.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{AcquireOutcome, GpuDevice, PresentOutcome, SwapchainDesc};
use super::{VulkanError, VulkanResult};

/// Prefer sRGB BGRA8, otherwise the first format the surface reports
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> VulkanResult<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|sf| sf.format == vk::Format::B8G8R8A8_SRGB && sf.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        .or_else(|| formats.first())
        .copied()
        .ok_or_else(|| VulkanError::InitializationFailed("Surface reports no supported formats".to_string()))
}

/// Prefer MAILBOX, then IMMEDIATE, then FIFO (always available)
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::IMMEDIATE]
        .into_iter()
        .find(|mode| modes.contains(mode))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// Use the surface's current extent unless it defers to the window
pub fn choose_extent(caps: &vk::SurfaceCapabilitiesKHR, window_extent: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: window_extent.width.clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: window_extent.height.clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// One more than the minimum, capped at the maximum when there is one
pub fn choose_image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = caps.min_image_count.saturating_add(1).max(caps.min_image_count);
    if caps.max_image_count > 0 {
        desired.min(caps.max_image_count)
    } else {
        desired
    }
}

/// Swapchain management wrapper with RAII cleanup
pub struct Swapchain {
    device: Arc<dyn GpuDevice>,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    present_mode: vk::PresentModeKHR,
    extent: vk::Extent2D,
}

impl Swapchain {
    /// Query the surface and build a swapchain for `window_extent`
    pub fn new(device: Arc<dyn GpuDevice>, window_extent: vk::Extent2D) -> VulkanResult<Self> {
        let support = device.surface_support()?;
        let caps = &support.capabilities;

        let format = choose_surface_format(&support.formats)?;
        let present_mode = choose_present_mode(&support.present_modes);
        let extent = choose_extent(caps, window_extent);
        let image_count = choose_image_count(caps);

        let swapchain = device.create_swapchain(&SwapchainDesc {
            surface_format: format,
            present_mode,
            extent,
            image_count,
            pre_transform: caps.current_transform,
        })?;

        let mut this = Self {
            device,
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            present_mode,
            extent,
        };

        this.images = this.device.swapchain_images(swapchain)?;
        for &image in &this.images {
            let view = this.device.create_image_view(image, format.format, vk::ImageAspectFlags::COLOR)?;
            this.image_views.push(view);
        }

        log::info!(
            "Created swapchain: {}x{}, {} images, {:?}, {:?}",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode
        );
        Ok(this)
    }

    /// Acquire the next image, signaling `semaphore` when it is ready
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore, timeout: u64) -> VulkanResult<AcquireOutcome> {
        self.device.acquire_next_image(self.swapchain, timeout, semaphore)
    }

    /// Present `image_index` once `wait` is signaled
    pub fn present(&self, image_index: u32, wait: vk::Semaphore) -> VulkanResult<PresentOutcome> {
        self.device.queue_present(self.swapchain, image_index, wait)
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Get image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.image_views
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Number of presentable images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        for &image_view in &self.image_views {
            self.device.destroy_image_view(image_view);
        }
        self.device.destroy_swapchain(self.swapchain);
    }
}
