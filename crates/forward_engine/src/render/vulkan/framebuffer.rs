//! Framebuffer management
//!
//! Swapchain-sized attachment images and one framebuffer per swapchain image.
//! Rebuilt together with the swapchain and render pass.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{AllocatedImage, AttachmentImageDesc, GpuDevice};
use super::render_pass::RenderPass;
use super::swapchain::Swapchain;
use super::VulkanResult;

/// Framebuffer wrapper with RAII cleanup
pub struct Framebuffer {
    device: Arc<dyn GpuDevice>,
    framebuffer: vk::Framebuffer,
}

impl Framebuffer {
    /// Create a new framebuffer
    pub fn new(
        device: Arc<dyn GpuDevice>,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let framebuffer = device.create_framebuffer(render_pass, attachments, extent)?;
        Ok(Self { device, framebuffer })
    }

    /// Get the framebuffer handle
    pub fn handle(&self) -> vk::Framebuffer {
        self.framebuffer
    }
}

impl Drop for Framebuffer {
    fn drop(&mut self) {
        self.device.destroy_framebuffer(self.framebuffer);
    }
}

/// Attachment image wrapper with RAII cleanup
pub struct AttachmentImage {
    device: Arc<dyn GpuDevice>,
    image: AllocatedImage,
}

impl AttachmentImage {
    /// Create a device-local attachment image
    pub fn new(device: Arc<dyn GpuDevice>, desc: &AttachmentImageDesc) -> VulkanResult<Self> {
        let image = device.create_attachment_image(desc)?;
        Ok(Self { device, image })
    }

    /// View over the image
    pub fn view(&self) -> vk::ImageView {
        self.image.view
    }
}

impl Drop for AttachmentImage {
    fn drop(&mut self) {
        self.device.destroy_attachment_image(&self.image);
    }
}

/// Everything the forward pass renders into, for every swapchain image
pub struct RenderTargets {
    framebuffers: Vec<Framebuffer>,
    depth: AttachmentImage,
    msaa_color: Option<AttachmentImage>,
    extent: vk::Extent2D,
}

impl RenderTargets {
    /// Create the attachments and framebuffers for a swapchain
    pub fn new(
        device: Arc<dyn GpuDevice>,
        render_pass: &RenderPass,
        swapchain: &Swapchain,
    ) -> VulkanResult<Self> {
        let layout = render_pass.layout();
        let extent = swapchain.extent();

        let msaa_color = if layout.is_multisampled() {
            Some(AttachmentImage::new(device.clone(), &AttachmentImageDesc {
                format: layout.color_format,
                extent,
                samples: layout.samples,
                usage: vk::ImageUsageFlags::TRANSIENT_ATTACHMENT | vk::ImageUsageFlags::COLOR_ATTACHMENT,
                aspect: vk::ImageAspectFlags::COLOR,
            })?)
        } else {
            None
        };

        let depth = AttachmentImage::new(device.clone(), &AttachmentImageDesc {
            format: layout.depth_format,
            extent,
            samples: layout.samples,
            usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            aspect: vk::ImageAspectFlags::DEPTH,
        })?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&swapchain_view| {
                let attachments = match &msaa_color {
                    Some(color) => vec![color.view(), depth.view(), swapchain_view],
                    None => vec![swapchain_view, depth.view()],
                };
                Framebuffer::new(device.clone(), render_pass.handle(), &attachments, extent)
            })
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("Created {} framebuffers at {}x{}", framebuffers.len(), extent.width, extent.height);
        Ok(Self { framebuffers, depth, msaa_color, extent })
    }

    /// Framebuffer for a swapchain image
    pub fn framebuffer(&self, image_index: usize) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index).map(Framebuffer::handle)
    }

    /// Number of framebuffers
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    /// Whether there are no framebuffers
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    /// Render area extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Depth attachment view
    pub fn depth_view(&self) -> vk::ImageView {
        self.depth.view()
    }

    /// Multisampled color attachment view, if multisampling
    pub fn msaa_color_view(&self) -> Option<vk::ImageView> {
        self.msaa_color.as_ref().map(AttachmentImage::view)
    }
}
