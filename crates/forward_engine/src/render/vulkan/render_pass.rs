//! Render pass management
//!
//! The renderer uses a single forward pass with one subpass. With MSAA it has
//! three attachments (multisampled color, multisampled depth, single-sample
//! resolve into the swapchain image); without MSAA the color attachment is the
//! swapchain image itself and there is no resolve.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{GpuDevice, RenderPassLayout};
use super::VulkanResult;

/// Attachment index of the (possibly multisampled) color target
pub const COLOR_ATTACHMENT: u32 = 0;
/// Attachment index of the depth target
pub const DEPTH_ATTACHMENT: u32 = 1;
/// Attachment index of the resolve target when multisampled
pub const RESOLVE_ATTACHMENT: u32 = 2;

/// Pick the highest supported sample count not above `requested`
pub fn choose_sample_count(requested: u32, supported: vk::SampleCountFlags) -> vk::SampleCountFlags {
    [
        vk::SampleCountFlags::TYPE_64,
        vk::SampleCountFlags::TYPE_32,
        vk::SampleCountFlags::TYPE_16,
        vk::SampleCountFlags::TYPE_8,
        vk::SampleCountFlags::TYPE_4,
        vk::SampleCountFlags::TYPE_2,
    ]
    .into_iter()
    .find(|&count| count.as_raw() <= requested && supported.contains(count))
    .unwrap_or(vk::SampleCountFlags::TYPE_1)
}

/// Attachment descriptions and references for the forward pass
#[derive(Debug, Clone)]
pub struct ForwardPassDescription {
    /// Attachments in index order
    pub attachments: Vec<vk::AttachmentDescription>,
    multisampled: bool,
}

impl ForwardPassDescription {
    /// Describe the attachments for a layout
    pub fn new(layout: &RenderPassLayout) -> Self {
        let multisampled = layout.is_multisampled();

        let color = vk::AttachmentDescription::builder()
            .format(layout.color_format)
            .samples(layout.samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(if multisampled { vk::AttachmentStoreOp::DONT_CARE } else { vk::AttachmentStoreOp::STORE })
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(if multisampled {
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL
            } else {
                vk::ImageLayout::PRESENT_SRC_KHR
            })
            .build();

        let depth = vk::AttachmentDescription::builder()
            .format(layout.depth_format)
            .samples(layout.samples)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::CLEAR)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL)
            .build();

        let mut attachments = vec![color, depth];

        if multisampled {
            attachments.push(
                vk::AttachmentDescription::builder()
                    .format(layout.color_format)
                    .samples(vk::SampleCountFlags::TYPE_1)
                    .load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .store_op(vk::AttachmentStoreOp::STORE)
                    .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
                    .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
                    .initial_layout(vk::ImageLayout::UNDEFINED)
                    .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
                    .build(),
            );
        }

        Self { attachments, multisampled }
    }

    /// Subpass color reference
    pub fn color_reference(&self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: COLOR_ATTACHMENT,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }
    }

    /// Subpass depth reference
    pub fn depth_reference(&self) -> vk::AttachmentReference {
        vk::AttachmentReference {
            attachment: DEPTH_ATTACHMENT,
            layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
        }
    }

    /// Subpass resolve reference when multisampled
    pub fn resolve_reference(&self) -> Option<vk::AttachmentReference> {
        self.multisampled.then_some(vk::AttachmentReference {
            attachment: RESOLVE_ATTACHMENT,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        })
    }

    /// External-to-subpass dependency covering color output and depth tests
    pub fn dependency(&self) -> vk::SubpassDependency {
        vk::SubpassDependency::builder()
            .src_subpass(vk::SUBPASS_EXTERNAL)
            .dst_subpass(0)
            .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .src_access_mask(vk::AccessFlags::empty())
            .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS)
            .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE)
            .build()
    }
}

/// Render pass wrapper with RAII cleanup
pub struct RenderPass {
    device: Arc<dyn GpuDevice>,
    render_pass: vk::RenderPass,
    layout: RenderPassLayout,
}

impl RenderPass {
    /// Create the forward render pass
    pub fn new(device: Arc<dyn GpuDevice>, layout: RenderPassLayout) -> VulkanResult<Self> {
        let render_pass = device.create_render_pass(&layout)?;
        log::debug!(
            "Created render pass ({:?}, {:?} samples, resolve: {})",
            layout.color_format,
            layout.samples,
            layout.is_multisampled()
        );
        Ok(Self { device, render_pass, layout })
    }

    /// Get the render pass handle
    pub fn handle(&self) -> vk::RenderPass {
        self.render_pass
    }

    /// Attachment formats and sample count
    pub fn layout(&self) -> RenderPassLayout {
        self.layout
    }
}

impl Drop for RenderPass {
    fn drop(&mut self) {
        self.device.destroy_render_pass(self.render_pass);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(samples: vk::SampleCountFlags) -> RenderPassLayout {
        RenderPassLayout {
            color_format: vk::Format::B8G8R8A8_SRGB,
            depth_format: vk::Format::D32_SFLOAT,
            samples,
        }
    }

    #[test]
    fn test_multisampled_pass_resolves_into_presentable_image() {
        let description = ForwardPassDescription::new(&layout(vk::SampleCountFlags::TYPE_4));
        assert_eq!(description.attachments.len(), 3);

        let color = description.attachments[COLOR_ATTACHMENT as usize];
        assert_eq!(color.samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(color.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(color.store_op, vk::AttachmentStoreOp::DONT_CARE);

        let depth = description.attachments[DEPTH_ATTACHMENT as usize];
        assert_eq!(depth.samples, vk::SampleCountFlags::TYPE_4);
        assert_eq!(depth.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(depth.store_op, vk::AttachmentStoreOp::DONT_CARE);

        let resolve = description.attachments[RESOLVE_ATTACHMENT as usize];
        assert_eq!(resolve.samples, vk::SampleCountFlags::TYPE_1);
        assert_eq!(resolve.load_op, vk::AttachmentLoadOp::DONT_CARE);
        assert_eq!(resolve.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(resolve.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(description.resolve_reference().is_some());
    }

    #[test]
    fn test_single_sample_pass_presents_color_directly() {
        let description = ForwardPassDescription::new(&layout(vk::SampleCountFlags::TYPE_1));
        assert_eq!(description.attachments.len(), 2);

        let color = description.attachments[COLOR_ATTACHMENT as usize];
        assert_eq!(color.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(color.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(description.resolve_reference().is_none());
    }

    #[test]
    fn test_sample_count_is_clamped_to_support() {
        let supported = vk::SampleCountFlags::TYPE_1 | vk::SampleCountFlags::TYPE_2 | vk::SampleCountFlags::TYPE_4;
        assert_eq!(choose_sample_count(8, supported), vk::SampleCountFlags::TYPE_4);
        assert_eq!(choose_sample_count(2, supported), vk::SampleCountFlags::TYPE_2);
        assert_eq!(choose_sample_count(1, supported), vk::SampleCountFlags::TYPE_1);
        assert_eq!(choose_sample_count(4, vk::SampleCountFlags::TYPE_1), vk::SampleCountFlags::TYPE_1);
    }
}
