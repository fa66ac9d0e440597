//! Graphics pipeline for one shape signature
//!
//! A [`PipelineObject`] owns the pipeline, its pipeline layout and the
//! per-object descriptor set layout. It is immutable once built and does not
//! depend on the framebuffer extent.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{GpuDevice, GraphicsPipelineDesc};
use crate::render::object::ShapeSignature;
use crate::render::vulkan::{DescriptorSetLayout, DescriptorSetLayoutBuilder, ShaderProvider, VulkanError, VulkanResult};
use super::pipeline_config::PipelinePolicy;

/// Pipeline, pipeline layout and descriptor set layout for one signature
pub struct PipelineObject {
    device: Arc<dyn GpuDevice>,
    signature: ShapeSignature,
    policy: PipelinePolicy,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    set_layout: DescriptorSetLayout,
}

impl PipelineObject {
    /// Build the pipeline for `signature`
    ///
    /// Any failure is reported as [`VulkanError::PipelineBuild`] naming the
    /// signature.
    pub fn build(
        device: Arc<dyn GpuDevice>,
        shaders: &dyn ShaderProvider,
        render_pass: vk::RenderPass,
        samples: vk::SampleCountFlags,
        signature: ShapeSignature,
        policy: PipelinePolicy,
    ) -> VulkanResult<Self> {
        Self::try_build(device, shaders, render_pass, samples, signature, policy).map_err(|e| match e {
            VulkanError::PipelineBuild { .. } => e,
            other => VulkanError::PipelineBuild {
                signature: signature.to_string(),
                reason: other.to_string(),
            },
        })
    }

    fn try_build(
        device: Arc<dyn GpuDevice>,
        shaders: &dyn ShaderProvider,
        render_pass: vk::RenderPass,
        samples: vk::SampleCountFlags,
        signature: ShapeSignature,
        policy: PipelinePolicy,
    ) -> VulkanResult<Self> {
        let build_error = |reason: String| VulkanError::PipelineBuild {
            signature: signature.to_string(),
            reason,
        };

        let attribute_count = signature.vertex_layout.attribute_count();
        let limit = device.limits().max_vertex_input_attributes;
        if attribute_count > limit {
            return Err(build_error(format!(
                "{attribute_count} vertex attributes exceed the device limit of {limit}"
            )));
        }

        let shader_pair = signature
            .material
            .shaders()
            .ok_or_else(|| build_error("material has no shaders".to_string()))?;
        let vertex_shader = shaders.get(shader_pair.vertex)?;
        let fragment_shader = shaders.get(shader_pair.fragment)?;

        let set_layout = DescriptorSetLayoutBuilder::for_material(signature.material).build(device.clone())?;
        let layout = device.create_pipeline_layout(&[set_layout.handle()])?;

        let desc = GraphicsPipelineDesc {
            vertex_shader,
            fragment_shader,
            vertex_binding: signature.vertex_layout.binding_description(),
            vertex_attributes: signature.vertex_layout.attribute_descriptions(),
            topology: signature.topology.to_vk(),
            polygon_mode: policy.polygon_mode.to_vk(),
            cull_mode: policy.cull_mode.to_vk(),
            front_face: vk::FrontFace::CLOCKWISE,
            depth_test: policy.depth_test,
            depth_write: policy.depth_write,
            blend: policy.blend_mode.factors(),
            samples,
            layout,
            render_pass,
        };

        let pipeline = match device.create_graphics_pipeline(&desc) {
            Ok(pipeline) => pipeline,
            Err(e) => {
                device.destroy_pipeline_layout(layout);
                return Err(e);
            }
        };

        log::debug!("Built pipeline for {}", signature);
        Ok(Self {
            device,
            signature,
            policy,
            pipeline,
            layout,
            set_layout,
        })
    }

    /// Pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Pipeline layout handle
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Per-object descriptor set layout
    pub fn set_layout(&self) -> &DescriptorSetLayout {
        &self.set_layout
    }

    /// Signature this pipeline was built for
    pub fn signature(&self) -> ShapeSignature {
        self.signature
    }

    /// Fixed-function policy it was built with
    pub fn policy(&self) -> PipelinePolicy {
        self.policy
    }
}

impl Drop for PipelineObject {
    fn drop(&mut self) {
        self.device.destroy_pipeline(self.pipeline);
        self.device.destroy_pipeline_layout(self.layout);
    }
}
