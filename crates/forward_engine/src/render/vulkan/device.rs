//! ash-backed [`GpuDevice`]
//!
//! Owns the instance, surface and logical device for one window. Fields are
//! declared so that `Drop` tears down the logical device first and the
//! instance last.

use std::sync::Mutex;

use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::core::config::RendererConfig;
use crate::render::api::{
    AcquireOutcome, AllocatedBuffer, AllocatedImage, AttachmentImageDesc, DescriptorWrite,
    DeviceLimits, GpuDevice, GraphicsPipelineDesc, PresentOutcome, RenderPassLayout,
    Submission, SurfaceSupport, SwapchainDesc,
};
use super::context::{LogicalDevice, PhysicalDeviceInfo, PresentationSurface, VulkanInstance};
use super::render_pass::ForwardPassDescription;
use super::{VulkanError, VulkanResult};

/// Vulkan device for a single window surface
pub struct VulkanDevice {
    logical: LogicalDevice,
    surface: PresentationSurface,
    physical: PhysicalDeviceInfo,
    _instance: VulkanInstance,
    queue_lock: Mutex<()>,
}

impl VulkanDevice {
    /// Bring up Vulkan for the caller's window
    pub fn new(
        config: &RendererConfig,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> VulkanResult<Self> {
        let instance = VulkanInstance::new(&config.application_name, display_handle, config.validation_enabled())?;
        let surface = PresentationSurface::new(&instance, display_handle, window_handle)?;
        let physical = PhysicalDeviceInfo::select_suitable_device(&instance.instance, &surface)?;
        let logical = LogicalDevice::new(&instance.instance, &physical)?;

        Ok(Self {
            logical,
            surface,
            physical,
            _instance: instance,
            queue_lock: Mutex::new(()),
        })
    }

    fn device(&self) -> &ash::Device {
        &self.logical.device
    }

    fn allocate_memory(
        &self,
        requirements: vk::MemoryRequirements,
        properties: vk::MemoryPropertyFlags,
    ) -> VulkanResult<vk::DeviceMemory> {
        let memory_type_index = self.physical.find_memory_type(requirements.memory_type_bits, properties)?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        unsafe {
            self.device().allocate_memory(&alloc_info, None)
                .map_err(VulkanError::creating("device memory"))
        }
    }
}

impl GpuDevice for VulkanDevice {
    fn surface_support(&self) -> VulkanResult<SurfaceSupport> {
        let loader = &self.surface.loader;
        let (pd, surface) = (self.physical.device, self.surface.surface);
        unsafe {
            Ok(SurfaceSupport {
                capabilities: loader.get_physical_device_surface_capabilities(pd, surface)
                    .map_err(VulkanError::during("surface capability query"))?,
                formats: loader.get_physical_device_surface_formats(pd, surface)
                    .map_err(VulkanError::during("surface format query"))?,
                present_modes: loader.get_physical_device_surface_present_modes(pd, surface)
                    .map_err(VulkanError::during("present mode query"))?,
            })
        }
    }

    fn limits(&self) -> DeviceLimits {
        let limits = &self.physical.properties.limits;
        DeviceLimits {
            max_vertex_input_attributes: limits.max_vertex_input_attributes,
            framebuffer_sample_counts: limits.framebuffer_color_sample_counts
                & limits.framebuffer_depth_sample_counts,
        }
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device().device_wait_idle().map_err(VulkanError::during("device wait idle")) }
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VulkanResult<vk::SwapchainKHR> {
        let families = [self.physical.graphics_family, self.physical.present_family];
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.surface.surface)
            .min_image_count(desc.image_count)
            .image_format(desc.surface_format.format)
            .image_color_space(desc.surface_format.color_space)
            .image_extent(desc.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .pre_transform(desc.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(desc.present_mode)
            .clipped(true);
        create_info = if families[0] == families[1] {
            create_info.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
        } else {
            create_info
                .image_sharing_mode(vk::SharingMode::CONCURRENT)
                .queue_family_indices(&families)
        };

        unsafe {
            self.logical.swapchain_loader.create_swapchain(&create_info, None)
                .map_err(VulkanError::creating("swapchain"))
        }
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>> {
        unsafe {
            self.logical.swapchain_loader.get_swapchain_images(swapchain)
                .map_err(VulkanError::creating("swapchain images"))
        }
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        unsafe { self.logical.swapchain_loader.destroy_swapchain(swapchain, None) }
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VulkanResult<AcquireOutcome> {
        let result = unsafe {
            self.logical.swapchain_loader.acquire_next_image(swapchain, timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired { image_index, suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::OutOfDate),
            Err(e) => Err(VulkanError::during("acquire next image")(e)),
        }
    }

    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let wait_semaphores = [wait];
        let swapchains = [swapchain];
        let image_indices = [image_index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        let _guard = self.queue_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let result = unsafe {
            self.logical.swapchain_loader.queue_present(self.logical.present_queue, &present_info)
        };
        match result {
            Ok(false) => Ok(PresentOutcome::Presented),
            Ok(true) => Ok(PresentOutcome::Suboptimal),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::OutOfDate),
            Err(e) => Err(VulkanError::during("queue present")(e)),
        }
    }

    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<vk::ImageView> {
        let create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .components(vk::ComponentMapping {
                r: vk::ComponentSwizzle::IDENTITY,
                g: vk::ComponentSwizzle::IDENTITY,
                b: vk::ComponentSwizzle::IDENTITY,
                a: vk::ComponentSwizzle::IDENTITY,
            })
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });

        unsafe {
            self.device().create_image_view(&create_info, None)
                .map_err(VulkanError::creating("image view"))
        }
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        unsafe { self.device().destroy_image_view(view, None) }
    }

    fn create_attachment_image(&self, desc: &AttachmentImageDesc) -> VulkanResult<AllocatedImage> {
        let image_info = vk::ImageCreateInfo::builder()
            .image_type(vk::ImageType::TYPE_2D)
            .format(desc.format)
            .extent(vk::Extent3D { width: desc.extent.width, height: desc.extent.height, depth: 1 })
            .mip_levels(1)
            .array_layers(1)
            .samples(desc.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(desc.usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let image = unsafe {
            self.device().create_image(&image_info, None)
                .map_err(VulkanError::creating("attachment image"))?
        };

        let requirements = unsafe { self.device().get_image_memory_requirements(image) };
        let memory = match self.allocate_memory(requirements, vk::MemoryPropertyFlags::DEVICE_LOCAL) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device().destroy_image(image, None) };
                return Err(e);
            }
        };

        let view = unsafe { self.device().bind_image_memory(image, memory, 0) }
            .map_err(VulkanError::creating("attachment memory binding"))
            .and_then(|()| self.create_image_view(image, desc.format, desc.aspect));
        match view {
            Ok(view) => Ok(AllocatedImage { image, memory, view }),
            Err(e) => {
                unsafe {
                    self.device().destroy_image(image, None);
                    self.device().free_memory(memory, None);
                }
                Err(e)
            }
        }
    }

    fn destroy_attachment_image(&self, image: &AllocatedImage) {
        unsafe {
            self.device().destroy_image_view(image.view, None);
            self.device().destroy_image(image.image, None);
            self.device().free_memory(image.memory, None);
        }
    }

    fn create_render_pass(&self, layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass> {
        let description = ForwardPassDescription::new(layout);

        let color_refs = [description.color_reference()];
        let resolve_refs = description.resolve_reference().map(|r| [r]);
        let depth_ref = description.depth_reference();

        let mut subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .depth_stencil_attachment(&depth_ref);
        if let Some(resolve_refs) = resolve_refs.as_ref() {
            subpass = subpass.resolve_attachments(resolve_refs);
        }
        let subpasses = [subpass.build()];
        let dependencies = [description.dependency()];

        let create_info = vk::RenderPassCreateInfo::builder()
            .attachments(&description.attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);

        unsafe {
            self.device().create_render_pass(&create_info, None)
                .map_err(VulkanError::creating("render pass"))
        }
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        unsafe { self.device().destroy_render_pass(render_pass, None) }
    }

    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        let create_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(attachments)
            .width(extent.width)
            .height(extent.height)
            .layers(1);

        unsafe {
            self.device().create_framebuffer(&create_info, None)
                .map_err(VulkanError::creating("framebuffer"))
        }
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        unsafe { self.device().destroy_framebuffer(framebuffer, None) }
    }

    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        let create_info = vk::ShaderModuleCreateInfo::builder().code(code);
        unsafe {
            self.device().create_shader_module(&create_info, None)
                .map_err(VulkanError::creating("shader module"))
        }
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        unsafe { self.device().destroy_shader_module(module, None) }
    }

    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(bindings);
        unsafe {
            self.device().create_descriptor_set_layout(&create_info, None)
                .map_err(VulkanError::creating("descriptor set layout"))
        }
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        unsafe { self.device().destroy_descriptor_set_layout(layout, None) }
    }

    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout> {
        let create_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
        unsafe {
            self.device().create_pipeline_layout(&create_info, None)
                .map_err(VulkanError::creating("pipeline layout"))
        }
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe { self.device().destroy_pipeline_layout(layout, None) }
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VulkanResult<vk::Pipeline> {
        let entry_point = c"main";
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(desc.vertex_shader)
                .name(entry_point)
                .build(),
            vk::PipelineShaderStageCreateInfo::builder()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(desc.fragment_shader)
                .name(entry_point)
                .build(),
        ];

        let bindings = [desc.vertex_binding];
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
            .vertex_binding_descriptions(&bindings)
            .vertex_attribute_descriptions(&desc.vertex_attributes);

        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(desc.topology)
            .primitive_restart_enable(false);

        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewport_count(1)
            .scissor_count(1);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(desc.polygon_mode)
            .line_width(1.0)
            .cull_mode(desc.cull_mode)
            .front_face(desc.front_face)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(desc.samples);

        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
            .depth_test_enable(desc.depth_test)
            .depth_write_enable(desc.depth_write)
            .depth_compare_op(vk::CompareOp::LESS)
            .depth_bounds_test_enable(false)
            .stencil_test_enable(false);

        let color_blend_attachment = match desc.blend {
            Some((src, dst)) => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(true)
                .src_color_blend_factor(src)
                .dst_color_blend_factor(dst)
                .color_blend_op(vk::BlendOp::ADD)
                .src_alpha_blend_factor(src)
                .dst_alpha_blend_factor(dst)
                .alpha_blend_op(vk::BlendOp::ADD)
                .build(),
            None => vk::PipelineColorBlendAttachmentState::builder()
                .color_write_mask(vk::ColorComponentFlags::RGBA)
                .blend_enable(false)
                .build(),
        };
        let color_blend_attachments = [color_blend_attachment];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&color_blend_attachments);

        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&shader_stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .depth_stencil_state(&depth_stencil)
            .color_blend_state(&color_blending)
            .dynamic_state(&dynamic_state)
            .layout(desc.layout)
            .render_pass(desc.render_pass)
            .subpass(0);

        let pipelines = unsafe {
            self.device().create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info.build()], None)
                .map_err(|(_, err)| VulkanError::creating("graphics pipeline")(err))?
        };

        pipelines.into_iter().next().ok_or(VulkanError::ResourceCreation {
            resource: "graphics pipeline",
            source: vk::Result::ERROR_UNKNOWN,
        })
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe { self.device().destroy_pipeline(pipeline, None) }
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<AllocatedBuffer> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe {
            self.device().create_buffer(&buffer_info, None)
                .map_err(VulkanError::creating("buffer"))?
        };

        let requirements = unsafe { self.device().get_buffer_memory_requirements(buffer) };
        let memory = match self.allocate_memory(
            requirements,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ) {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device().destroy_buffer(buffer, None) };
                return Err(e);
            }
        };

        if let Err(e) = unsafe { self.device().bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device().destroy_buffer(buffer, None);
                self.device().free_memory(memory, None);
            }
            return Err(VulkanError::creating("buffer memory binding")(e));
        }

        Ok(AllocatedBuffer { buffer, memory, size })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        let len = data.len() as vk::DeviceSize;
        if offset + len > buffer.size {
            return Err(VulkanError::InvalidOperation {
                reason: format!("Write of {len} bytes at {offset} overruns buffer of {} bytes", buffer.size),
            });
        }

        unsafe {
            let ptr = self.device()
                .map_memory(buffer.memory, offset, len, vk::MemoryMapFlags::empty())
                .map_err(VulkanError::during("map uniform memory"))?;
            std::ptr::copy_nonoverlapping(data.as_ptr(), ptr.cast::<u8>(), data.len());
            self.device().unmap_memory(buffer.memory);
        }
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer) {
        unsafe {
            self.device().destroy_buffer(buffer.buffer, None);
            self.device().free_memory(buffer.memory, None);
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(pool_sizes);

        unsafe {
            self.device().create_descriptor_pool(&create_info, None)
                .map_err(VulkanError::creating("descriptor pool"))
        }
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe { self.device().destroy_descriptor_pool(pool, None) }
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(layouts);

        unsafe {
            self.device().allocate_descriptor_sets(&alloc_info)
                .map_err(VulkanError::creating("descriptor sets"))
        }
    }

    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        unsafe {
            self.device().free_descriptor_sets(pool, sets)
                .map_err(VulkanError::during("free descriptor sets"))
        }
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::UniformBuffer { buffer, range, .. } => [vk::DescriptorBufferInfo {
                    buffer,
                    offset: 0,
                    range,
                }],
                DescriptorWrite::CombinedImageSampler { .. } => [vk::DescriptorBufferInfo::default()],
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = writes
            .iter()
            .map(|write| match *write {
                DescriptorWrite::CombinedImageSampler { image_view, sampler, .. } => [vk::DescriptorImageInfo {
                    sampler,
                    image_view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }],
                DescriptorWrite::UniformBuffer { .. } => [vk::DescriptorImageInfo::default()],
            })
            .collect();

        let vk_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .enumerate()
            .map(|(i, write)| match *write {
                DescriptorWrite::UniformBuffer { binding, .. } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(&buffer_infos[i])
                    .build(),
                DescriptorWrite::CombinedImageSampler { binding, .. } => vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos[i])
                    .build(),
            })
            .collect();

        unsafe { self.device().update_descriptor_sets(&vk_writes, &[]) }
    }

    fn create_command_pool(&self) -> VulkanResult<vk::CommandPool> {
        let create_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(self.physical.graphics_family);

        unsafe {
            self.device().create_command_pool(&create_info, None)
                .map_err(VulkanError::creating("command pool"))
        }
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        unsafe { self.device().destroy_command_pool(pool, None) }
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VulkanResult<()> {
        unsafe {
            self.device().reset_command_pool(pool, vk::CommandPoolResetFlags::empty())
                .map_err(VulkanError::during("reset command pool"))
        }
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count);

        unsafe {
            self.device().allocate_command_buffers(&alloc_info)
                .map_err(VulkanError::creating("command buffers"))
        }
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let begin_info = vk::CommandBufferBeginInfo::builder();
        unsafe {
            self.device().begin_command_buffer(command_buffer, &begin_info)
                .map_err(VulkanError::during("begin command buffer"))
        }
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        unsafe {
            self.device().end_command_buffer(command_buffer)
                .map_err(VulkanError::during("end command buffer"))
        }
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(render_area)
            .clear_values(clear_values);

        unsafe {
            self.device().cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
        }
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        unsafe { self.device().cmd_end_render_pass(command_buffer) }
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        unsafe { self.device().cmd_set_viewport(command_buffer, 0, &[viewport]) }
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        unsafe { self.device().cmd_set_scissor(command_buffer, 0, &[scissor]) }
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe {
            self.device().cmd_bind_pipeline(command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        unsafe { self.device().cmd_bind_vertex_buffers(command_buffer, 0, &[buffer], &[0]) }
    }

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        index_type: vk::IndexType,
    ) {
        unsafe { self.device().cmd_bind_index_buffer(command_buffer, buffer, 0, index_type) }
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        unsafe {
            self.device().cmd_bind_descriptor_sets(
                command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                &[set],
                &[],
            );
        }
    }

    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32) {
        unsafe { self.device().cmd_draw_indexed(command_buffer, index_count, 1, 0, 0, 0) }
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        let create_info = vk::SemaphoreCreateInfo::builder();
        unsafe {
            self.device().create_semaphore(&create_info, None)
                .map_err(VulkanError::creating("semaphore"))
        }
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        unsafe { self.device().destroy_semaphore(semaphore, None) }
    }

    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };
        let create_info = vk::FenceCreateInfo::builder().flags(flags);
        unsafe {
            self.device().create_fence(&create_info, None)
                .map_err(VulkanError::creating("fence"))
        }
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        unsafe { self.device().destroy_fence(fence, None) }
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VulkanResult<()> {
        if fences.is_empty() {
            return Ok(());
        }
        unsafe {
            self.device().wait_for_fences(fences, true, timeout)
                .map_err(VulkanError::during("wait for fences"))
        }
    }

    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()> {
        unsafe {
            self.device().reset_fences(&[fence])
                .map_err(VulkanError::during("reset fence"))
        }
    }

    fn queue_submit(&self, submission: &Submission) -> VulkanResult<()> {
        let wait_semaphores = [submission.wait_semaphore];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [submission.command_buffer];
        let signal_semaphores = [submission.signal_semaphore];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        let _guard = self.queue_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        unsafe {
            self.device().queue_submit(self.logical.graphics_queue, &[submit_info.build()], submission.fence)
                .map_err(VulkanError::during("queue submit"))
        }
    }
}

impl Drop for VulkanDevice {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            log::warn!("Device wait idle failed during shutdown: {e}");
        }
        log::debug!("Destroying Vulkan device");
    }
}
