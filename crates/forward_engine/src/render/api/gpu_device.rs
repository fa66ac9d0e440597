//! Device abstraction used by the renderer
//!
//! Every GPU call the renderer makes goes through [`GpuDevice`]. The ash
//! backend ([`crate::render::vulkan::VulkanDevice`]) is the production
//! implementation; tests drive the same code with a recording mock.
//!
//! Methods take and return raw Vulkan handles. Ownership lives in the RAII
//! wrappers built on top of this trait, which hold an `Arc<dyn GpuDevice>` and
//! call the matching `destroy_*` method in `Drop`.
//!
//! Implementations must be `Send + Sync`: command buffers from distinct pools
//! are recorded on worker threads through a shared `&dyn GpuDevice`.

use ash::vk;

use crate::render::vulkan::VulkanResult;

/// What the surface can do, queried fresh before every swapchain build
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format / color space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported present modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Device limits the renderer checks against
#[derive(Debug, Clone, Copy)]
pub struct DeviceLimits {
    /// Maximum vertex input attributes per pipeline
    pub max_vertex_input_attributes: u32,
    /// Sample counts usable for both color and depth framebuffer attachments
    pub framebuffer_sample_counts: vk::SampleCountFlags,
}

/// Parameters for swapchain creation
#[derive(Debug, Clone, Copy)]
pub struct SwapchainDesc {
    /// Chosen format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Chosen present mode
    pub present_mode: vk::PresentModeKHR,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Minimum image count to request
    pub image_count: u32,
    /// Surface transform
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

/// Result of acquiring a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// An image is ready for rendering
    Acquired {
        /// Index into the swapchain images
        image_index: u32,
        /// The swapchain still works but no longer matches the surface
        suboptimal: bool,
    },
    /// The swapchain must be rebuilt before rendering
    OutOfDate,
}

/// Result of presenting a swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentOutcome {
    /// Presented normally
    Presented,
    /// Presented, but the swapchain should be rebuilt
    Suboptimal,
    /// Not presented; the swapchain must be rebuilt
    OutOfDate,
}

/// Parameters for a swapchain-sized attachment image
#[derive(Debug, Clone, Copy)]
pub struct AttachmentImageDesc {
    /// Pixel format
    pub format: vk::Format,
    /// Image extent
    pub extent: vk::Extent2D,
    /// Sample count
    pub samples: vk::SampleCountFlags,
    /// Usage flags
    pub usage: vk::ImageUsageFlags,
    /// Aspect of the view created alongside the image
    pub aspect: vk::ImageAspectFlags,
}

/// Device-local image with its memory and a 2D view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedImage {
    /// Image handle
    pub image: vk::Image,
    /// Backing memory
    pub memory: vk::DeviceMemory,
    /// View over the whole image
    pub view: vk::ImageView,
}

/// Host-visible buffer with its memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocatedBuffer {
    /// Buffer handle
    pub buffer: vk::Buffer,
    /// Backing memory (host visible and coherent)
    pub memory: vk::DeviceMemory,
    /// Size in bytes
    pub size: vk::DeviceSize,
}

/// Attachment formats and sample count of the forward render pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderPassLayout {
    /// Presentable color format
    pub color_format: vk::Format,
    /// Depth attachment format
    pub depth_format: vk::Format,
    /// Sample count of the color and depth attachments
    pub samples: vk::SampleCountFlags,
}

impl RenderPassLayout {
    /// Whether a separate resolve attachment is needed
    pub fn is_multisampled(&self) -> bool {
        self.samples != vk::SampleCountFlags::TYPE_1
    }
}

/// Everything needed to build one graphics pipeline
///
/// Viewport and scissor are always dynamic.
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDesc {
    /// Vertex stage module
    pub vertex_shader: vk::ShaderModule,
    /// Fragment stage module
    pub fragment_shader: vk::ShaderModule,
    /// Vertex binding
    pub vertex_binding: vk::VertexInputBindingDescription,
    /// Vertex attributes
    pub vertex_attributes: Vec<vk::VertexInputAttributeDescription>,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Fill or line rasterization
    pub polygon_mode: vk::PolygonMode,
    /// Face culling
    pub cull_mode: vk::CullModeFlags,
    /// Winding of front faces
    pub front_face: vk::FrontFace,
    /// Depth testing
    pub depth_test: bool,
    /// Depth writes
    pub depth_write: bool,
    /// Blend factors `(src, dst)` for color and alpha; `None` disables blending
    pub blend: Option<(vk::BlendFactor, vk::BlendFactor)>,
    /// Rasterization sample count
    pub samples: vk::SampleCountFlags,
    /// Pipeline layout
    pub layout: vk::PipelineLayout,
    /// Render pass the pipeline is used with (subpass 0)
    pub render_pass: vk::RenderPass,
}

/// One binding update in a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorWrite {
    /// Whole-buffer uniform binding
    UniformBuffer {
        /// Binding number
        binding: u32,
        /// Buffer to bind
        buffer: vk::Buffer,
        /// Bytes visible to the shader
        range: vk::DeviceSize,
    },
    /// Combined image sampler binding
    CombinedImageSampler {
        /// Binding number
        binding: u32,
        /// Shader-readable view
        image_view: vk::ImageView,
        /// Sampler
        sampler: vk::Sampler,
    },
}

/// A single-command-buffer graphics queue submission
#[derive(Debug, Clone, Copy)]
pub struct Submission {
    /// Command buffer to execute
    pub command_buffer: vk::CommandBuffer,
    /// Semaphore waited on at color attachment output
    pub wait_semaphore: vk::Semaphore,
    /// Semaphore signaled on completion
    pub signal_semaphore: vk::Semaphore,
    /// Fence signaled on completion
    pub fence: vk::Fence,
}

/// Explicit GPU device as seen by the renderer
pub trait GpuDevice: Send + Sync {
    // === Queries ===

    /// Current surface capabilities, formats and present modes
    fn surface_support(&self) -> VulkanResult<SurfaceSupport>;

    /// Device limits
    fn limits(&self) -> DeviceLimits;

    /// Block until the device is idle
    fn wait_idle(&self) -> VulkanResult<()>;

    // === Presentation ===

    /// Create a swapchain for the device surface, retiring none
    fn create_swapchain(&self, desc: &SwapchainDesc) -> VulkanResult<vk::SwapchainKHR>;

    /// Images owned by a swapchain
    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>>;

    /// Destroy a swapchain
    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR);

    /// Acquire the next presentable image
    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        timeout: u64,
        signal: vk::Semaphore,
    ) -> VulkanResult<AcquireOutcome>;

    /// Present an image once `wait` is signaled
    fn queue_present(
        &self,
        swapchain: vk::SwapchainKHR,
        image_index: u32,
        wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome>;

    // === Images and render targets ===

    /// 2D single-mip view over an existing image
    fn create_image_view(
        &self,
        image: vk::Image,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<vk::ImageView>;

    /// Destroy an image view
    fn destroy_image_view(&self, view: vk::ImageView);

    /// Create a device-local attachment image with memory and view
    fn create_attachment_image(&self, desc: &AttachmentImageDesc) -> VulkanResult<AllocatedImage>;

    /// Destroy an attachment image, its view and memory
    fn destroy_attachment_image(&self, image: &AllocatedImage);

    /// Create the forward render pass for a layout
    fn create_render_pass(&self, layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass>;

    /// Destroy a render pass
    fn destroy_render_pass(&self, render_pass: vk::RenderPass);

    /// Create a framebuffer
    fn create_framebuffer(
        &self,
        render_pass: vk::RenderPass,
        attachments: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer>;

    /// Destroy a framebuffer
    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer);

    // === Pipelines ===

    /// Create a shader module from SPIR-V words
    fn create_shader_module(&self, code: &[u32]) -> VulkanResult<vk::ShaderModule>;

    /// Destroy a shader module
    fn destroy_shader_module(&self, module: vk::ShaderModule);

    /// Create a descriptor set layout
    fn create_descriptor_set_layout(
        &self,
        bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout>;

    /// Destroy a descriptor set layout
    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout);

    /// Create a pipeline layout over the given set layouts
    fn create_pipeline_layout(
        &self,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Create a graphics pipeline
    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VulkanResult<vk::Pipeline>;

    /// Destroy a pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    // === Buffers and descriptors ===

    /// Create a host-visible, host-coherent buffer
    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
    ) -> VulkanResult<AllocatedBuffer>;

    /// Copy bytes into a host-visible buffer at `offset`
    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()>;

    /// Destroy a buffer and free its memory
    fn destroy_buffer(&self, buffer: &AllocatedBuffer);

    /// Create a descriptor pool whose sets can be freed individually
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool>;

    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Allocate one set per layout
    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>>;

    /// Return sets to their pool
    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()>;

    /// Apply writes to a descriptor set
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]);

    // === Command recording ===

    /// Create a command pool on the graphics queue family
    fn create_command_pool(&self) -> VulkanResult<vk::CommandPool>;

    /// Destroy a command pool and its buffers
    fn destroy_command_pool(&self, pool: vk::CommandPool);

    /// Reset every buffer allocated from a pool
    fn reset_command_pool(&self, pool: vk::CommandPool) -> VulkanResult<()>;

    /// Allocate primary command buffers
    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VulkanResult<Vec<vk::CommandBuffer>>;

    /// Begin recording
    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;

    /// Finish recording
    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()>;

    /// Begin a render pass with inline contents
    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    );

    /// End the current render pass
    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer);

    /// Set viewport 0
    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport);

    /// Set scissor 0
    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D);

    /// Bind a graphics pipeline
    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline);

    /// Bind a vertex buffer at binding 0, offset 0
    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer);

    /// Bind an index buffer at offset 0
    fn cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        index_type: vk::IndexType,
    );

    /// Bind a descriptor set at set 0
    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    );

    /// Single-instance indexed draw
    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32);

    // === Synchronization ===

    /// Create a binary semaphore
    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore>;

    /// Destroy a semaphore
    fn destroy_semaphore(&self, semaphore: vk::Semaphore);

    /// Create a fence
    fn create_fence(&self, signaled: bool) -> VulkanResult<vk::Fence>;

    /// Destroy a fence
    fn destroy_fence(&self, fence: vk::Fence);

    /// Wait until every fence is signaled
    fn wait_for_fences(&self, fences: &[vk::Fence], timeout: u64) -> VulkanResult<()>;

    /// Reset a fence to unsignaled
    fn reset_fence(&self, fence: vk::Fence) -> VulkanResult<()>;

    /// Submit one command buffer to the graphics queue
    fn queue_submit(&self, submission: &Submission) -> VulkanResult<()>;
}
