//! Recording GPU device for tests
//!
//! [`MockDevice`] fabricates handles, counts live resources per kind, keeps
//! the command stream of every command buffer and tracks which buffers are
//! still executing, so tests can check what the renderer did without a GPU.
//!
//! A submitted command buffer is "in flight" until its fence is waited on or
//! the device is waited idle. Beginning or resetting an in-flight buffer
//! counts as a recording violation.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::vk::{self, Handle};

use crate::render::api::{
    AcquireOutcome, AllocatedBuffer, AllocatedImage, AttachmentImageDesc, DescriptorWrite, DeviceLimits,
    GpuDevice, GraphicsPipelineDesc, PresentOutcome, RenderPassLayout, Submission, SurfaceSupport, SwapchainDesc,
};
use crate::render::vulkan::{ShaderProvider, VulkanError, VulkanResult};

/// One recorded command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `begin_command_buffer`
    Begin,
    /// `end_command_buffer`
    End,
    /// `cmd_begin_render_pass`
    BeginRenderPass {
        /// Render pass
        render_pass: vk::RenderPass,
        /// Framebuffer
        framebuffer: vk::Framebuffer,
        /// Render area extent
        extent: vk::Extent2D,
        /// Number of clear values
        clear_count: usize,
    },
    /// `cmd_end_render_pass`
    EndRenderPass,
    /// `cmd_set_viewport`, as the viewport size
    SetViewport(vk::Extent2D),
    /// `cmd_set_scissor`, as the scissor extent
    SetScissor(vk::Extent2D),
    /// `cmd_bind_pipeline`
    BindPipeline(vk::Pipeline),
    /// `cmd_bind_vertex_buffer`
    BindVertexBuffer(vk::Buffer),
    /// `cmd_bind_index_buffer`
    BindIndexBuffer(vk::Buffer),
    /// `cmd_bind_descriptor_set`
    BindDescriptorSet(vk::DescriptorSet),
    /// `cmd_draw_indexed`
    DrawIndexed(u32),
}

#[derive(Default)]
struct MockState {
    created: HashMap<&'static str, usize>,
    live: HashMap<&'static str, HashSet<u64>>,
    fail_next: HashSet<&'static str>,
    limits: Option<DeviceLimits>,
    surface: Option<SurfaceSupport>,
    swapchain_image_count: HashMap<u64, u32>,
    pool_capacity: HashMap<u64, u32>,
    pool_used: HashMap<u64, u32>,
    pool_of_buffer: HashMap<u64, u64>,
    commands: HashMap<u64, Vec<Command>>,
    in_flight: HashMap<u64, Vec<u64>>,
    submissions: Vec<Submission>,
    violations: usize,
    signaled_semaphores: HashSet<u64>,
    semaphore_violations: usize,
    pipelines: HashMap<u64, GraphicsPipelineDesc>,
    buffers: HashMap<u64, Vec<u8>>,
    descriptor_writes: HashMap<u64, Vec<DescriptorWrite>>,
    acquire_script: Vec<AcquireOutcome>,
    present_script: Vec<PresentOutcome>,
    next_image: u32,
    wait_idle_count: usize,
}

/// `GpuDevice` that records instead of rendering
pub struct MockDevice {
    next_handle: AtomicU64,
    state: Mutex<MockState>,
}

impl MockDevice {
    /// Create a device with a 4x MSAA capable, triple-buffered surface
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_handle: AtomicU64::new(0x1000),
            state: Mutex::new(MockState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    fn create(&self, kind: &'static str) -> VulkanResult<u64> {
        let mut state = self.state();
        if state.fail_next.remove(kind) {
            return Err(VulkanError::ResourceCreation {
                resource: kind,
                source: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            });
        }
        let raw = self.handle();
        *state.created.entry(kind).or_default() += 1;
        state.live.entry(kind).or_default().insert(raw);
        Ok(raw)
    }

    fn destroy(&self, kind: &'static str, raw: u64) {
        if raw == 0 {
            return;
        }
        let mut state = self.state();
        let removed = state.live.entry(kind).or_default().remove(&raw);
        assert!(removed, "{kind} {raw:#x} destroyed twice or never created");
    }

    fn record(&self, command_buffer: vk::CommandBuffer, command: Command) {
        self.state().commands.entry(command_buffer.as_raw()).or_default().push(command);
    }

    /// Number of `kind` resources ever created
    pub fn created(&self, kind: &str) -> usize {
        self.state().created.get(kind).copied().unwrap_or(0)
    }

    /// Number of `kind` resources currently alive
    pub fn live(&self, kind: &str) -> usize {
        self.state().live.get(kind).map_or(0, HashSet::len)
    }

    /// Whether a specific handle of `kind` is alive
    pub fn is_live(&self, kind: &str, raw: u64) -> bool {
        self.state().live.get(kind).is_some_and(|handles| handles.contains(&raw))
    }

    /// Make the next creation of `kind` fail
    pub fn fail_next(&self, kind: &'static str) {
        self.state().fail_next.insert(kind);
    }

    /// Override the device limits
    pub fn set_limits(&self, limits: DeviceLimits) {
        self.state().limits = Some(limits);
    }

    /// Override the surface support
    pub fn set_surface_support(&self, support: SurfaceSupport) {
        self.state().surface = Some(support);
    }

    /// Commands recorded into `command_buffer` since its last begin
    pub fn commands(&self, command_buffer: vk::CommandBuffer) -> Vec<Command> {
        self.state().commands.get(&command_buffer.as_raw()).cloned().unwrap_or_default()
    }

    /// Pipelines bound in `command_buffer`, in order
    pub fn bound_pipelines(&self, command_buffer: vk::CommandBuffer) -> Vec<vk::Pipeline> {
        self.commands(command_buffer)
            .into_iter()
            .filter_map(|command| match command {
                Command::BindPipeline(pipeline) => Some(pipeline),
                _ => None,
            })
            .collect()
    }

    /// Descriptor sets bound in `command_buffer`, in order
    pub fn bound_descriptor_sets(&self, command_buffer: vk::CommandBuffer) -> Vec<vk::DescriptorSet> {
        self.commands(command_buffer)
            .into_iter()
            .filter_map(|command| match command {
                Command::BindDescriptorSet(set) => Some(set),
                _ => None,
            })
            .collect()
    }

    /// Description a pipeline was created from
    pub fn pipeline_desc(&self, pipeline: vk::Pipeline) -> Option<GraphicsPipelineDesc> {
        self.state().pipelines.get(&pipeline.as_raw()).cloned()
    }

    /// Current contents of a buffer
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Vec<u8> {
        self.state().buffers.get(&buffer.as_raw()).cloned().unwrap_or_default()
    }

    /// Writes applied to a descriptor set
    pub fn descriptor_writes(&self, set: vk::DescriptorSet) -> Vec<DescriptorWrite> {
        self.state().descriptor_writes.get(&set.as_raw()).cloned().unwrap_or_default()
    }

    /// Every submission so far
    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Times an in-flight command buffer was begun or reset
    pub fn recording_violations(&self) -> usize {
        self.state().violations
    }

    /// Times an acquire was asked to signal a semaphore with a pending signal
    pub fn semaphore_violations(&self) -> usize {
        self.state().semaphore_violations
    }

    /// Command buffers submitted and not yet waited on
    pub fn in_flight_count(&self) -> usize {
        self.state().in_flight.values().map(Vec::len).sum()
    }

    /// Times `wait_idle` was called
    pub fn wait_idle_count(&self) -> usize {
        self.state().wait_idle_count
    }

    /// Queue acquire results, returned before normal acquisition resumes
    pub fn script_acquire(&self, outcomes: impl IntoIterator<Item = AcquireOutcome>) {
        self.state().acquire_script.extend(outcomes);
    }

    /// Queue present results, returned before normal presentation resumes
    pub fn script_present(&self, outcomes: impl IntoIterator<Item = PresentOutcome>) {
        self.state().present_script.extend(outcomes);
    }

    fn default_surface() -> SurfaceSupport {
        SurfaceSupport {
            capabilities: vk::SurfaceCapabilitiesKHR {
                min_image_count: 2,
                max_image_count: 3,
                current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
                min_image_extent: vk::Extent2D { width: 1, height: 1 },
                max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
                current_transform: vk::SurfaceTransformFlagsKHR::IDENTITY,
                ..Default::default()
            },
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        }
    }

    fn in_flight_buffers(state: &MockState) -> HashSet<u64> {
        state.in_flight.values().flatten().copied().collect()
    }
}

impl GpuDevice for MockDevice {
    fn surface_support(&self) -> VulkanResult<SurfaceSupport> {
        Ok(self.state().surface.clone().unwrap_or_else(Self::default_surface))
    }

    fn limits(&self) -> DeviceLimits {
        self.state().limits.unwrap_or(DeviceLimits {
            max_vertex_input_attributes: 16,
            framebuffer_sample_counts: vk::SampleCountFlags::TYPE_1
                | vk::SampleCountFlags::TYPE_2
                | vk::SampleCountFlags::TYPE_4,
        })
    }

    fn wait_idle(&self) -> VulkanResult<()> {
        let mut state = self.state();
        state.wait_idle_count += 1;
        state.in_flight.clear();
        Ok(())
    }

    fn create_swapchain(&self, desc: &SwapchainDesc) -> VulkanResult<vk::SwapchainKHR> {
        let raw = self.create("swapchain")?;
        self.state().swapchain_image_count.insert(raw, desc.image_count);
        Ok(vk::SwapchainKHR::from_raw(raw))
    }

    fn swapchain_images(&self, swapchain: vk::SwapchainKHR) -> VulkanResult<Vec<vk::Image>> {
        let count = self.state().swapchain_image_count.get(&swapchain.as_raw()).copied().unwrap_or(0);
        Ok((0..count).map(|_| vk::Image::from_raw(self.handle())).collect())
    }

    fn destroy_swapchain(&self, swapchain: vk::SwapchainKHR) {
        self.destroy("swapchain", swapchain.as_raw());
    }

    fn acquire_next_image(
        &self,
        swapchain: vk::SwapchainKHR,
        _timeout: u64,
        signal: vk::Semaphore,
    ) -> VulkanResult<AcquireOutcome> {
        let mut state = self.state();
        let outcome = if state.acquire_script.is_empty() {
            let count = state.swapchain_image_count.get(&swapchain.as_raw()).copied().unwrap_or(1).max(1);
            let image_index = state.next_image % count;
            state.next_image = state.next_image.wrapping_add(1);
            AcquireOutcome::Acquired { image_index, suboptimal: false }
        } else {
            state.acquire_script.remove(0)
        };

        // Out-of-date acquires leave the semaphore untouched
        if matches!(outcome, AcquireOutcome::Acquired { .. })
            && signal != vk::Semaphore::null()
            && !state.signaled_semaphores.insert(signal.as_raw())
        {
            state.semaphore_violations += 1;
        }
        Ok(outcome)
    }

    fn queue_present(
        &self,
        _swapchain: vk::SwapchainKHR,
        _image_index: u32,
        _wait: vk::Semaphore,
    ) -> VulkanResult<PresentOutcome> {
        let mut state = self.state();
        if !state.present_script.is_empty() {
            return Ok(state.present_script.remove(0));
        }
        Ok(PresentOutcome::Presented)
    }

    fn create_image_view(
        &self,
        _image: vk::Image,
        _format: vk::Format,
        _aspect: vk::ImageAspectFlags,
    ) -> VulkanResult<vk::ImageView> {
        self.create("image_view").map(vk::ImageView::from_raw)
    }

    fn destroy_image_view(&self, view: vk::ImageView) {
        self.destroy("image_view", view.as_raw());
    }

    fn create_attachment_image(&self, _desc: &AttachmentImageDesc) -> VulkanResult<AllocatedImage> {
        let raw = self.create("attachment_image")?;
        Ok(AllocatedImage {
            image: vk::Image::from_raw(raw),
            memory: vk::DeviceMemory::from_raw(raw),
            view: vk::ImageView::from_raw(raw),
        })
    }

    fn destroy_attachment_image(&self, image: &AllocatedImage) {
        self.destroy("attachment_image", image.image.as_raw());
    }

    fn create_render_pass(&self, _layout: &RenderPassLayout) -> VulkanResult<vk::RenderPass> {
        self.create("render_pass").map(vk::RenderPass::from_raw)
    }

    fn destroy_render_pass(&self, render_pass: vk::RenderPass) {
        self.destroy("render_pass", render_pass.as_raw());
    }

    fn create_framebuffer(
        &self,
        _render_pass: vk::RenderPass,
        _attachments: &[vk::ImageView],
        _extent: vk::Extent2D,
    ) -> VulkanResult<vk::Framebuffer> {
        self.create("framebuffer").map(vk::Framebuffer::from_raw)
    }

    fn destroy_framebuffer(&self, framebuffer: vk::Framebuffer) {
        self.destroy("framebuffer", framebuffer.as_raw());
    }

    fn create_shader_module(&self, _code: &[u32]) -> VulkanResult<vk::ShaderModule> {
        self.create("shader_module").map(vk::ShaderModule::from_raw)
    }

    fn destroy_shader_module(&self, module: vk::ShaderModule) {
        self.destroy("shader_module", module.as_raw());
    }

    fn create_descriptor_set_layout(
        &self,
        _bindings: &[vk::DescriptorSetLayoutBinding],
    ) -> VulkanResult<vk::DescriptorSetLayout> {
        self.create("descriptor_set_layout").map(vk::DescriptorSetLayout::from_raw)
    }

    fn destroy_descriptor_set_layout(&self, layout: vk::DescriptorSetLayout) {
        self.destroy("descriptor_set_layout", layout.as_raw());
    }

    fn create_pipeline_layout(
        &self,
        _set_layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<vk::PipelineLayout> {
        self.create("pipeline_layout").map(vk::PipelineLayout::from_raw)
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        self.destroy("pipeline_layout", layout.as_raw());
    }

    fn create_graphics_pipeline(&self, desc: &GraphicsPipelineDesc) -> VulkanResult<vk::Pipeline> {
        if self.state().fail_next.remove("graphics_pipeline") {
            return Err(VulkanError::ResourceCreation {
                resource: "graphics pipeline",
                source: vk::Result::ERROR_INITIALIZATION_FAILED,
            });
        }
        let raw = self.create("pipeline")?;
        self.state().pipelines.insert(raw, desc.clone());
        Ok(vk::Pipeline::from_raw(raw))
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        self.destroy("pipeline", pipeline.as_raw());
    }

    fn create_buffer(
        &self,
        size: vk::DeviceSize,
        _usage: vk::BufferUsageFlags,
    ) -> VulkanResult<AllocatedBuffer> {
        let raw = self.create("buffer")?;
        self.state().buffers.insert(raw, vec![0; size as usize]);
        Ok(AllocatedBuffer {
            buffer: vk::Buffer::from_raw(raw),
            memory: vk::DeviceMemory::from_raw(raw),
            size,
        })
    }

    fn write_buffer(&self, buffer: &AllocatedBuffer, offset: vk::DeviceSize, data: &[u8]) -> VulkanResult<()> {
        let mut state = self.state();
        let contents = state.buffers.get_mut(&buffer.buffer.as_raw()).ok_or(VulkanError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED))?;
        let start = offset as usize;
        let end = start + data.len();
        if end > contents.len() {
            return Err(VulkanError::Api(vk::Result::ERROR_MEMORY_MAP_FAILED));
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    fn destroy_buffer(&self, buffer: &AllocatedBuffer) {
        self.state().buffers.remove(&buffer.buffer.as_raw());
        self.destroy("buffer", buffer.buffer.as_raw());
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        _pool_sizes: &[vk::DescriptorPoolSize],
    ) -> VulkanResult<vk::DescriptorPool> {
        let raw = self.create("descriptor_pool")?;
        self.state().pool_capacity.insert(raw, max_sets);
        Ok(vk::DescriptorPool::from_raw(raw))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        self.destroy("descriptor_pool", pool.as_raw());
    }

    fn allocate_descriptor_sets(
        &self,
        pool: vk::DescriptorPool,
        layouts: &[vk::DescriptorSetLayout],
    ) -> VulkanResult<Vec<vk::DescriptorSet>> {
        {
            let mut state = self.state();
            let capacity = state.pool_capacity.get(&pool.as_raw()).copied().unwrap_or(0);
            let used = state.pool_used.entry(pool.as_raw()).or_default();
            if *used + layouts.len() as u32 > capacity {
                return Err(VulkanError::ResourceCreation {
                    resource: "descriptor sets",
                    source: vk::Result::ERROR_OUT_OF_POOL_MEMORY,
                });
            }
            *used += layouts.len() as u32;
        }
        layouts
            .iter()
            .map(|_| self.create("descriptor_set").map(vk::DescriptorSet::from_raw))
            .collect()
    }

    fn free_descriptor_sets(&self, pool: vk::DescriptorPool, sets: &[vk::DescriptorSet]) -> VulkanResult<()> {
        for set in sets {
            self.destroy("descriptor_set", set.as_raw());
        }
        let mut state = self.state();
        let used = state.pool_used.entry(pool.as_raw()).or_default();
        *used = used.saturating_sub(sets.len() as u32);
        Ok(())
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) {
        self.state().descriptor_writes.entry(set.as_raw()).or_default().extend_from_slice(writes);
    }

    fn create_command_pool(&self) -> VulkanResult<vk::CommandPool> {
        self.create("command_pool").map(vk::CommandPool::from_raw)
    }

    fn destroy_command_pool(&self, pool: vk::CommandPool) {
        {
            let mut state = self.state();
            let in_flight = Self::in_flight_buffers(&state);
            let owned: Vec<u64> = state
                .pool_of_buffer
                .iter()
                .filter(|(_, &owner)| owner == pool.as_raw())
                .map(|(&buffer, _)| buffer)
                .collect();
            if owned.iter().any(|buffer| in_flight.contains(buffer)) {
                state.violations += 1;
            }
            for buffer in owned {
                state.pool_of_buffer.remove(&buffer);
            }
        }
        self.destroy("command_pool", pool.as_raw());
    }

    fn reset_command_pool(&self, pool: vk::CommandPool) -> VulkanResult<()> {
        let mut state = self.state();
        let in_flight = Self::in_flight_buffers(&state);
        let busy = state
            .pool_of_buffer
            .iter()
            .any(|(buffer, &owner)| owner == pool.as_raw() && in_flight.contains(buffer));
        if busy {
            state.violations += 1;
        }
        Ok(())
    }

    fn allocate_command_buffers(
        &self,
        pool: vk::CommandPool,
        count: u32,
    ) -> VulkanResult<Vec<vk::CommandBuffer>> {
        let buffers: Vec<u64> = (0..count).map(|_| self.handle()).collect();
        let mut state = self.state();
        for &buffer in &buffers {
            state.pool_of_buffer.insert(buffer, pool.as_raw());
        }
        Ok(buffers.into_iter().map(vk::CommandBuffer::from_raw).collect())
    }

    fn begin_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        let mut state = self.state();
        if Self::in_flight_buffers(&state).contains(&command_buffer.as_raw()) {
            state.violations += 1;
        }
        state.commands.insert(command_buffer.as_raw(), vec![Command::Begin]);
        Ok(())
    }

    fn end_command_buffer(&self, command_buffer: vk::CommandBuffer) -> VulkanResult<()> {
        self.record(command_buffer, Command::End);
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        command_buffer: vk::CommandBuffer,
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        render_area: vk::Rect2D,
        clear_values: &[vk::ClearValue],
    ) {
        self.record(command_buffer, Command::BeginRenderPass {
            render_pass,
            framebuffer,
            extent: render_area.extent,
            clear_count: clear_values.len(),
        });
    }

    fn cmd_end_render_pass(&self, command_buffer: vk::CommandBuffer) {
        self.record(command_buffer, Command::EndRenderPass);
    }

    fn cmd_set_viewport(&self, command_buffer: vk::CommandBuffer, viewport: vk::Viewport) {
        self.record(command_buffer, Command::SetViewport(vk::Extent2D {
            width: viewport.width as u32,
            height: viewport.height as u32,
        }));
    }

    fn cmd_set_scissor(&self, command_buffer: vk::CommandBuffer, scissor: vk::Rect2D) {
        self.record(command_buffer, Command::SetScissor(scissor.extent));
    }

    fn cmd_bind_pipeline(&self, command_buffer: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(command_buffer, Command::BindPipeline(pipeline));
    }

    fn cmd_bind_vertex_buffer(&self, command_buffer: vk::CommandBuffer, buffer: vk::Buffer) {
        self.record(command_buffer, Command::BindVertexBuffer(buffer));
    }

    fn cmd_bind_index_buffer(
        &self,
        command_buffer: vk::CommandBuffer,
        buffer: vk::Buffer,
        _index_type: vk::IndexType,
    ) {
        self.record(command_buffer, Command::BindIndexBuffer(buffer));
    }

    fn cmd_bind_descriptor_set(
        &self,
        command_buffer: vk::CommandBuffer,
        _layout: vk::PipelineLayout,
        set: vk::DescriptorSet,
    ) {
        self.record(command_buffer, Command::BindDescriptorSet(set));
    }

    fn cmd_draw_indexed(&self, command_buffer: vk::CommandBuffer, index_count: u32) {
        self.record(command_buffer, Command::DrawIndexed(index_count));
    }

    fn create_semaphore(&self) -> VulkanResult<vk::Semaphore> {
        self.create("semaphore").map(vk::Semaphore::from_raw)
    }

    fn destroy_semaphore(&self, semaphore: vk::Semaphore) {
        self.destroy("semaphore", semaphore.as_raw());
    }

    fn create_fence(&self, _signaled: bool) -> VulkanResult<vk::Fence> {
        self.create("fence").map(vk::Fence::from_raw)
    }

    fn destroy_fence(&self, fence: vk::Fence) {
        self.destroy("fence", fence.as_raw());
    }

    fn wait_for_fences(&self, fences: &[vk::Fence], _timeout: u64) -> VulkanResult<()> {
        let mut state = self.state();
        for fence in fences {
            assert_ne!(*fence, vk::Fence::null(), "waited on a null fence");
            state.in_flight.remove(&fence.as_raw());
        }
        Ok(())
    }

    fn reset_fence(&self, _fence: vk::Fence) -> VulkanResult<()> {
        Ok(())
    }

    fn queue_submit(&self, submission: &Submission) -> VulkanResult<()> {
        let mut state = self.state();
        state
            .in_flight
            .entry(submission.fence.as_raw())
            .or_default()
            .push(submission.command_buffer.as_raw());
        state.signaled_semaphores.remove(&submission.wait_semaphore.as_raw());
        state.submissions.push(*submission);
        Ok(())
    }
}

/// Shader provider that fabricates one module per path
pub struct MockShaders {
    device: Arc<MockDevice>,
    modules: Mutex<HashMap<String, vk::ShaderModule>>,
}

impl MockShaders {
    /// Create a provider backed by `device`
    pub fn new(device: Arc<MockDevice>) -> Self {
        Self {
            device,
            modules: Mutex::new(HashMap::new()),
        }
    }
}

impl ShaderProvider for MockShaders {
    fn get(&self, path: &str) -> VulkanResult<vk::ShaderModule> {
        let mut modules = self.modules.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(&module) = modules.get(path) {
            return Ok(module);
        }
        let module = self.device.create_shader_module(&[])?;
        modules.insert(path.to_string(), module);
        Ok(module)
    }
}

impl Drop for MockShaders {
    fn drop(&mut self) {
        let modules = self.modules.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (_, module) in modules.drain() {
            self.device.destroy_shader_module(module);
        }
    }
}
