//! Render orchestration
//!
//! The [`RenderOrchestrator`] owns everything that depends on the window
//! surface, the signature-keyed pipeline cache, and per-object GPU resources.
//! It keeps two full command sets:
//!
//! - **active**: submitted by the frame loop, never re-recorded after its
//!   first submission until the next swap
//! - **pending**: the target of every re-recording, never submitted
//!
//! Objects removed from the scene are queued and their resources are released
//! only after the pending set recorded without them has become active, once
//! the in-flight fences have been waited on.
//!
//! ```text
//! Unregistered -> PipelineBuilding -> Initialized -> PendingRemoval -> Destroyed
//! ```

pub mod object_registry;
pub mod removal_queue;

use std::collections::HashSet;
use std::sync::Arc;

use ash::vk;

use crate::core::config::RendererConfig;
use crate::render::api::{GpuDevice, RenderPassLayout};
use crate::render::object::{ObjectId, RenderableObject, ShapeSignature};
use crate::render::pipeline::PipelineCache;
use crate::render::vulkan::render_pass::choose_sample_count;
use crate::render::vulkan::{
    CommandSet, DescriptorPool, DrawItem, RenderPass, RenderTargets, ShaderProvider, Swapchain, VulkanError,
    VulkanResult,
};
use crate::scene::camera::FrameContext;

pub use object_registry::{ObjectRegistry, ObjectResources, ObjectState};
pub use removal_queue::RemovalQueue;

/// What one call to [`RenderOrchestrator::synchronize_objects`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Objects registered by this call
    pub initialized: usize,
    /// Objects queued for removal by this call
    pub queued_for_removal: usize,
    /// Whether the pending command set was re-recorded
    pub re_recorded: bool,
}

fn surface_lost() -> VulkanError {
    VulkanError::InvalidOperation {
        reason: "Presentation surface is not available".to_string(),
    }
}

/// Surface-dependent state, rebuilt as a whole on resize
struct SurfaceState {
    targets: RenderTargets,
    render_pass: RenderPass,
    swapchain: Swapchain,
}

impl SurfaceState {
    fn new(device: &Arc<dyn GpuDevice>, config: &RendererConfig, window_size: vk::Extent2D) -> VulkanResult<Self> {
        let swapchain = Swapchain::new(device.clone(), window_size)?;
        let samples = choose_sample_count(config.msaa_samples, device.limits().framebuffer_sample_counts);
        let layout = RenderPassLayout {
            color_format: swapchain.format().format,
            depth_format: config.depth_format.to_vk(),
            samples,
        };
        let render_pass = RenderPass::new(device.clone(), layout)?;
        let targets = RenderTargets::new(device.clone(), &render_pass, &swapchain)?;
        Ok(Self { targets, render_pass, swapchain })
    }

    fn framebuffers(&self) -> Vec<vk::Framebuffer> {
        (0..self.targets.len()).filter_map(|i| self.targets.framebuffer(i)).collect()
    }
}

/// Owner of the swapchain, pipelines, object resources and command sets
pub struct RenderOrchestrator {
    // Fields drop top to bottom: command sets before the resources they
    // reference, the device last.
    active: CommandSet,
    pending: CommandSet,
    registry: ObjectRegistry,
    descriptor_pool: DescriptorPool,
    pipelines: PipelineCache,
    surface: Option<SurfaceState>,
    removal_queue: RemovalQueue,
    has_pending_swap: bool,
    config: RendererConfig,
    shaders: Arc<dyn ShaderProvider>,
    device: Arc<dyn GpuDevice>,
}

impl RenderOrchestrator {
    /// Build the surface state, register `initial_objects` and record them
    /// into the active set
    pub fn construct(
        device: Arc<dyn GpuDevice>,
        shaders: Arc<dyn ShaderProvider>,
        config: RendererConfig,
        window_size: vk::Extent2D,
        initial_objects: &mut [RenderableObject],
    ) -> VulkanResult<Self> {
        config
            .validate()
            .map_err(|e| VulkanError::InitializationFailed(e.to_string()))?;

        let surface = SurfaceState::new(&device, &config, window_size)?;
        let image_count = surface.swapchain.image_count();
        let descriptor_pool = DescriptorPool::new(device.clone(), config.max_objects, image_count as u32)?;
        let active = CommandSet::new(&device, image_count, config.command_buffers_per_unit)?;
        let pending = CommandSet::new(&device, image_count, config.command_buffers_per_unit)?;

        let mut orchestrator = Self {
            active,
            pending,
            registry: ObjectRegistry::new(),
            descriptor_pool,
            pipelines: PipelineCache::new(device.clone()),
            surface: Some(surface),
            removal_queue: RemovalQueue::new(),
            has_pending_swap: false,
            config,
            shaders,
            device,
        };

        orchestrator.add_and_initialize_new_objects(initial_objects)?;
        orchestrator.record_active(initial_objects)?;

        log::info!(
            "Render orchestrator ready: {} images, {} pipelines, {} objects",
            image_count,
            orchestrator.pipelines.len(),
            orchestrator.registry.len()
        );
        Ok(orchestrator)
    }

    fn is_excluded(&self, object: &RenderableObject) -> bool {
        object.marked_for_deletion || self.removal_queue.contains(object.id)
    }

    /// Never seen here and not already initialized by an engine
    fn is_new(&self, object: &RenderableObject) -> bool {
        !object.initialized_in_engine
            && self.registry.state(object.id) == ObjectState::Unregistered
            && !self.removal_queue.contains(object.id)
    }

    /// Register every object (and child) not seen before
    ///
    /// Builds one pipeline per new signature, concurrently, then allocates
    /// per-image uniform buffers and descriptor sets. Objects that are already
    /// registered, destroyed, queued for removal or inside a marked subtree
    /// are left alone. A failure rolls back the whole batch. Returns how many
    /// objects were registered.
    pub fn add_and_initialize_new_objects(&mut self, new_objects: &mut [RenderableObject]) -> VulkanResult<usize> {
        let mut fresh: Vec<&RenderableObject> = Vec::new();
        let mut seen = HashSet::new();
        for object in new_objects.iter() {
            object.visit_unmarked(&mut |o| {
                if self.is_new(o) && seen.insert(o.id) {
                    fresh.push(o);
                }
            });
        }

        if !fresh.is_empty() {
            for object in &fresh {
                self.registry.begin(object.id);
            }
            if let Err(e) = self.initialize(&fresh) {
                self.roll_back(&fresh);
                return Err(e);
            }
            log::debug!("Registered {} objects", fresh.len());
        }
        let registered = fresh.len();

        for object in new_objects.iter_mut() {
            object.visit_mut(&mut |o| {
                if self.registry.state(o.id) == ObjectState::Initialized {
                    o.initialized_in_engine = true;
                }
            });
        }
        Ok(registered)
    }

    fn roll_back(&mut self, batch: &[&RenderableObject]) {
        for object in batch {
            if let Err(e) = self.registry.discard(object.id, &mut self.descriptor_pool, &mut self.pipelines) {
                log::warn!("Failed to release object {} after failed registration: {}", object.id, e);
            }
        }
        let evicted = self.pipelines.evict_unused();
        log::debug!("Rolled back {} objects and {} pipelines", batch.len(), evicted);
    }

    fn initialize(&mut self, fresh: &[&RenderableObject]) -> VulkanResult<()> {
        let surface = self.surface.as_ref().ok_or_else(surface_lost)?;
        let layout = surface.render_pass.layout();
        let image_count = surface.swapchain.image_count();

        self.pipelines.build_missing(
            fresh.iter().filter_map(|o| o.signature()),
            self.shaders.as_ref(),
            surface.render_pass.handle(),
            layout.samples,
            &self.config,
        )?;

        let frame = FrameContext::default();
        for object in fresh {
            let resources = match object.signature() {
                Some(signature) => {
                    let pipeline = self.pipelines.acquire(signature)?;
                    match ObjectResources::allocate(
                        &self.device,
                        &mut self.descriptor_pool,
                        pipeline,
                        object,
                        image_count,
                        &frame,
                    ) {
                        Ok(resources) => Some(resources),
                        Err(e) => {
                            self.pipelines.release(signature);
                            return Err(e);
                        }
                    }
                }
                None => None,
            };
            self.registry.complete(object.id, resources);
        }
        Ok(())
    }

    fn draw_list(&self, objects: &[RenderableObject]) -> Vec<DrawItem> {
        let mut draws = Vec::new();
        for object in objects {
            object.visit_unmarked(&mut |o| {
                if let Some(item) = self.draw_item(o) {
                    draws.push(item);
                }
            });
        }
        draws
    }

    fn draw_item(&self, object: &RenderableObject) -> Option<DrawItem> {
        if self.is_excluded(object) {
            return None;
        }
        let mesh = object.mesh.as_ref()?;
        let resources = self.registry.resources(object.id)?;
        let Some(pipeline) = self.pipelines.get(&resources.signature()) else {
            log::trace!("No pipeline for object {}, skipping", object.id);
            return None;
        };

        Some(DrawItem {
            object: object.id,
            overlay: object.material.is_overlay(),
            pipeline: pipeline.handle(),
            pipeline_layout: pipeline.layout(),
            vertex_buffer: mesh.vertex_buffer,
            index_buffer: mesh.index_buffer,
            index_type: mesh.index_type,
            index_count: mesh.index_count,
            descriptor_sets: resources.descriptor_sets().to_vec(),
        })
    }

    fn record_into(
        set: &mut CommandSet,
        surface: &SurfaceState,
        draws: &[DrawItem],
    ) -> VulkanResult<()> {
        set.record_all(
            draws,
            surface.render_pass.handle(),
            &surface.framebuffers(),
            surface.targets.extent(),
        )
    }

    fn record_active(&mut self, objects: &[RenderableObject]) -> VulkanResult<()> {
        let draws = self.draw_list(objects);
        let surface = self.surface.as_ref().ok_or_else(surface_lost)?;
        Self::record_into(&mut self.active, surface, &draws)?;
        log::debug!("Recorded {} draws into the active set", draws.len());
        Ok(())
    }

    /// Record every visible object into the pending set
    ///
    /// The pending set becomes active on the next [`Self::update`].
    pub fn re_record_commands_for_all_objects(&mut self, all_objects: &[RenderableObject]) -> VulkanResult<()> {
        let draws = self.draw_list(all_objects);
        let surface = self.surface.as_ref().ok_or_else(surface_lost)?;
        Self::record_into(&mut self.pending, surface, &draws)?;
        self.has_pending_swap = true;
        log::debug!("Recorded {} draws into the pending set", draws.len());
        Ok(())
    }

    fn queue_removal(&mut self, object: &RenderableObject) -> usize {
        let mut queued = 0;
        object.visit(&mut |o| {
            if self.registry.mark_pending_removal(o.id) && self.removal_queue.push(o.id) {
                queued += 1;
            }
        });
        queued
    }

    /// Queue `to_remove` (with their children) and record `surviving_objects`
    /// into the pending set
    ///
    /// Resources are released on the [`Self::update`] that activates the
    /// new recording.
    pub fn remove_objects_and_record_commands(
        &mut self,
        to_remove: &[RenderableObject],
        surviving_objects: &[RenderableObject],
    ) -> VulkanResult<()> {
        let queued: usize = to_remove.iter().map(|o| self.queue_removal(o)).sum();
        log::debug!("Queued {} objects for removal", queued);
        self.re_record_commands_for_all_objects(surviving_objects)
    }

    /// Promote the pending set if one is ready
    ///
    /// Waits on the non-null `in_flight_fences`, swaps the command sets and
    /// releases the resources of every queued object. Returns whether a swap
    /// happened.
    pub fn update(&mut self, in_flight_fences: &[vk::Fence]) -> VulkanResult<bool> {
        if !self.has_pending_swap {
            return Ok(false);
        }

        let fences: Vec<vk::Fence> = in_flight_fences.iter().copied().filter(|f| *f != vk::Fence::null()).collect();
        if !fences.is_empty() {
            self.device.wait_for_fences(&fences, self.config.fence_timeout_ns)?;
        }

        std::mem::swap(&mut self.active, &mut self.pending);
        self.has_pending_swap = false;
        self.drain_removals()?;
        log::trace!("Promoted pending command set");
        Ok(true)
    }

    fn drain_removals(&mut self) -> VulkanResult<()> {
        let ids: Vec<ObjectId> = self.removal_queue.drain().collect();
        for id in ids {
            self.registry.destroy(id, &mut self.descriptor_pool, &mut self.pipelines)?;
        }
        Ok(())
    }

    /// Command buffer to submit for a swapchain image
    pub fn active_command_buffer(&self, image_index: usize) -> Option<vk::CommandBuffer> {
        self.active.command_buffer(image_index)
    }

    /// Bring the registry in line with `objects`
    ///
    /// Registers unseen objects, queues marked ones (with their children) and
    /// registered objects no longer present, and re-records the pending set
    /// only if something changed.
    pub fn synchronize_objects(&mut self, objects: &mut [RenderableObject]) -> VulkanResult<SyncReport> {
        let mut report = SyncReport::default();

        let mut present = HashSet::new();
        let mut marked: Vec<&RenderableObject> = Vec::new();
        for object in objects.iter() {
            object.visit(&mut |o| {
                present.insert(o.id);
                if o.marked_for_deletion {
                    marked.push(o);
                }
            });
        }
        for object in marked {
            report.queued_for_removal += self.queue_removal(object);
        }

        let missing: Vec<ObjectId> = self
            .registry
            .ids()
            .filter(|id| !present.contains(id) && self.registry.state(*id) == ObjectState::Initialized)
            .collect();
        for id in missing {
            if self.registry.mark_pending_removal(id) && self.removal_queue.push(id) {
                report.queued_for_removal += 1;
            }
        }
        self.registry.forget_destroyed(|id| present.contains(&id));

        report.initialized = self.add_and_initialize_new_objects(objects)?;

        if report.initialized > 0 || report.queued_for_removal > 0 {
            self.re_record_commands_for_all_objects(objects)?;
            report.re_recorded = true;
        }
        Ok(report)
    }

    /// Refresh the uniform buffers of `image_index` for every visible object
    pub fn update_uniforms(
        &self,
        image_index: usize,
        objects: &[RenderableObject],
        frame: &FrameContext,
    ) -> VulkanResult<()> {
        let mut result = Ok(());
        for object in objects {
            object.visit_unmarked(&mut |o| {
                if result.is_err() || self.is_excluded(o) {
                    return;
                }
                if let Some(resources) = self.registry.resources(o.id) {
                    result = resources.update(image_index, o, frame);
                }
            });
        }
        result
    }

    /// Rebuild everything that depends on the surface
    ///
    /// Waits for the device to go idle, rebuilds swapchain, render pass,
    /// attachments, framebuffers and both command sets, releases queued
    /// objects, and records `objects` into the new active set. Pipelines are
    /// rebuilt only if the color format or sample count changed; per-object
    /// resources only if the image count changed.
    pub fn recreate_surface(&mut self, window_size: vk::Extent2D, objects: &mut [RenderableObject]) -> VulkanResult<()> {
        self.device.wait_idle()?;

        let old = self.surface.take();
        let old_layout = old.as_ref().map(|s| s.render_pass.layout());
        let old_image_count = old.as_ref().map_or(0, |s| s.swapchain.image_count());
        drop(old);

        let surface = SurfaceState::new(&self.device, &self.config, window_size)?;
        let layout = surface.render_pass.layout();
        let image_count = surface.swapchain.image_count();
        self.surface = Some(surface);

        self.drain_removals()?;

        if old_layout != Some(layout) {
            log::info!("Render pass layout changed, rebuilding {} pipelines", self.pipelines.len());
            self.rebuild_pipelines()?;
        }
        if image_count != old_image_count {
            log::info!("Swapchain image count changed {} -> {}", old_image_count, image_count);
            self.reallocate_object_resources(objects, image_count)?;
        }

        self.active = CommandSet::new(&self.device, image_count, self.config.command_buffers_per_unit)?;
        self.pending = CommandSet::new(&self.device, image_count, self.config.command_buffers_per_unit)?;
        self.has_pending_swap = false;

        self.add_and_initialize_new_objects(objects)?;
        self.record_active(objects)?;

        log::info!("Recreated surface at {}x{}", self.extent().width, self.extent().height);
        Ok(())
    }

    fn rebuild_pipelines(&mut self) -> VulkanResult<()> {
        let surface = self.surface.as_ref().ok_or_else(surface_lost)?;
        self.pipelines.rebuild_all(
            self.shaders.as_ref(),
            surface.render_pass.handle(),
            surface.render_pass.layout().samples,
            &self.config,
        )
    }

    fn reallocate_object_resources(&mut self, objects: &[RenderableObject], image_count: usize) -> VulkanResult<()> {
        let released = self.registry.release_all_resources(&mut self.descriptor_pool)?;
        self.descriptor_pool = DescriptorPool::new(self.device.clone(), self.config.max_objects, image_count as u32)?;
        let pending: HashSet<ObjectId> = released.iter().map(|&(id, _)| id).collect();

        let frame = FrameContext::default();
        let mut restored = HashSet::new();
        let mut result = Ok(());
        for object in objects {
            object.visit(&mut |o| {
                if result.is_err() || !pending.contains(&o.id) || !restored.insert(o.id) {
                    return;
                }
                let Some(pipeline) = o.signature().and_then(|signature| self.pipelines.get(&signature)) else {
                    return;
                };
                match ObjectResources::allocate(&self.device, &mut self.descriptor_pool, pipeline, o, image_count, &frame) {
                    Ok(resources) => self.registry.restore(o.id, resources),
                    Err(e) => result = Err(e),
                }
            });
        }
        result?;

        for (id, signature) in released {
            if restored.contains(&id) {
                continue;
            }
            log::warn!("Object {} missing from the scene during resize, releasing it", id);
            self.registry.destroy(id, &mut self.descriptor_pool, &mut self.pipelines)?;
            self.pipelines.release(signature);
        }
        Ok(())
    }

    // === Inspection ===

    /// Current swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.surface.as_ref().map(|s| s.swapchain.extent()).unwrap_or_default()
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.surface.as_ref().map_or(0, |s| s.swapchain.image_count())
    }

    /// Swapchain used for acquire and present
    pub fn swapchain(&self) -> VulkanResult<&Swapchain> {
        self.surface.as_ref().map(|s| &s.swapchain).ok_or_else(surface_lost)
    }

    /// Whether a recorded pending set is waiting to be promoted
    pub fn has_pending_swap(&self) -> bool {
        self.has_pending_swap
    }

    /// Number of cached pipelines
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Registered objects using `signature`
    pub fn pipeline_users(&self, signature: &ShapeSignature) -> usize {
        self.pipelines.users(signature)
    }

    /// Objects queued for removal
    pub fn pending_removal_count(&self) -> usize {
        self.removal_queue.len()
    }

    /// Lifecycle state of an object
    pub fn object_state(&self, id: ObjectId) -> ObjectState {
        self.registry.state(id)
    }

    /// GPU resources of an initialized object
    pub fn object_resources(&self, id: ObjectId) -> Option<&ObjectResources> {
        self.registry.resources(id)
    }

    /// Device the orchestrator renders with
    pub fn device(&self) -> &Arc<dyn GpuDevice> {
        &self.device
    }

    /// Renderer settings
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }
}

impl Drop for RenderOrchestrator {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle during teardown: {}", e);
        }
        if let Err(e) = self.registry.release_all_resources(&mut self.descriptor_pool) {
            log::warn!("Failed to return descriptor sets: {}", e);
        }
        self.registry.clear();
    }
}
