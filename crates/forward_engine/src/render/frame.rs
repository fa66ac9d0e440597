//! Frame driver
//!
//! Acquire, submit and present around a [`RenderOrchestrator`], with a fixed
//! number of frames in flight. Each frame slot owns a [`FrameSync`]; a second
//! table remembers which slot's fence last used each swapchain image.

use std::sync::Arc;

use ash::vk;

use crate::render::api::{AcquireOutcome, GpuDevice, PresentOutcome, Submission};
use crate::render::object::RenderableObject;
use crate::render::orchestrator::RenderOrchestrator;
use crate::render::vulkan::{FrameSync, VulkanError, VulkanResult};
use crate::scene::camera::FrameContext;

/// Result of [`FrameDriver::draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The image was submitted and presented
    Presented {
        /// Swapchain image that was drawn
        image_index: u32,
    },
    /// The swapchain no longer matches the surface; call
    /// [`FrameDriver::recreate_surface`] before the next frame
    SurfaceOutdated,
}

/// Per-frame synchronization and the acquire/submit/present sequence
pub struct FrameDriver {
    device: Arc<dyn GpuDevice>,
    frames: Vec<FrameSync>,
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
    fence_timeout_ns: u64,
}

impl FrameDriver {
    /// Create sync objects sized from the orchestrator's config and swapchain
    pub fn new(orchestrator: &RenderOrchestrator) -> VulkanResult<Self> {
        let device = orchestrator.device().clone();
        let frames = (0..orchestrator.config().frames_in_flight)
            .map(|_| FrameSync::new(device.clone()))
            .collect::<VulkanResult<Vec<_>>>()?;

        log::debug!("Frame driver ready with {} frames in flight", frames.len());
        Ok(Self {
            device,
            frames,
            images_in_flight: vec![vk::Fence::null(); orchestrator.image_count()],
            current_frame: 0,
            fence_timeout_ns: orchestrator.config().fence_timeout_ns,
        })
    }

    /// Render and present one frame
    ///
    /// Promotes the orchestrator's pending command set (if any) once every
    /// in-flight fence has signaled, refreshes the acquired image's uniforms
    /// and submits its active command buffer.
    pub fn draw_frame(
        &mut self,
        orchestrator: &mut RenderOrchestrator,
        objects: &[RenderableObject],
        frame: &FrameContext,
    ) -> VulkanResult<FrameStatus> {
        let sync = &self.frames[self.current_frame];
        sync.in_flight.wait(self.fence_timeout_ns)?;

        let outcome = orchestrator
            .swapchain()?
            .acquire_next_image(sync.image_available.handle(), self.fence_timeout_ns)?;
        // A suboptimal image has signaled `image_available` and must still be
        // submitted; only an out-of-date acquire leaves the semaphore unsignaled.
        let (image_index, acquired_suboptimal) = match outcome {
            AcquireOutcome::Acquired { image_index, suboptimal } => (image_index, suboptimal),
            AcquireOutcome::OutOfDate => {
                log::debug!("Swapchain out of date on acquire");
                return Ok(FrameStatus::SurfaceOutdated);
            }
        };
        let image = image_index as usize;

        orchestrator.update(&self.in_flight_fences())?;

        let image_fence = self.images_in_flight.get(image).copied().ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("Acquired image {image_index} beyond {} tracked images", self.images_in_flight.len()),
        })?;
        if image_fence != vk::Fence::null() && image_fence != sync.in_flight.handle() {
            self.device.wait_for_fences(&[image_fence], self.fence_timeout_ns)?;
        }
        self.images_in_flight[image] = sync.in_flight.handle();

        orchestrator.update_uniforms(image, objects, frame)?;

        let command_buffer = orchestrator.active_command_buffer(image).ok_or_else(|| VulkanError::InvalidOperation {
            reason: format!("No command buffer recorded for image {image_index}"),
        })?;
        sync.in_flight.reset()?;
        self.device.queue_submit(&Submission {
            command_buffer,
            wait_semaphore: sync.image_available.handle(),
            signal_semaphore: sync.render_finished.handle(),
            fence: sync.in_flight.handle(),
        })?;

        let presented = orchestrator
            .swapchain()?
            .present(image_index, sync.render_finished.handle())?;
        self.current_frame = (self.current_frame + 1) % self.frames.len();

        match presented {
            PresentOutcome::Presented if !acquired_suboptimal => Ok(FrameStatus::Presented { image_index }),
            _ => {
                log::debug!("Swapchain suboptimal or out of date, frame {} presented", image_index);
                Ok(FrameStatus::SurfaceOutdated)
            }
        }
    }

    /// Rebuild the orchestrator's surface state and reset image tracking
    pub fn recreate_surface(
        &mut self,
        orchestrator: &mut RenderOrchestrator,
        window_size: vk::Extent2D,
        objects: &mut [RenderableObject],
    ) -> VulkanResult<()> {
        orchestrator.recreate_surface(window_size, objects)?;
        self.images_in_flight = vec![vk::Fence::null(); orchestrator.image_count()];
        Ok(())
    }

    /// Fence of every frame slot
    pub fn in_flight_fences(&self) -> Vec<vk::Fence> {
        self.frames.iter().map(|sync| sync.in_flight.handle()).collect()
    }

    /// Index of the frame slot used by the next [`Self::draw_frame`]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    /// Number of frame slots
    pub fn frames_in_flight(&self) -> usize {
        self.frames.len()
    }
}

impl Drop for FrameDriver {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            log::error!("Failed to wait for device idle before destroying frame sync: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::RendererConfig;
    use crate::render::material::{MaterialType, Topology};
    use crate::render::object::MeshBinding;
    use crate::render::testing::{MockDevice, MockShaders};
    use ash::vk::Handle;

    fn setup(objects: &mut [RenderableObject]) -> (Arc<MockDevice>, RenderOrchestrator, FrameDriver) {
        let device = MockDevice::new();
        let shaders = Arc::new(MockShaders::new(device.clone()));
        let orchestrator = RenderOrchestrator::construct(
            device.clone(),
            shaders,
            RendererConfig::default(),
            vk::Extent2D { width: 640, height: 480 },
            objects,
        )
        .unwrap();
        let driver = FrameDriver::new(&orchestrator).unwrap();
        (device, orchestrator, driver)
    }

    fn pulse() -> RenderableObject {
        RenderableObject::new("pulse", MaterialType::Pulse).with_mesh(MeshBinding {
            vertex_buffer: vk::Buffer::from_raw(0xC1),
            index_buffer: vk::Buffer::from_raw(0xC2),
            index_count: 36,
            index_type: vk::IndexType::UINT32,
            vertex_layout: MaterialType::Pulse.default_vertex_layout(),
            topology: Topology::TriangleList,
        })
    }

    #[test]
    fn test_submits_active_buffer_of_acquired_image() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        let frame = FrameContext::default();

        for expected in 0..3u32 {
            let status = driver.draw_frame(&mut orchestrator, &objects, &frame).unwrap();
            assert_eq!(status, FrameStatus::Presented { image_index: expected });
        }

        let submissions = device.submissions();
        assert_eq!(submissions.len(), 3);
        for (image, submission) in submissions.iter().enumerate() {
            assert_eq!(Some(submission.command_buffer), orchestrator.active_command_buffer(image));
        }
        assert_eq!(submissions[0].fence, submissions[2].fence);
        assert_ne!(submissions[0].fence, submissions[1].fence);
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_pending_set_is_promoted_before_submit() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        let frame = FrameContext::default();
        driver.draw_frame(&mut orchestrator, &objects, &frame).unwrap();

        objects.push(pulse());
        orchestrator.synchronize_objects(&mut objects).unwrap();
        for _ in 0..4 {
            driver.draw_frame(&mut orchestrator, &objects, &frame).unwrap();
        }

        assert!(!orchestrator.has_pending_swap());
        let last = device.submissions().last().copied().unwrap();
        assert_eq!(device.bound_pipelines(last.command_buffer).len(), 2);
        assert_eq!(device.recording_violations(), 0);
    }

    #[test]
    fn test_out_of_date_acquire_skips_submission() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        device.script_acquire([AcquireOutcome::OutOfDate]);

        let status = driver.draw_frame(&mut orchestrator, &objects, &FrameContext::default()).unwrap();
        assert_eq!(status, FrameStatus::SurfaceOutdated);
        assert!(device.submissions().is_empty());
        assert_eq!(driver.current_frame(), 0);

        driver
            .recreate_surface(&mut orchestrator, vk::Extent2D { width: 800, height: 600 }, &mut objects)
            .unwrap();
        let status = driver.draw_frame(&mut orchestrator, &objects, &FrameContext::default()).unwrap();
        assert!(matches!(status, FrameStatus::Presented { .. }));
        assert_eq!(device.semaphore_violations(), 0);
    }

    #[test]
    fn test_suboptimal_acquire_still_submits() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        device.script_acquire([AcquireOutcome::Acquired { image_index: 0, suboptimal: true }]);

        let status = driver.draw_frame(&mut orchestrator, &objects, &FrameContext::default()).unwrap();
        assert_eq!(status, FrameStatus::SurfaceOutdated);
        assert_eq!(device.submissions().len(), 1);
        assert_eq!(driver.current_frame(), 1);

        driver
            .recreate_surface(&mut orchestrator, vk::Extent2D { width: 800, height: 600 }, &mut objects)
            .unwrap();
        for _ in 0..3 {
            let status = driver.draw_frame(&mut orchestrator, &objects, &FrameContext::default()).unwrap();
            assert!(matches!(status, FrameStatus::Presented { .. }));
        }
        assert_eq!(device.semaphore_violations(), 0);
    }

    #[test]
    fn test_suboptimal_present_reports_outdated() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        device.script_present([PresentOutcome::Suboptimal]);

        let status = driver.draw_frame(&mut orchestrator, &objects, &FrameContext::default()).unwrap();
        assert_eq!(status, FrameStatus::SurfaceOutdated);
        assert_eq!(device.submissions().len(), 1);
        assert_eq!(driver.current_frame(), 1);
    }

    #[test]
    fn test_uniforms_follow_frame_time() {
        let mut objects = vec![pulse()];
        let (device, mut orchestrator, mut driver) = setup(&mut objects);
        let mut frame = FrameContext::default();
        frame.advance(0.25);

        driver.draw_frame(&mut orchestrator, &objects, &frame).unwrap();

        let resources = orchestrator.object_resources(objects[0].id).unwrap();
        let contents = device.buffer_contents(resources.vertex_buffer(0).unwrap());
        assert_eq!(&contents[192..196], &0.25f32.to_ne_bytes());
    }
}
