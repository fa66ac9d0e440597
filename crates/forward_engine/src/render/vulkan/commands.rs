//! Command recording units
//!
//! A [`CommandUnit`] owns one command pool and the buffers allocated from it,
//! so units belonging to different swapchain images can be recorded on
//! different threads. A [`CommandSet`] is one unit per swapchain image.
//!
//! Recording goes through [`CommandRecorder`] and [`ActiveRenderPass`]; the
//! render pass ends when the `ActiveRenderPass` is dropped.

use std::sync::Arc;
use std::thread;

use ash::vk;

use crate::render::api::GpuDevice;
use crate::render::object::ObjectId;
use super::{VulkanError, VulkanResult};

/// Clear color of the color attachment (opaque black)
pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Everything needed to draw one object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawItem {
    /// Object being drawn
    pub object: ObjectId,
    /// Whether the object belongs to the blended overlay pass
    pub overlay: bool,
    /// Cached pipeline for the object's signature
    pub pipeline: vk::Pipeline,
    /// Layout of that pipeline
    pub pipeline_layout: vk::PipelineLayout,
    /// Vertex buffer
    pub vertex_buffer: vk::Buffer,
    /// Index buffer
    pub index_buffer: vk::Buffer,
    /// Index element type
    pub index_type: vk::IndexType,
    /// Number of indices
    pub index_count: u32,
    /// Descriptor set for each swapchain image
    pub descriptor_sets: Vec<vk::DescriptorSet>,
}

/// Where a unit renders to
#[derive(Debug, Clone, Copy)]
pub struct RenderTarget {
    /// Render pass
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the unit's swapchain image
    pub framebuffer: vk::Framebuffer,
    /// Render area and viewport size
    pub extent: vk::Extent2D,
}

/// Type-safe command buffer recorder
pub struct CommandRecorder<'a> {
    device: &'a dyn GpuDevice,
    command_buffer: vk::CommandBuffer,
    recording: bool,
}

impl<'a> CommandRecorder<'a> {
    /// Begin recording into `command_buffer`
    pub fn begin(device: &'a dyn GpuDevice, command_buffer: vk::CommandBuffer) -> VulkanResult<Self> {
        device.begin_command_buffer(command_buffer)?;
        Ok(Self { device, command_buffer, recording: true })
    }

    /// Begin the render pass, clearing color and depth
    pub fn begin_render_pass(&mut self, target: &RenderTarget) -> ActiveRenderPass<'_, 'a> {
        let clear_values = [
            vk::ClearValue {
                color: vk::ClearColorValue { float32: CLEAR_COLOR },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
            },
        ];
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: target.extent,
        };

        self.device.cmd_begin_render_pass(
            self.command_buffer,
            target.render_pass,
            target.framebuffer,
            render_area,
            &clear_values,
        );

        ActiveRenderPass { recorder: self }
    }

    /// Finish recording
    pub fn end(mut self) -> VulkanResult<vk::CommandBuffer> {
        self.recording = false;
        self.device.end_command_buffer(self.command_buffer)?;
        Ok(self.command_buffer)
    }
}

impl Drop for CommandRecorder<'_> {
    fn drop(&mut self) {
        if self.recording {
            log::warn!("Command buffer {:?} dropped while still recording", self.command_buffer);
        }
    }
}

/// Render pass in progress; ends on drop
pub struct ActiveRenderPass<'r, 'a> {
    recorder: &'r mut CommandRecorder<'a>,
}

impl ActiveRenderPass<'_, '_> {
    /// Cover the whole extent with viewport and scissor
    pub fn set_full_viewport(&mut self, extent: vk::Extent2D) {
        let viewport = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent,
        };
        self.recorder.device.cmd_set_viewport(self.recorder.command_buffer, viewport);
        self.recorder.device.cmd_set_scissor(self.recorder.command_buffer, scissor);
    }

    /// Bind everything `item` needs and draw it
    pub fn draw(&mut self, item: &DrawItem, descriptor_set: vk::DescriptorSet) {
        let device = self.recorder.device;
        let cb = self.recorder.command_buffer;
        device.cmd_bind_pipeline(cb, item.pipeline);
        device.cmd_bind_vertex_buffer(cb, item.vertex_buffer);
        device.cmd_bind_index_buffer(cb, item.index_buffer, item.index_type);
        device.cmd_bind_descriptor_set(cb, item.pipeline_layout, descriptor_set);
        device.cmd_draw_indexed(cb, item.index_count);
    }
}

impl Drop for ActiveRenderPass<'_, '_> {
    fn drop(&mut self) {
        self.recorder.device.cmd_end_render_pass(self.recorder.command_buffer);
    }
}

/// One command pool and its buffers, recorded for a single swapchain image
pub struct CommandUnit {
    device: Arc<dyn GpuDevice>,
    pool: vk::CommandPool,
    command_buffers: Vec<vk::CommandBuffer>,
    image_index: usize,
    draw_count: usize,
}

impl CommandUnit {
    /// Create a pool and allocate `count` primary buffers from it
    pub fn new(device: Arc<dyn GpuDevice>, image_index: usize, count: u32) -> VulkanResult<Self> {
        let pool = device.create_command_pool()?;
        let command_buffers = match device.allocate_command_buffers(pool, count.max(1)) {
            Ok(buffers) => buffers,
            Err(e) => {
                device.destroy_command_pool(pool);
                return Err(e);
            }
        };

        Ok(Self {
            device,
            pool,
            command_buffers,
            image_index,
            draw_count: 0,
        })
    }

    /// Record the frame for this unit's image into the primary buffer
    ///
    /// Non-overlay items are drawn first, then overlay items; each group keeps
    /// the order of `draws`.
    pub fn record(&mut self, draws: &[DrawItem], target: &RenderTarget) -> VulkanResult<()> {
        self.device.reset_command_pool(self.pool)?;

        let device = self.device.as_ref();
        let mut recorder = CommandRecorder::begin(device, self.primary())?;
        let mut drawn = 0;
        {
            let mut pass = recorder.begin_render_pass(target);
            pass.set_full_viewport(target.extent);

            for overlay in [false, true] {
                for item in draws.iter().filter(|item| item.overlay == overlay) {
                    match item.descriptor_sets.get(self.image_index) {
                        Some(&set) => {
                            pass.draw(item, set);
                            drawn += 1;
                        }
                        None => log::trace!("Object {} has no descriptor set for image {}", item.object, self.image_index),
                    }
                }
            }
        }
        recorder.end()?;

        self.draw_count = drawn;
        log::trace!("Recorded {} draws for image {}", drawn, self.image_index);
        Ok(())
    }

    /// The buffer submitted for this unit's image
    pub fn primary(&self) -> vk::CommandBuffer {
        self.command_buffers[0]
    }

    /// Every buffer allocated from this unit's pool
    pub fn command_buffers(&self) -> &[vk::CommandBuffer] {
        &self.command_buffers
    }

    /// Draws issued by the last recording
    pub fn draw_count(&self) -> usize {
        self.draw_count
    }

    /// Swapchain image this unit renders
    pub fn image_index(&self) -> usize {
        self.image_index
    }
}

impl Drop for CommandUnit {
    fn drop(&mut self) {
        self.device.destroy_command_pool(self.pool);
    }
}

/// One command unit per swapchain image
pub struct CommandSet {
    units: Vec<CommandUnit>,
}

impl CommandSet {
    /// Create `image_count` units
    pub fn new(device: &Arc<dyn GpuDevice>, image_count: usize, buffers_per_unit: u32) -> VulkanResult<Self> {
        let units = (0..image_count)
            .map(|image_index| CommandUnit::new(device.clone(), image_index, buffers_per_unit))
            .collect::<VulkanResult<Vec<_>>>()?;
        Ok(Self { units })
    }

    /// Record every unit, one worker thread per image
    ///
    /// `framebuffers[i]` is the framebuffer of image `i`. All workers are
    /// joined before returning; the first error is returned.
    pub fn record_all(
        &mut self,
        draws: &[DrawItem],
        render_pass: vk::RenderPass,
        framebuffers: &[vk::Framebuffer],
        extent: vk::Extent2D,
    ) -> VulkanResult<()> {
        if framebuffers.len() != self.units.len() {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "{} framebuffers for {} command units",
                    framebuffers.len(),
                    self.units.len()
                ),
            });
        }

        thread::scope(|scope| {
            let workers = self
                .units
                .iter_mut()
                .zip(framebuffers)
                .map(|(unit, &framebuffer)| {
                    let target = RenderTarget { render_pass, framebuffer, extent };
                    thread::Builder::new()
                        .name(format!("record-image-{}", unit.image_index()))
                        .spawn_scoped(scope, move || unit.record(draws, &target))
                        .map_err(|e| VulkanError::InvalidOperation {
                            reason: format!("Failed to spawn recording worker: {e}"),
                        })
                })
                .collect::<Vec<_>>();

            let mut result = Ok(());
            for worker in workers {
                let outcome = match worker {
                    Ok(handle) => match handle.join() {
                        Ok(outcome) => outcome,
                        Err(panic) => std::panic::resume_unwind(panic),
                    },
                    Err(e) => Err(e),
                };
                if result.is_ok() {
                    result = outcome;
                }
            }
            result
        })
    }

    /// Primary buffer for a swapchain image
    pub fn command_buffer(&self, image_index: usize) -> Option<vk::CommandBuffer> {
        self.units.get(image_index).map(CommandUnit::primary)
    }

    /// Units in image order
    pub fn units(&self) -> &[CommandUnit] {
        &self.units
    }

    /// Number of units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Whether there are no units
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;
    use crate::render::testing::{Command, MockDevice};

    fn item(raw: u64, overlay: bool, images: usize) -> DrawItem {
        DrawItem {
            object: ObjectId::next(),
            overlay,
            pipeline: vk::Pipeline::from_raw(raw),
            pipeline_layout: vk::PipelineLayout::from_raw(raw),
            vertex_buffer: vk::Buffer::from_raw(raw),
            index_buffer: vk::Buffer::from_raw(raw + 1000),
            index_type: vk::IndexType::UINT32,
            index_count: 3,
            descriptor_sets: (0..images).map(|i| vk::DescriptorSet::from_raw(raw * 10 + i as u64)).collect(),
        }
    }

    fn framebuffers(count: usize) -> Vec<vk::Framebuffer> {
        (0..count).map(|i| vk::Framebuffer::from_raw(500 + i as u64)).collect()
    }

    #[test]
    fn test_record_structure() {
        let device = MockDevice::new();
        let dyn_device: Arc<dyn GpuDevice> = device.clone();
        let mut unit = CommandUnit::new(dyn_device, 0, 1).unwrap();
        let extent = vk::Extent2D { width: 640, height: 480 };
        let target = RenderTarget {
            render_pass: vk::RenderPass::from_raw(7),
            framebuffer: vk::Framebuffer::from_raw(8),
            extent,
        };

        unit.record(&[item(1, false, 1)], &target).unwrap();

        let log = device.commands(unit.primary());
        assert_eq!(log.first(), Some(&Command::Begin));
        assert!(matches!(log[1], Command::BeginRenderPass { .. }));
        assert_eq!(log[2], Command::SetViewport(extent));
        assert_eq!(log[3], Command::SetScissor(extent));
        assert_eq!(log.last(), Some(&Command::End));
        assert_eq!(log[log.len() - 2], Command::EndRenderPass);
        assert_eq!(unit.draw_count(), 1);
    }

    #[test]
    fn test_opaque_before_overlay() {
        let device = MockDevice::new();
        let dyn_device: Arc<dyn GpuDevice> = device.clone();
        let mut set = CommandSet::new(&dyn_device, 2, 1).unwrap();
        let draws = [item(1, true, 2), item(2, false, 2), item(3, true, 2), item(4, false, 2)];

        set.record_all(&draws, vk::RenderPass::from_raw(7), &framebuffers(2), vk::Extent2D { width: 1, height: 1 })
            .unwrap();

        for image in 0..2 {
            let bound = device.bound_pipelines(set.command_buffer(image).unwrap());
            let raws: Vec<u64> = bound.iter().map(|p| p.as_raw()).collect();
            assert_eq!(raws, vec![2, 4, 1, 3]);
        }
    }

    #[test]
    fn test_each_image_binds_its_own_descriptor_set() {
        let device = MockDevice::new();
        let dyn_device: Arc<dyn GpuDevice> = device.clone();
        let mut set = CommandSet::new(&dyn_device, 3, 1).unwrap();
        let draws = [item(4, false, 3)];

        set.record_all(&draws, vk::RenderPass::from_raw(7), &framebuffers(3), vk::Extent2D { width: 1, height: 1 })
            .unwrap();

        for image in 0..3 {
            let sets: Vec<_> = device
                .commands(set.command_buffer(image).unwrap())
                .into_iter()
                .filter_map(|c| match c {
                    Command::BindDescriptorSet(set) => Some(set),
                    _ => None,
                })
                .collect();
            assert_eq!(sets, vec![draws[0].descriptor_sets[image]]);
        }
    }

    #[test]
    fn test_framebuffer_count_mismatch() {
        let device: Arc<dyn GpuDevice> = MockDevice::new();
        let mut set = CommandSet::new(&device, 2, 1).unwrap();
        let result = set.record_all(&[], vk::RenderPass::null(), &framebuffers(3), vk::Extent2D::default());
        assert!(matches!(result, Err(VulkanError::InvalidOperation { .. })));
    }

    #[test]
    fn test_unit_owns_requested_buffers() {
        let device = MockDevice::new();
        {
            let unit = CommandUnit::new(device.clone(), 0, 3).unwrap();
            assert_eq!(unit.command_buffers().len(), 3);
            assert_eq!(device.live("command_pool"), 1);
        }
        assert_eq!(device.live("command_pool"), 0);
    }
}
