//! Uniform payload layouts and producers
//!
//! Each [`UniformLayout`] has one `#[repr(C)]` Pod struct that matches the
//! std140 block declared by the shaders. Objects supply a [`UniformProducer`]
//! per stage: a layout tag and a closure that fills the block from the
//! current [`FrameContext`].

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use serde::{Serialize, Deserialize};

use crate::foundation::math::{to_column_major, Mat4, Vec4};
use crate::render::vulkan::{VulkanError, VulkanResult};
use crate::scene::camera::FrameContext;

/// Tag naming a uniform block layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UniformLayout {
    /// Model, view and projection matrices
    ModelViewProj,
    /// Matrices plus elapsed time
    ModelViewProjTime,
    /// Matrices plus ripple wave parameters
    ModelViewProjRipple,
    /// A single RGBA tint
    TintColor,
}

impl UniformLayout {
    /// Size of the block in bytes
    pub const fn size(self) -> usize {
        match self {
            Self::ModelViewProj => std::mem::size_of::<ModelViewProjUniform>(),
            Self::ModelViewProjTime => std::mem::size_of::<ModelViewProjTimeUniform>(),
            Self::ModelViewProjRipple => std::mem::size_of::<RippleUniform>(),
            Self::TintColor => std::mem::size_of::<TintColorUniform>(),
        }
    }
}

/// Model/view/projection block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelViewProjUniform {
    /// Object to world
    pub model: [[f32; 4]; 4],
    /// World to view
    pub view: [[f32; 4]; 4],
    /// View to clip (Vulkan conventions)
    pub proj: [[f32; 4]; 4],
}

impl ModelViewProjUniform {
    /// Fill the block from a model matrix and the frame camera
    pub fn new(model: &Mat4, frame: &FrameContext) -> Self {
        Self {
            model: to_column_major(model),
            view: to_column_major(&frame.camera.view_matrix()),
            proj: to_column_major(&frame.camera.vulkan_projection_matrix()),
        }
    }
}

/// Model/view/projection block with time
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ModelViewProjTimeUniform {
    /// Matrices
    pub mvp: ModelViewProjUniform,
    /// Seconds since start
    pub time: f32,
    /// std140 padding
    pub _padding: [f32; 3],
}

/// Ripple displacement block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RippleUniform {
    /// Matrices
    pub mvp: ModelViewProjUniform,
    /// Seconds since start
    pub time: f32,
    /// Displacement height
    pub amplitude: f32,
    /// Waves per unit length
    pub frequency: f32,
    /// Wave phase speed
    pub speed: f32,
}

/// Fragment tint block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct TintColorUniform {
    /// Linear RGBA
    pub color: [f32; 4],
}

/// A filled uniform block
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformData {
    /// See [`ModelViewProjUniform`]
    ModelViewProj(ModelViewProjUniform),
    /// See [`ModelViewProjTimeUniform`]
    ModelViewProjTime(ModelViewProjTimeUniform),
    /// See [`RippleUniform`]
    ModelViewProjRipple(RippleUniform),
    /// See [`TintColorUniform`]
    TintColor(TintColorUniform),
}

impl UniformData {
    /// Layout of this block
    pub fn layout(&self) -> UniformLayout {
        match self {
            Self::ModelViewProj(_) => UniformLayout::ModelViewProj,
            Self::ModelViewProjTime(_) => UniformLayout::ModelViewProjTime,
            Self::ModelViewProjRipple(_) => UniformLayout::ModelViewProjRipple,
            Self::TintColor(_) => UniformLayout::TintColor,
        }
    }

    /// Raw bytes to copy into the uniform buffer
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::ModelViewProj(data) => bytemuck::bytes_of(data),
            Self::ModelViewProjTime(data) => bytemuck::bytes_of(data),
            Self::ModelViewProjRipple(data) => bytemuck::bytes_of(data),
            Self::TintColor(data) => bytemuck::bytes_of(data),
        }
    }
}

type FillFn = dyn Fn(&FrameContext) -> UniformData + Send + Sync;

/// Layout tag plus the closure that fills it each frame
#[derive(Clone)]
pub struct UniformProducer {
    layout: UniformLayout,
    fill: Arc<FillFn>,
}

impl UniformProducer {
    /// Wrap a fill closure declared to produce `layout`
    pub fn new(
        layout: UniformLayout,
        fill: impl Fn(&FrameContext) -> UniformData + Send + Sync + 'static,
    ) -> Self {
        Self { layout, fill: Arc::new(fill) }
    }

    /// Static model matrix with the frame camera
    pub fn model_view_proj(model: Mat4) -> Self {
        Self::new(UniformLayout::ModelViewProj, move |frame| {
            UniformData::ModelViewProj(ModelViewProjUniform::new(&model, frame))
        })
    }

    /// Static model matrix with the frame camera and clock
    pub fn model_view_proj_time(model: Mat4) -> Self {
        Self::new(UniformLayout::ModelViewProjTime, move |frame| {
            UniformData::ModelViewProjTime(ModelViewProjTimeUniform {
                mvp: ModelViewProjUniform::new(&model, frame),
                time: frame.time,
                _padding: [0.0; 3],
            })
        })
    }

    /// Ripple with fixed wave parameters
    pub fn ripple(model: Mat4, amplitude: f32, frequency: f32, speed: f32) -> Self {
        Self::new(UniformLayout::ModelViewProjRipple, move |frame| {
            UniformData::ModelViewProjRipple(RippleUniform {
                mvp: ModelViewProjUniform::new(&model, frame),
                time: frame.time,
                amplitude,
                frequency,
                speed,
            })
        })
    }

    /// Constant tint
    pub fn tint(color: Vec4) -> Self {
        let color = [color.x, color.y, color.z, color.w];
        Self::new(UniformLayout::TintColor, move |_| {
            UniformData::TintColor(TintColorUniform { color })
        })
    }

    /// Declared layout
    pub fn layout(&self) -> UniformLayout {
        self.layout
    }

    /// Run the closure and check it honoured the declared layout
    pub fn produce(&self, frame: &FrameContext) -> VulkanResult<UniformData> {
        let data = (self.fill)(frame);
        if data.layout() != self.layout {
            return Err(VulkanError::InvalidOperation {
                reason: format!(
                    "Uniform producer declared {:?} but produced {:?}",
                    self.layout,
                    data.layout()
                ),
            });
        }
        Ok(data)
    }
}

impl fmt::Debug for UniformProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UniformProducer").field("layout", &self.layout).finish_non_exhaustive()
    }
}
