//! Device abstraction
//!
//! The narrow GPU interface the renderer is written against.

pub mod gpu_device;

pub use gpu_device::{
    AcquireOutcome, AllocatedBuffer, AllocatedImage, AttachmentImageDesc, DescriptorWrite,
    DeviceLimits, GpuDevice, GraphicsPipelineDesc, PresentOutcome, RenderPassLayout,
    Submission, SurfaceSupport, SwapchainDesc,
};
