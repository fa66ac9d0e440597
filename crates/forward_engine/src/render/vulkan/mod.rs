//! Vulkan rendering backend
//!
//! RAII wrappers over [`GpuDevice`](crate::render::api::GpuDevice) handles and
//! the ash implementation of the device itself.

pub mod buffer;
pub mod commands;
pub mod context;
pub mod descriptor_set;
pub mod device;
pub mod framebuffer;
pub mod render_pass;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use buffer::UniformBuffer;
pub use commands::{CommandSet, CommandUnit, DrawItem, RenderTarget};
pub use context::{VulkanError, VulkanResult};
pub use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetLayoutBuilder};
pub use device::VulkanDevice;
pub use framebuffer::RenderTargets;
pub use render_pass::RenderPass;
pub use shader::{ShaderCache, ShaderProvider};
pub use swapchain::Swapchain;
pub use sync::{Fence, FrameSync, Semaphore};
