//! Scene-side inputs to rendering
//!
//! The camera, the input snapshot and the per-frame context that uniform
//! producers read.

pub mod camera;

pub use camera::{Camera, FrameContext, InputState};
