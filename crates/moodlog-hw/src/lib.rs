//! moodlog-hw — Webcam capture for the emotion logger.
//!
//! Provides V4L2-based camera access and conversion of YUYV, GREY and
//! MJPEG buffers to grayscale frames.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo, FrameSource, PixelFormat};
pub use frame::Frame;
