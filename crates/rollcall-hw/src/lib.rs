//! rollcall-hw — Camera hardware behind the capture controller.
//!
//! Provides V4L2 camera access, grayscale conversion and JPEG encoding, and
//! a worker thread whose [`CameraHandle`] implements
//! [`rollcall_core::CameraSource`].

pub mod camera;
pub mod frame;
pub mod worker;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use frame::Frame;
pub use worker::{spawn_camera_worker, CameraHandle, FrameStats, WorkerConfig, WorkerError};
