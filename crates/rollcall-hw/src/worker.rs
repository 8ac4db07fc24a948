//! Dedicated camera thread serving capture requests for async callers.
//!
//! V4L2 capture is blocking and the device has a single owner, so the
//! `Camera` lives on its own OS thread and async code talks to it through a
//! bounded request channel.

use crate::camera::{Camera, CameraError, PixelFormat};
use crate::frame::Frame;
use async_trait::async_trait;
use rollcall_core::{CameraSource, CaptureFailure, CapturedImage};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("camera error: {0}")]
    Camera(#[from] CameraError),
    #[error("failed to spawn camera thread: {0}")]
    Spawn(std::io::Error),
    #[error("camera thread exited")]
    ChannelClosed,
}

/// Settings for [`spawn_camera_worker`].
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub device: String,
    pub width: u32,
    pub height: u32,
    /// Frames discarded after opening, while auto exposure settles.
    pub warmup_frames: usize,
    /// JPEG quality for encoded stills (1–100).
    pub jpeg_quality: u8,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            width: 720,
            height: 480,
            warmup_frames: 4,
            jpeg_quality: 90,
        }
    }
}

/// Brightness and geometry of one probe frame, for diagnostics.
#[derive(Debug, Clone)]
pub struct FrameStats {
    pub width: u32,
    pub height: u32,
    /// Format the driver negotiated.
    pub format: PixelFormat,
    pub sequence: u32,
    pub brightness: f32,
    pub is_dark: bool,
}

impl FrameStats {
    pub fn new(frame: &Frame, format: PixelFormat) -> Self {
        Self {
            width: frame.width,
            height: frame.height,
            format,
            sequence: frame.sequence,
            brightness: frame.avg_brightness(),
            is_dark: frame.is_dark,
        }
    }
}

/// Messages sent from async callers to the camera thread.
enum WorkerRequest {
    Capture {
        reply: oneshot::Sender<Result<CapturedImage, CaptureFailure>>,
    },
    Probe {
        reply: oneshot::Sender<Result<FrameStats, CameraError>>,
    },
}

/// Clone-safe handle to the camera thread.
#[derive(Clone)]
pub struct CameraHandle {
    tx: mpsc::Sender<WorkerRequest>,
}

impl CameraHandle {
    /// Grab one raw frame and report its statistics.
    pub async fn probe(&self) -> Result<FrameStats, WorkerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Probe { reply: reply_tx })
            .await
            .map_err(|_| WorkerError::ChannelClosed)?;
        Ok(reply_rx.await.map_err(|_| WorkerError::ChannelClosed)??)
    }
}

#[async_trait]
impl CameraSource for CameraHandle {
    async fn capture(&self) -> Result<CapturedImage, CaptureFailure> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(WorkerRequest::Capture { reply: reply_tx })
            .await
            .map_err(|_| CaptureFailure::Disconnected)?;
        reply_rx.await.map_err(|_| CaptureFailure::Disconnected)?
    }

    fn is_ready(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Open the camera and start serving captures on a dedicated OS thread.
///
/// Fails fast if the device cannot be opened. The thread exits once every
/// [`CameraHandle`] has been dropped.
pub fn spawn_camera_worker(config: WorkerConfig) -> Result<CameraHandle, WorkerError> {
    let camera = Camera::open(&config.device, config.width, config.height)?;

    if config.warmup_frames > 0 {
        tracing::info!(count = config.warmup_frames, "discarding warmup frames");
        for _ in 0..config.warmup_frames {
            let _ = camera.capture_frame();
        }
    }

    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(4);
    let quality = config.jpeg_quality;

    std::thread::Builder::new()
        .name("rollcall-camera".into())
        .spawn(move || {
            tracing::info!(device = %camera.device_path, "camera thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    WorkerRequest::Capture { reply } => {
                        let _ = reply.send(encode_still(camera.capture_frame(), quality));
                    }
                    WorkerRequest::Probe { reply } => {
                        let format = camera.pixel_format();
                        let _ = reply.send(
                            camera.capture_frame().map(|f| FrameStats::new(&f, format)),
                        );
                    }
                }
            }
            tracing::info!("camera thread exiting");
        })
        .map_err(WorkerError::Spawn)?;

    Ok(CameraHandle { tx })
}

/// Encode a captured frame as a JPEG still, rejecting dark frames.
fn encode_still(
    frame: Result<Frame, CameraError>,
    quality: u8,
) -> Result<CapturedImage, CaptureFailure> {
    let frame = frame.map_err(|e| CaptureFailure::NoFrame(e.to_string()))?;
    if frame.is_dark {
        tracing::debug!(seq = frame.sequence, "rejecting dark frame");
        return Err(CaptureFailure::DarkFrame);
    }
    let jpeg = frame
        .to_jpeg(quality)
        .map_err(|e| CaptureFailure::Encode(e.to_string()))?;
    Ok(CapturedImage::jpeg(jpeg))
}
