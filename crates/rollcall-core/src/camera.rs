//! Camera source capability and the encoded still it produces.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// MIME type of the stills produced by the hardware adapter.
pub const JPEG_MIME: &str = "image/jpeg";

/// One encoded still image, as produced by a [`CameraSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    /// Encoded image bytes (JPEG for hardware captures).
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl CapturedImage {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// Wrap JPEG-encoded bytes.
    pub fn jpeg(bytes: Vec<u8>) -> Self {
        Self::new(bytes, JPEG_MIME)
    }

    /// Encode as a `data:<mime>;base64,<payload>` URI, the form the
    /// attendance service expects for every image field.
    pub fn data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.bytes))
    }

    /// Parse a base64 data URI back into an image.
    pub fn from_data_uri(uri: &str) -> Result<Self, DataUriError> {
        let rest = uri.trim().strip_prefix("data:").ok_or(DataUriError::MissingScheme)?;
        let (mime, payload) = rest
            .split_once(";base64,")
            .ok_or(DataUriError::NotBase64)?;
        let bytes = STANDARD
            .decode(payload)
            .map_err(|e| DataUriError::InvalidPayload(e.to_string()))?;
        Ok(Self::new(bytes, mime))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DataUriError {
    #[error("missing `data:` scheme")]
    MissingScheme,
    #[error("data URI is not base64-encoded")]
    NotBase64,
    #[error("invalid base64 payload: {0}")]
    InvalidPayload(String),
}

/// Why a single capture attempt produced no image.
///
/// These are recovered by the capture loop; they never abort a session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    #[error("no frame: {0}")]
    NoFrame(String),
    #[error("frame too dark")]
    DarkFrame,
    #[error("encoding failed: {0}")]
    Encode(String),
    #[error("capture timed out after {0:?}")]
    TimedOut(Duration),
    #[error("camera disconnected")]
    Disconnected,
}

/// A device that yields one still image per call.
///
/// Implementations must tolerate repeated calls. The capture controller
/// never issues two calls concurrently against the same source.
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Produce one still image, or explain why none was produced.
    async fn capture(&self) -> Result<CapturedImage, CaptureFailure>;

    /// Whether the source is initialised and able to serve captures.
    fn is_ready(&self) -> bool {
        true
    }
}

#[async_trait]
impl<T: CameraSource + ?Sized> CameraSource for Arc<T> {
    async fn capture(&self) -> Result<CapturedImage, CaptureFailure> {
        (**self).capture().await
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}

#[async_trait]
impl<T: CameraSource + ?Sized> CameraSource for Box<T> {
    async fn capture(&self) -> Result<CapturedImage, CaptureFailure> {
        (**self).capture().await
    }

    fn is_ready(&self) -> bool {
        (**self).is_ready()
    }
}
