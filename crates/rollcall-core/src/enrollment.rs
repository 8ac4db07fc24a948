//! Handoff of a completed capture session to the registration backend.

use crate::camera::CapturedImage;
use crate::session::{CaptureOutcome, SessionStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a [`Registrar`].
#[derive(Error, Debug)]
#[error("{message}")]
pub struct RegistrationError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl RegistrationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Error, Debug)]
pub enum EnrollmentError {
    #[error("student ID is required")]
    MissingId,
    #[error("student name is required")]
    MissingName,
    #[error("Only captured {captured} images. Please try again.")]
    Deficient { captured: usize, required: usize },
    #[error("capture was cancelled after {captured} images")]
    Cancelled { captured: usize },
    #[error("capture session is still in progress")]
    Incomplete,
    #[error("registration failed: {0}")]
    Registration(#[from] RegistrationError),
}

/// A student ready to be registered with the recognition service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentRecord {
    pub id: String,
    pub name: String,
    pub images: Vec<CapturedImage>,
}

impl StudentRecord {
    /// Package a finished session. Only `Completed` sessions qualify.
    pub fn from_outcome(
        id: &str,
        name: &str,
        outcome: CaptureOutcome,
    ) -> Result<Self, EnrollmentError> {
        let (id, name) = validate_identity(id, name)?;
        match outcome.status {
            SessionStatus::Completed => Ok(Self {
                id,
                name,
                images: outcome.images,
            }),
            SessionStatus::Deficient => Err(EnrollmentError::Deficient {
                captured: outcome.images.len(),
                required: outcome.target_count,
            }),
            SessionStatus::Cancelled => Err(EnrollmentError::Cancelled {
                captured: outcome.images.len(),
            }),
            SessionStatus::Idle | SessionStatus::Capturing => Err(EnrollmentError::Incomplete),
        }
    }
}

/// Trim and check the operator-entered identity fields.
pub fn validate_identity(id: &str, name: &str) -> Result<(String, String), EnrollmentError> {
    let id = id.trim();
    let name = name.trim();
    if id.is_empty() {
        return Err(EnrollmentError::MissingId);
    }
    if name.is_empty() {
        return Err(EnrollmentError::MissingName);
    }
    Ok((id.to_string(), name.to_string()))
}

/// Backend operation that stores a student's face images.
#[async_trait]
pub trait Registrar: Send + Sync {
    /// Register `record`, returning the backend's confirmation message.
    async fn register(&self, record: &StudentRecord) -> Result<String, RegistrationError>;
}

/// Submit `record` exactly once. Retrying is the caller's decision.
pub async fn submit<R>(registrar: &R, record: &StudentRecord) -> Result<String, EnrollmentError>
where
    R: Registrar + ?Sized,
{
    tracing::info!(
        student = %record.id,
        images = record.images.len(),
        "submitting enrollment"
    );
    match registrar.register(record).await {
        Ok(message) => {
            tracing::info!(student = %record.id, %message, "enrollment accepted");
            Ok(message)
        }
        Err(e) => {
            tracing::warn!(student = %record.id, error = %e, "enrollment rejected");
            Err(e.into())
        }
    }
}
