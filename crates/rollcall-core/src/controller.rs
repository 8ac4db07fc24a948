//! Capture session controller: drives a camera through a bounded loop of
//! single-shot captures and reports progress after every attempt.

use crate::camera::{CameraSource, CaptureFailure, CapturedImage};
use crate::session::{CaptureOutcome, CaptureSession, Progress};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Number of stills an enrollment needs by default.
pub const DEFAULT_TARGET_COUNT: usize = 50;

/// Minimum delay between consecutive capture attempts.
pub const DEFAULT_PACING: Duration = Duration::from_millis(100);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error("a capture session is already active on this camera")]
    AlreadyCapturing,
    #[error("camera is not initialized")]
    CameraUnavailable,
    #[error("target image count must be positive")]
    ZeroTarget,
    #[error("attempt budget {max_attempts} is smaller than the target count {target}")]
    AttemptBudget { target: usize, max_attempts: usize },
}

/// How a session acquires its images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturePolicy {
    target_count: usize,
    max_attempts: usize,
    pacing: Duration,
    attempt_timeout: Option<Duration>,
}

impl CapturePolicy {
    /// Policy for `target_count` images with one attempt per image, the
    /// default pacing, and no per-attempt timeout.
    pub fn new(target_count: usize) -> Result<Self, CaptureError> {
        if target_count == 0 {
            return Err(CaptureError::ZeroTarget);
        }
        Ok(Self {
            target_count,
            max_attempts: target_count,
            pacing: DEFAULT_PACING,
            attempt_timeout: None,
        })
    }

    /// Allow more attempts than images, so transient failures can be made up.
    pub fn with_max_attempts(mut self, max_attempts: usize) -> Result<Self, CaptureError> {
        if max_attempts < self.target_count {
            return Err(CaptureError::AttemptBudget {
                target: self.target_count,
                max_attempts,
            });
        }
        self.max_attempts = max_attempts;
        Ok(self)
    }

    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Treat a camera call that takes longer than `timeout` as a failed attempt.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub fn pacing(&self) -> Duration {
        self.pacing
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout
    }
}

/// Owns a camera and runs at most one capture session against it at a time.
pub struct CaptureController<C> {
    camera: C,
    active: AtomicBool,
}

/// Clears the busy flag when a session ends, including when its future is dropped.
struct ActiveGuard<'a>(&'a AtomicBool);

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl<C: CameraSource> CaptureController<C> {
    pub fn new(camera: C) -> Self {
        Self {
            camera,
            active: AtomicBool::new(false),
        }
    }

    pub fn camera(&self) -> &C {
        &self.camera
    }

    pub fn is_capturing(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Run one capture session to a terminal state.
    ///
    /// Individual capture failures are logged and absorbed into the
    /// outcome's image count; only setup problems are returned as errors.
    /// `on_progress` is called once per attempt, in attempt order.
    pub async fn start_capture<F>(
        &self,
        policy: &CapturePolicy,
        cancel: &CancellationToken,
        mut on_progress: F,
    ) -> Result<CaptureOutcome, CaptureError>
    where
        F: FnMut(Progress) + Send,
    {
        if !self.camera.is_ready() {
            return Err(CaptureError::CameraUnavailable);
        }
        let _guard = self.acquire()?;

        let mut session = CaptureSession::new(policy.target_count);
        session.begin();
        tracing::info!(
            session = %session.id(),
            target = policy.target_count,
            max_attempts = policy.max_attempts,
            pacing_ms = policy.pacing.as_millis() as u64,
            "capture session started"
        );

        for attempt in 1..=policy.max_attempts {
            if session.is_full() {
                break;
            }

            if attempt > 1 && !policy.pacing.is_zero() {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        session.cancel();
                        break;
                    }
                    _ = tokio::time::sleep(policy.pacing) => {}
                }
            }

            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.cancel();
                    break;
                }
                r = self.capture_once(policy.attempt_timeout) => r,
            };

            let progress = match result {
                Ok(image) => {
                    tracing::debug!(attempt, bytes = image.len(), "capture attempt succeeded");
                    session.record_success(image)
                }
                Err(failure) => {
                    tracing::warn!(attempt, error = %failure, "capture attempt failed");
                    session.record_failure()
                }
            };
            on_progress(progress);
        }

        session.finish();
        tracing::info!(
            session = %session.id(),
            status = ?session.status(),
            captured = session.collected().len(),
            attempts = session.attempts_made(),
            "capture session finished"
        );

        Ok(session.into_outcome())
    }

    /// Atomically claim the camera for one session.
    fn acquire(&self) -> Result<ActiveGuard<'_>, CaptureError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CaptureError::AlreadyCapturing)?;
        Ok(ActiveGuard(&self.active))
    }

    async fn capture_once(&self, timeout: Option<Duration>) -> Result<CapturedImage, CaptureFailure> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.camera.capture())
                .await
                .unwrap_or(Err(CaptureFailure::TimedOut(limit))),
            None => self.camera.capture().await,
        }
    }
}
