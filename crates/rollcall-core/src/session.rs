//! Capture session state: what has been collected, how many attempts were
//! spent, and where the session sits in its lifecycle.

use crate::camera::CapturedImage;
use uuid::Uuid;

/// Lifecycle of a single capture session.
///
/// `Completed`, `Deficient` and `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Idle,
    Capturing,
    /// Exactly `target_count` images were collected.
    Completed,
    /// The attempt budget ran out with fewer than `target_count` images.
    Deficient,
    /// The operator stopped the session before the budget ran out.
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Deficient | Self::Cancelled)
    }
}

/// Snapshot delivered to the progress observer after every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// 1-based index of the attempt that just finished.
    pub attempt: usize,
    pub collected: usize,
    pub target: usize,
}

impl Progress {
    /// `collected / target * 100`, in 0.0–100.0.
    pub fn percent(&self) -> f32 {
        if self.target == 0 {
            return 0.0;
        }
        self.collected as f32 / self.target as f32 * 100.0
    }
}

/// One enrollment attempt: a bounded run of the capture loop.
#[derive(Debug)]
pub struct CaptureSession {
    id: Uuid,
    target_count: usize,
    collected: Vec<CapturedImage>,
    attempts_made: usize,
    status: SessionStatus,
}

impl CaptureSession {
    pub fn new(target_count: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            target_count,
            collected: Vec::with_capacity(target_count),
            attempts_made: 0,
            status: SessionStatus::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn target_count(&self) -> usize {
        self.target_count
    }

    pub fn collected(&self) -> &[CapturedImage] {
        &self.collected
    }

    pub fn attempts_made(&self) -> usize {
        self.attempts_made
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_full(&self) -> bool {
        self.collected.len() >= self.target_count
    }

    /// Idle → Capturing. No-op in any other state.
    pub fn begin(&mut self) {
        if self.status == SessionStatus::Idle {
            self.status = SessionStatus::Capturing;
        }
    }

    /// Count an attempt that yielded `image`. Images beyond the target are
    /// dropped so `collected` never exceeds `target_count`.
    pub fn record_success(&mut self, image: CapturedImage) -> Progress {
        self.attempts_made += 1;
        if !self.is_full() {
            self.collected.push(image);
        }
        self.progress()
    }

    /// Count an attempt that yielded nothing.
    pub fn record_failure(&mut self) -> Progress {
        self.attempts_made += 1;
        self.progress()
    }

    pub fn progress(&self) -> Progress {
        Progress {
            attempt: self.attempts_made,
            collected: self.collected.len(),
            target: self.target_count,
        }
    }

    /// Capturing → Cancelled.
    pub fn cancel(&mut self) {
        if !self.status.is_terminal() {
            self.status = SessionStatus::Cancelled;
        }
    }

    /// Capturing → Completed or Deficient, depending on the image count.
    pub fn finish(&mut self) {
        if self.status.is_terminal() {
            return;
        }
        self.status = if self.collected.len() == self.target_count {
            SessionStatus::Completed
        } else {
            SessionStatus::Deficient
        };
    }

    pub fn into_outcome(self) -> CaptureOutcome {
        CaptureOutcome {
            session_id: self.id,
            images: self.collected,
            attempts: self.attempts_made,
            target_count: self.target_count,
            status: self.status,
        }
    }
}

/// Result of a finished capture session.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub session_id: Uuid,
    /// Captured stills in capture order.
    pub images: Vec<CapturedImage>,
    pub attempts: usize,
    pub target_count: usize,
    pub status: SessionStatus,
}

impl CaptureOutcome {
    pub fn is_complete(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn captured(&self) -> usize {
        self.images.len()
    }
}

/// Session ids are random, so equality covers only what the camera produced.
impl PartialEq for CaptureOutcome {
    fn eq(&self, other: &Self) -> bool {
        self.images == other.images
            && self.attempts == other.attempts
            && self.target_count == other.target_count
            && self.status == other.status
    }
}
