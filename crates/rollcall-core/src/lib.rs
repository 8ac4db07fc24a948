//! rollcall-core — Guided multi-shot face capture for student enrollment.
//!
//! A [`CaptureController`] drives a [`CameraSource`] through a bounded loop
//! of single-shot captures, reporting progress after every attempt, and
//! yields a [`CaptureOutcome`]. Completed outcomes are packaged into a
//! [`StudentRecord`] and handed to a [`Registrar`] exactly once.

pub mod camera;
pub mod controller;
pub mod enrollment;
pub mod session;

pub use camera::{CameraSource, CaptureFailure, CapturedImage};
pub use controller::{CaptureController, CaptureError, CapturePolicy};
pub use enrollment::{EnrollmentError, Registrar, RegistrationError, StudentRecord};
pub use session::{CaptureOutcome, CaptureSession, Progress, SessionStatus};
