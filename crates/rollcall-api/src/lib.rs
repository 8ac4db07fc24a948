//! rollcall-api — Client for the attendance recognition service.
//!
//! The service does the face detection and matching; this crate only
//! speaks its JSON contract.

pub mod client;
pub mod types;

pub use client::{ApiClient, ApiError, DEFAULT_BASE_URL};
pub use types::{AttendanceMatch, AttendanceRecord, DailyCount, DashboardStats, Settings};
