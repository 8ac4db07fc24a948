//! Request and response bodies of the attendance service.

use serde::{Deserialize, Serialize};

/// Body of `POST /register-student`.
#[derive(Debug, Serialize)]
pub(crate) struct RegisterStudentRequest<'a> {
    pub student_id: &'a str,
    pub name: &'a str,
    /// Base64 data URIs, in capture order.
    pub images: Vec<String>,
}

/// Body of `POST /mark-attendance`.
#[derive(Debug, Serialize)]
pub(crate) struct MarkAttendanceRequest {
    pub image: String,
}

/// Common `{success, message, data}` envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<T>,
}

fn default_success() -> bool {
    true
}

/// Error body attached to non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub detail: Option<String>,
}

/// One attendance entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub student_id: String,
    pub name: String,
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl AttendanceRecord {
    pub fn is_present(&self) -> bool {
        self.status == "Present"
    }
}

/// Result of submitting one still for recognition.
#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceMatch {
    pub message: Option<String>,
    /// Students newly marked present. Empty when no face was recognized.
    pub records: Vec<AttendanceRecord>,
}

impl AttendanceMatch {
    /// Name of the first recognized student, if any.
    pub fn matched_name(&self) -> Option<&str> {
        self.records.first().map(|r| r.name.as_str())
    }
}

/// Attendance count for one day of the dashboard chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: String,
    pub count: u32,
}

/// Body of `GET /dashboard-stats`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardStats {
    pub total_students: u32,
    pub today_attendance: u32,
    /// Percentage of enrolled students present today, one decimal.
    pub attendance_rate: f64,
    #[serde(rename = "last7Days")]
    pub last_7_days: Vec<DailyCount>,
    pub recent_activity: Vec<AttendanceRecord>,
}

/// Console settings stored by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub face_detection_confidence: f64,
    pub enable_notifications: bool,
    pub auto_mark_attendance: bool,
    /// Seconds between automatic captures.
    pub capture_interval: u32,
    pub email_notifications: bool,
    pub email_address: String,
    pub backup_enabled: bool,
    pub backup_frequency: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            face_detection_confidence: 0.8,
            enable_notifications: true,
            auto_mark_attendance: true,
            capture_interval: 5,
            email_notifications: true,
            email_address: String::new(),
            backup_enabled: true,
            backup_frequency: "daily".to_string(),
        }
    }
}
