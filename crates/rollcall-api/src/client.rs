//! ApiClient - handles communication with the attendance recognition service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rollcall_core::{CapturedImage, Registrar, RegistrationError, StudentRecord};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use thiserror::Error;

use crate::types::{
    AttendanceMatch, AttendanceRecord, DashboardStats, Envelope, ErrorBody, MarkAttendanceRequest,
    RegisterStudentRequest, Settings,
};

/// Default base URL of the attendance service.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Default timeout for HTTP requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connection timeout.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response. `detail` comes from the body when present.
    #[error("{detail}")]
    Server { status: u16, detail: String },

    /// 2xx response whose body reported `success: false`.
    #[error("{0}")]
    Rejected(String),

    #[error("unexpected response body: {0}")]
    Decode(String),
}

/// `GET /settings` may answer with the settings object or wrap it in `data`.
#[derive(Deserialize)]
#[serde(untagged)]
enum SettingsBody {
    Wrapped { data: Settings },
    Bare(Settings),
}

/// Client for the attendance service's JSON API.
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ApiClient {
    /// Create a client for `base_url` with the default timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Register a student with their captured face images.
    ///
    /// Returns the service's confirmation message.
    pub async fn register_student(&self, record: &StudentRecord) -> Result<String, ApiError> {
        let body = RegisterStudentRequest {
            student_id: &record.id,
            name: &record.name,
            images: record.images.iter().map(CapturedImage::data_uri).collect(),
        };
        tracing::debug!(student = %record.id, images = body.images.len(), "POST register-student");

        let response = self
            .http_client
            .post(self.url("register-student"))
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<serde_json::Value> = read_json(response).await?;

        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to register student".to_string()),
            ));
        }
        Ok(envelope
            .message
            .unwrap_or_else(|| "Student registered successfully".to_string()))
    }

    /// Submit one still for recognition.
    ///
    /// An empty match list means no enrolled face was recognized.
    pub async fn mark_attendance(&self, image: &CapturedImage) -> Result<AttendanceMatch, ApiError> {
        let body = MarkAttendanceRequest {
            image: image.data_uri(),
        };
        tracing::debug!(bytes = image.len(), "POST mark-attendance");

        let response = self
            .http_client
            .post(self.url("mark-attendance"))
            .json(&body)
            .send()
            .await?;
        let envelope: Envelope<Vec<AttendanceRecord>> = read_json(response).await?;

        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to mark attendance".to_string()),
            ));
        }
        Ok(AttendanceMatch {
            message: envelope.message,
            records: envelope.data.unwrap_or_default(),
        })
    }

    /// Fetch all attendance records, most recent first.
    pub async fn attendance(&self) -> Result<Vec<AttendanceRecord>, ApiError> {
        let response = self.http_client.get(self.url("attendance")).send().await?;
        let envelope: Envelope<Vec<AttendanceRecord>> = read_json(response).await?;
        Ok(envelope.data.unwrap_or_default())
    }

    /// Fetch enrolled students as the service reports them.
    pub async fn students(&self) -> Result<serde_json::Value, ApiError> {
        let response = self.http_client.get(self.url("students")).send().await?;
        let envelope: Envelope<serde_json::Value> = read_json(response).await?;
        Ok(envelope.data.unwrap_or(serde_json::Value::Null))
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ApiError> {
        let response = self
            .http_client
            .get(self.url("dashboard-stats"))
            .send()
            .await?;
        let envelope: Envelope<DashboardStats> = read_json(response).await?;
        envelope
            .data
            .ok_or_else(|| ApiError::Decode("dashboard stats missing `data`".to_string()))
    }

    pub async fn settings(&self) -> Result<Settings, ApiError> {
        let response = self.http_client.get(self.url("settings")).send().await?;
        Ok(match read_json::<SettingsBody>(response).await? {
            SettingsBody::Wrapped { data } => data,
            SettingsBody::Bare(settings) => settings,
        })
    }

    pub async fn update_settings(&self, settings: &Settings) -> Result<(), ApiError> {
        let response = self
            .http_client
            .post(self.url("settings"))
            .json(settings)
            .send()
            .await?;
        let envelope: Envelope<serde_json::Value> = read_json(response).await?;
        if !envelope.success {
            return Err(ApiError::Rejected(
                envelope
                    .message
                    .unwrap_or_else(|| "Failed to update settings".to_string()),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Registrar for ApiClient {
    async fn register(&self, record: &StudentRecord) -> Result<String, RegistrationError> {
        self.register_student(record)
            .await
            .map_err(|e| RegistrationError::with_source(e.to_string(), e))
    }
}

/// Check the status and decode the body.
///
/// Non-2xx responses become [`ApiError::Server`] carrying the body's
/// `detail`, or `Server error: <status>` when there is none.
async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        let detail = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.detail)
            .unwrap_or_else(|| server_error(status));
        tracing::warn!(status = status.as_u16(), %detail, "attendance service error");
        return Err(ApiError::Server {
            status: status.as_u16(),
            detail,
        });
    }

    serde_json::from_slice(&body).map_err(|e| ApiError::Decode(e.to_string()))
}

fn server_error(status: StatusCode) -> String {
    format!("Server error: {}", status.as_u16())
}
