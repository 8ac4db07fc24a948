//! Mock HTTP server tests for ApiClient.

use rollcall_api::{ApiClient, ApiError, Settings};
use rollcall_core::enrollment::{submit, EnrollmentError};
use rollcall_core::{CapturedImage, StudentRecord};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn record() -> StudentRecord {
    StudentRecord {
        id: "S-042".to_string(),
        name: "Ada Lovelace".to_string(),
        images: vec![
            CapturedImage::jpeg(vec![0xff, 0xd8, 0xff]),
            CapturedImage::jpeg(vec![0, 1, 2]),
        ],
    }
}

async fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(format!("{}/api", server.uri())).unwrap()
}

// === Registration ===

#[tokio::test]
async fn test_register_student_posts_data_uris() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-student"))
        .and(body_json(serde_json::json!({
            "student_id": "S-042",
            "name": "Ada Lovelace",
            "images": ["data:image/jpeg;base64,/9j/", "data:image/jpeg;base64,AAEC"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Student registered successfully"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let message = client.register_student(&record()).await.unwrap();
    assert_eq!(message, "Student registered successfully");
}

#[tokio::test]
async fn test_register_student_surfaces_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-student"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "detail": "Missing required registration data"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.register_student(&record()).await.unwrap_err();
    match err {
        ApiError::Server { status, detail } => {
            assert_eq!(status, 400);
            assert_eq!(detail, "Missing required registration data");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_error_without_detail_reports_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-student"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.register_student(&record()).await.unwrap_err();
    assert_eq!(err.to_string(), "Server error: 503");
}

#[tokio::test]
async fn test_register_student_success_false_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-student"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false,
            "message": "No faces found in images"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = client.register_student(&record()).await.unwrap_err();
    assert!(matches!(err, ApiError::Rejected(ref m) if m == "No faces found in images"));
}

#[tokio::test]
async fn test_enrollment_submit_goes_through_registrar_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/register-student"))
        .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({
            "detail": "Failed to register student"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let err = submit(&client, &record()).await.unwrap_err();
    match err {
        EnrollmentError::Registration(e) => assert_eq!(e.message, "Failed to register student"),
        other => panic!("unexpected error: {other:?}"),
    }
}

// === Attendance ===

#[tokio::test]
async fn test_mark_attendance_returns_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mark-attendance"))
        .and(body_json(serde_json::json!({"image": "data:image/jpeg;base64,AAEC"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Attendance processed",
            "data": [{
                "student_id": "S-042", "name": "Ada Lovelace", "date": "2024-03-01",
                "time": "09:15", "status": "Present", "confidence": 42.5
            }]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client
        .mark_attendance(&CapturedImage::jpeg(vec![0, 1, 2]))
        .await
        .unwrap();
    assert_eq!(result.matched_name(), Some("Ada Lovelace"));
    assert_eq!(result.records[0].confidence, Some(42.5));
}

#[tokio::test]
async fn test_mark_attendance_null_data_is_no_match() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/mark-attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "message": "Attendance processed",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let result = client
        .mark_attendance(&CapturedImage::jpeg(vec![1]))
        .await
        .unwrap();
    assert!(result.records.is_empty());
    assert_eq!(result.matched_name(), None);
}

#[tokio::test]
async fn test_attendance_lists_records() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": [
                {"student_id": "S-2", "name": "Grace", "date": "2024-03-02", "time": "10:00", "status": "Present"},
                {"student_id": "S-1", "name": "Ada", "date": "2024-03-01", "time": "09:15", "status": "Absent"}
            ]
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let records = client.attendance().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].is_present());
    assert!(!records[1].is_present());
}

#[tokio::test]
async fn test_attendance_missing_data_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(client.attendance().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/attendance"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(client.attendance().await, Err(ApiError::Decode(_))));
}

// === Dashboard, students, settings ===

#[tokio::test]
async fn test_dashboard_stats() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard-stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {
                "totalStudents": 4,
                "todayAttendance": 1,
                "attendanceRate": 25.0,
                "last7Days": [{"date": "2024-03-01", "count": 1}],
                "recentActivity": []
            }
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let stats = client.dashboard_stats().await.unwrap();
    assert_eq!(stats.total_students, 4);
    assert!((stats.attendance_rate - 25.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn test_students_are_passed_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/students"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true,
            "data": {"S-1": {"name": "Ada"}}
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let students = client.students().await.unwrap();
    assert_eq!(students["S-1"]["name"], "Ada");
}

#[tokio::test]
async fn test_settings_round_trip_through_service() {
    let server = MockServer::start().await;
    let mut settings = Settings::default();
    settings.capture_interval = 10;
    settings.email_address = "office@example.edu".to_string();

    Mock::given(method("GET"))
        .and(path("/api/settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "faceDetectionConfidence": 0.6,
            "backupFrequency": "weekly"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/settings"))
        .and(body_json(serde_json::to_value(&settings).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"success": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let fetched = client.settings().await.unwrap();
    assert!((fetched.face_detection_confidence - 0.6).abs() < f64::EPSILON);
    assert_eq!(fetched.backup_frequency, "weekly");
    assert!(fetched.backup_enabled);

    client.update_settings(&settings).await.unwrap();
}

#[tokio::test]
async fn test_unreachable_service_is_http_error() {
    let client = ApiClient::new("http://127.0.0.1:9").unwrap();
    assert!(matches!(client.attendance().await, Err(ApiError::Http(_))));
}
