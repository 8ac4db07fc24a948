//! Subcommand handlers.

use crate::config::Config;
use crate::{EnrollArgs, SettingsArgs};
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rollcall_api::{ApiClient, AttendanceRecord, Settings};
use rollcall_core::enrollment::{self, validate_identity};
use rollcall_core::{
    CameraSource, CaptureController, CaptureOutcome, CapturedImage, StudentRecord,
};
use rollcall_hw::{spawn_camera_worker, Camera, CameraHandle, WorkerConfig};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::with_timeout(&config.api_url, config.http_timeout())
        .context("failed to build HTTP client")
}

/// Open the camera off the async runtime; warmup frames block.
async fn open_camera(config: WorkerConfig) -> Result<CameraHandle> {
    let device = config.device.clone();
    let handle = tokio::task::spawn_blocking(move || spawn_camera_worker(config))
        .await
        .context("camera setup task failed")?
        .with_context(|| format!("could not open camera {device}"))?;
    Ok(handle)
}

pub async fn enroll(config: &mut Config, args: EnrollArgs) -> Result<()> {
    let (id, name) = validate_identity(&args.id, &args.name)?;
    if let Some(count) = args.count {
        config.required_images = count;
    }
    if let Some(max_attempts) = args.max_attempts {
        config.max_attempts = max_attempts;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.capture_interval_ms = interval_ms;
    }
    let policy = config.capture_policy()?;
    let api = api_client(config)?;

    let camera = open_camera(config.worker_config())
        .await
        .context("Capture could not start")?;
    let controller = CaptureController::new(camera);

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    println!(
        "Capturing {} images for {name} ({id}). Press Ctrl-C to stop.",
        policy.target_count()
    );
    let outcome = controller
        .start_capture(&policy, &cancel, |progress| {
            print!("\rCapturing images: {:>3.0}%", progress.percent());
            let _ = std::io::stdout().flush();
        })
        .await
        .context("Capture could not start")?;

    println!();
    println!(
        "Images captured: {}/{}",
        outcome.captured(),
        outcome.target_count
    );

    if let Some(dir) = &args.save_dir {
        match save_images(dir, &id, &outcome.images) {
            Ok(written) => println!("Saved {} images to {}", written.len(), dir.display()),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = ?e, "could not save images");
                eprintln!("Warning: {e:#}");
            }
        }
    }

    let result = register(&api, &id, &name, outcome, &cancel).await;
    ctrl_c.abort();
    let message = result?;
    println!("{message}");
    Ok(())
}

/// Build the record and submit it, unless Ctrl-C arrives first.
async fn register(
    api: &ApiClient,
    id: &str,
    name: &str,
    outcome: CaptureOutcome,
    cancel: &CancellationToken,
) -> Result<String> {
    let record = StudentRecord::from_outcome(id, name, outcome)?;
    println!("Face images captured successfully!");

    tokio::select! {
        biased;
        _ = cancel.cancelled() => bail!("Registration interrupted"),
        result = enrollment::submit(api, &record) => Ok(result?),
    }
}

pub async fn mark(config: &Config, image: Option<PathBuf>) -> Result<()> {
    let api = api_client(config)?;
    let image = match image {
        Some(path) => load_image(&path)?,
        None => {
            let camera = open_camera(config.worker_config()).await?;
            camera
                .capture()
                .await
                .map_err(|e| anyhow::anyhow!("Failed to capture image: {e}"))?
        }
    };

    let result = api.mark_attendance(&image).await?;
    match result.matched_name() {
        Some(name) => println!("Attendance marked for {name}"),
        None => println!("No face recognized. Please try again."),
    }
    Ok(())
}

pub async fn records(config: &Config, date: Option<NaiveDate>) -> Result<()> {
    let records = api_client(config)?.attendance().await?;
    let records = filter_by_date(records, date);
    if records.is_empty() {
        println!("No attendance records found");
        return Ok(());
    }
    println!(
        "{:<12} {:<24} {:<10} {:<6} {}",
        "STUDENT ID", "NAME", "DATE", "TIME", "STATUS"
    );
    for r in &records {
        println!(
            "{:<12} {:<24} {:<10} {:<6} {}",
            r.student_id, r.name, r.date, r.time, r.status
        );
    }
    Ok(())
}

pub async fn students(config: &Config) -> Result<()> {
    let students = api_client(config)?.students().await?;
    println!("{}", serde_json::to_string_pretty(&students)?);
    Ok(())
}

pub async fn stats(config: &Config) -> Result<()> {
    let stats = api_client(config)?.dashboard_stats().await?;
    println!("Total students:     {}", stats.total_students);
    println!("Today's attendance: {}", stats.today_attendance);
    println!("Attendance rate:    {:.1}%", stats.attendance_rate);
    println!();
    println!("Last 7 days:");
    for day in &stats.last_7_days {
        println!("  {}  {}", day.date, day.count);
    }
    if !stats.recent_activity.is_empty() {
        println!();
        println!("Recent activity:");
        for r in &stats.recent_activity {
            println!("  {} {}  {} ({})", r.date, r.time, r.name, r.status);
        }
    }
    Ok(())
}

pub async fn show_settings(config: &Config) -> Result<()> {
    let settings = api_client(config)?.settings().await?;
    print_settings(&settings);
    Ok(())
}

pub async fn set_settings(config: &Config, args: SettingsArgs) -> Result<()> {
    let api = api_client(config)?;
    let mut settings = api.settings().await?;
    apply_settings(&mut settings, args)?;
    api.update_settings(&settings)
        .await
        .context("Failed to save settings.")?;
    println!("Settings saved successfully!");
    print_settings(&settings);
    Ok(())
}

pub fn devices() {
    let devices = Camera::list_devices();
    if devices.is_empty() {
        println!("No V4L2 capture devices found");
        return;
    }
    for d in devices {
        println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
    }
}

pub async fn test_camera(config: &Config) -> Result<()> {
    println!("Running camera diagnostics on {}...", config.camera_device);
    let camera = open_camera(config.worker_config()).await?;
    let stats = camera.probe().await?;
    println!("Resolution: {}x{}", stats.width, stats.height);
    println!("Format:     {:?}", stats.format);
    println!("Sequence:   {}", stats.sequence);
    println!("Brightness: {:.1}", stats.brightness);
    if stats.is_dark {
        println!("Frame is too dark for enrollment; check lighting or lens cover");
    } else {
        println!("Camera OK");
    }
    Ok(())
}

fn print_settings(s: &Settings) {
    println!("Face detection confidence: {:.2}", s.face_detection_confidence);
    println!("Auto-mark attendance:      {}", s.auto_mark_attendance);
    println!("Capture interval:          {}s", s.capture_interval);
    println!("Notifications:             {}", s.enable_notifications);
    println!("Email notifications:       {}", s.email_notifications);
    println!("Email address:             {}", s.email_address);
    println!("Backups:                   {}", s.backup_enabled);
    println!("Backup frequency:          {}", s.backup_frequency);
}

fn apply_settings(settings: &mut Settings, args: SettingsArgs) -> Result<()> {
    if let Some(c) = args.confidence {
        if !(0.0..=1.0).contains(&c) {
            bail!("confidence must be between 0.0 and 1.0");
        }
        settings.face_detection_confidence = c;
    }
    if let Some(v) = args.auto_mark {
        settings.auto_mark_attendance = v;
    }
    if let Some(v) = args.capture_interval {
        settings.capture_interval = v;
    }
    if let Some(v) = args.notifications {
        settings.enable_notifications = v;
    }
    if let Some(v) = args.email_notifications {
        settings.email_notifications = v;
    }
    if let Some(v) = args.email {
        settings.email_address = v;
    }
    if let Some(v) = args.backup {
        settings.backup_enabled = v;
    }
    if let Some(v) = args.backup_frequency {
        if !matches!(v.as_str(), "daily" | "weekly" | "monthly") {
            bail!("backup frequency must be daily, weekly or monthly");
        }
        settings.backup_frequency = v;
    }
    Ok(())
}

fn filter_by_date(records: Vec<AttendanceRecord>, date: Option<NaiveDate>) -> Vec<AttendanceRecord> {
    let Some(date) = date else {
        return records;
    };
    let wanted = date.format("%Y-%m-%d").to_string();
    records.into_iter().filter(|r| r.date == wanted).collect()
}

/// Read a still from disk: either a data URI or raw JPEG bytes.
fn load_image(path: &Path) -> Result<CapturedImage> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if bytes.starts_with(b"data:") {
        let text = String::from_utf8(bytes).context("data URI is not UTF-8")?;
        return CapturedImage::from_data_uri(&text)
            .with_context(|| format!("invalid data URI in {}", path.display()));
    }
    if !bytes.starts_with(&[0xFF, 0xD8]) {
        bail!("{} is neither a JPEG nor a data URI", path.display());
    }
    Ok(CapturedImage::jpeg(bytes))
}

/// Write stills as `<id>_NNN.jpg`, numbered from 1 in capture order.
fn save_images(dir: &Path, id: &str, images: &[CapturedImage]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
    let stem = file_stem(id);
    let mut written = Vec::with_capacity(images.len());
    for (i, image) in images.iter().enumerate() {
        let path = dir.join(format!("{stem}_{:03}.jpg", i + 1));
        std::fs::write(&path, &image.bytes)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

/// Student ID reduced to characters that are safe in a single path component.
fn file_stem(id: &str) -> String {
    id.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::SessionStatus;

    fn record(date: &str) -> AttendanceRecord {
        AttendanceRecord {
            student_id: "S-1".into(),
            name: "Ada".into(),
            date: date.into(),
            time: "09:00".into(),
            status: "Present".into(),
            confidence: None,
        }
    }

    #[test]
    fn test_filter_by_date() {
        let records = vec![record("2024-03-01"), record("2024-03-02")];
        let day = NaiveDate::from_ymd_opt(2024, 3, 2);
        let filtered = filter_by_date(records.clone(), day);
        assert_eq!(filtered, vec![record("2024-03-02")]);
        assert_eq!(filter_by_date(records, None).len(), 2);
    }

    #[test]
    fn test_apply_settings_changes_only_given_fields() {
        let mut settings = Settings::default();
        apply_settings(
            &mut settings,
            SettingsArgs {
                capture_interval: Some(12),
                backup_frequency: Some("weekly".into()),
                ..SettingsArgs::default()
            },
        )
        .unwrap();
        assert_eq!(settings.capture_interval, 12);
        assert_eq!(settings.backup_frequency, "weekly");
        assert!(settings.auto_mark_attendance);
    }

    #[test]
    fn test_apply_settings_rejects_bad_values() {
        let mut settings = Settings::default();
        let bad_confidence = SettingsArgs {
            confidence: Some(1.5),
            ..SettingsArgs::default()
        };
        assert!(apply_settings(&mut settings, bad_confidence).is_err());
        let bad_frequency = SettingsArgs {
            backup_frequency: Some("hourly".into()),
            ..SettingsArgs::default()
        };
        assert!(apply_settings(&mut settings, bad_frequency).is_err());
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_image_accepts_jpeg_and_data_uri() {
        let dir = tempfile::tempdir().unwrap();
        let jpeg = dir.path().join("face.jpg");
        std::fs::write(&jpeg, [0xFF, 0xD8, 0xFF, 0xD9]).unwrap();
        assert_eq!(load_image(&jpeg).unwrap().bytes, vec![0xFF, 0xD8, 0xFF, 0xD9]);

        let uri = dir.path().join("face.txt");
        std::fs::write(&uri, "data:image/jpeg;base64,AAEC").unwrap();
        assert_eq!(load_image(&uri).unwrap().bytes, vec![0, 1, 2]);

        let junk = dir.path().join("notes.txt");
        std::fs::write(&junk, "hello").unwrap();
        assert!(load_image(&junk).is_err());
    }

    #[test]
    fn test_save_images_numbers_in_capture_order() {
        let dir = tempfile::tempdir().unwrap();
        let images = vec![CapturedImage::jpeg(vec![1]), CapturedImage::jpeg(vec![2])];
        let written = save_images(&dir.path().join("out"), "S-1", &images).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written[0].ends_with("S-1_001.jpg"));
        assert_eq!(std::fs::read(&written[1]).unwrap(), vec![2]);
    }

    #[test]
    fn test_save_images_keeps_slashed_ids_inside_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let images = vec![CapturedImage::jpeg(vec![7])];

        let written = save_images(&out, "CS/2024/01", &images).unwrap();
        assert_eq!(written, vec![out.join("CS_2024_01_001.jpg")]);
        assert_eq!(std::fs::read(&written[0]).unwrap(), vec![7]);

        let written = save_images(&out, "../escaped", &images).unwrap();
        assert_eq!(written, vec![out.join("___escaped_001.jpg")]);
        assert!(!dir.path().join("escaped_001.jpg").exists());
    }

    #[tokio::test]
    async fn test_register_stops_when_interrupted() {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let outcome = completed_outcome();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = register(&api, "S-1", "Ada", outcome, &cancel)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Registration interrupted");
    }

    #[tokio::test]
    async fn test_register_refuses_deficient_batch() {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let mut outcome = completed_outcome();
        outcome.images.pop();
        outcome.status = SessionStatus::Deficient;

        let err = register(&api, "S-1", "Ada", outcome, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("Only captured 1 images"));
    }

    fn completed_outcome() -> CaptureOutcome {
        CaptureOutcome {
            session_id: uuid::Uuid::new_v4(),
            images: vec![CapturedImage::jpeg(vec![1]), CapturedImage::jpeg(vec![2])],
            attempts: 2,
            target_count: 2,
            status: SessionStatus::Completed,
        }
    }
}
