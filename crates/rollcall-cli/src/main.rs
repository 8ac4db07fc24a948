use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "rollcall", about = "Face-recognition attendance console")]
struct Cli {
    /// Attendance service base URL (overrides ROLLCALL_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// V4L2 camera device (overrides ROLLCALL_CAMERA_DEVICE)
    #[arg(long, global = true)]
    device: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Capture face images for a new student and register them
    Enroll(EnrollArgs),
    /// Capture one image and mark attendance for whoever is recognized
    Mark {
        /// Submit a stored JPEG or data-URI file instead of using the camera
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// List attendance records
    Records {
        /// Only today's records
        #[arg(long, conflicts_with = "date")]
        today: bool,
        /// Only records for this date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List enrolled students
    Students,
    /// Show dashboard statistics
    Stats,
    /// Show or change console settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// List V4L2 capture devices
    Devices,
    /// Run camera diagnostics
    Test,
}

#[derive(Args)]
pub struct EnrollArgs {
    /// Student ID
    #[arg(long)]
    pub id: String,
    /// Student name
    #[arg(long)]
    pub name: String,
    /// Number of face images to capture
    #[arg(long)]
    pub count: Option<usize>,
    /// Capture attempts allowed (defaults to one per image)
    #[arg(long)]
    pub max_attempts: Option<usize>,
    /// Delay between captures in milliseconds
    #[arg(long)]
    pub interval_ms: Option<u64>,
    /// Also write the captured JPEGs to this directory
    #[arg(long)]
    pub save_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    /// Print the current settings
    Show,
    /// Change one or more settings
    Set(SettingsArgs),
}

#[derive(Args, Default)]
pub struct SettingsArgs {
    /// Face detection confidence threshold (0.0–1.0)
    #[arg(long)]
    pub confidence: Option<f64>,
    #[arg(long)]
    pub auto_mark: Option<bool>,
    /// Seconds between automatic captures
    #[arg(long)]
    pub capture_interval: Option<u32>,
    #[arg(long)]
    pub notifications: Option<bool>,
    #[arg(long)]
    pub email_notifications: Option<bool>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub backup: Option<bool>,
    /// daily, weekly or monthly
    #[arg(long)]
    pub backup_frequency: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(url) = cli.api_url {
        config.api_url = url;
    }
    if let Some(device) = cli.device {
        config.camera_device = device;
    }

    match cli.command {
        Commands::Enroll(args) => commands::enroll(&mut config, args).await,
        Commands::Mark { image } => commands::mark(&config, image).await,
        Commands::Records { today, date } => {
            let date = if today {
                Some(chrono::Local::now().date_naive())
            } else {
                date
            };
            commands::records(&config, date).await
        }
        Commands::Students => commands::students(&config).await,
        Commands::Stats => commands::stats(&config).await,
        Commands::Settings { command } => match command {
            SettingsCommand::Show => commands::show_settings(&config).await,
            SettingsCommand::Set(args) => commands::set_settings(&config, args).await,
        },
        Commands::Devices => {
            commands::devices();
            Ok(())
        }
        Commands::Test => commands::test_camera(&config).await,
    }
}
