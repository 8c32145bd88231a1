//! Screenreel - record the screen at a fixed frame rate and send the video
//! to a Telegram chat.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

use screenreel::config::Config;
use screenreel::journal::SessionJournal;
use screenreel::region::RegionSpec;
use screenreel::session::{RecordingSession, SessionOptions, SessionOutcome};
use screenreel::upload::{format_caption, TelegramSink, UploadReceipt};

/// Application version.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record the screen and deliver the video to Telegram.
#[derive(Parser, Debug)]
#[command(name = "screenreel")]
#[command(version = VERSION)]
#[command(about = "Record the screen at a fixed frame rate and send the video to Telegram")]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Recording duration in seconds
    #[arg(short = 'd', long, value_name = "SECONDS")]
    duration: Option<i64>,

    /// Target frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<i64>,

    /// Video quality (0-100)
    #[arg(short = 'q', long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// Capture area as four integers: x y width height
    #[arg(long, num_args = 4, value_names = ["X", "Y", "WIDTH", "HEIGHT"])]
    area: Option<Vec<i32>>,

    /// Keep the local video file after a successful upload
    #[arg(long)]
    keep: bool,

    /// Directory to write recordings into
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Destination chat ID (overrides config)
    #[arg(long, value_name = "CHAT_ID")]
    chat_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    apply_cli_overrides(&mut config, &cli);

    init_tracing(&config.logging.level)?;
    config.validate()?;

    info!("Starting screenreel v{}", VERSION);

    let options = SessionOptions {
        duration_seconds: config.recording.duration_seconds,
        fps: config.recording.fps,
        quality: config.recording.quality,
        region: config.recording.region,
        output_dir: config.output.dir.clone(),
    };
    let session = RecordingSession::new(options).context("Invalid recording parameters")?;

    let mut journal = SessionJournal::create(&config.output.dir)
        .context("Failed to open the session journal")?;
    journal.log_session_start(VERSION)?;

    // Ctrl-C requests a stop; the scheduler honors it at the next tick
    // boundary and the session finalizes whatever was written.
    let cancel = Arc::new(AtomicBool::new(false));
    let cancel_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Stop requested; finishing at the next frame boundary");
            cancel_signal.store(true, Ordering::SeqCst);
        }
    });

    // The capture loop is synchronous and timing-sensitive; run it off the
    // async threads.
    let cancel_loop = cancel.clone();
    let outcome = tokio::task::spawn_blocking(move || record(session, cancel_loop))
        .await
        .context("Recording task panicked")??;

    journal.log_recording_finished(&outcome.stats, outcome.short_recording)?;

    let caption = format_caption(
        &outcome.stats,
        outcome.region.width,
        outcome.region.height,
    );
    let sink = TelegramSink::new(&config.telegram);

    info!("Uploading {} to Telegram...", outcome.video_path.display());
    let receipt = match sink.upload(&outcome.video_path, &caption).await {
        Ok(receipt) => receipt,
        Err(e) => {
            error!("Upload failed: {e}; the local file is kept at {}", outcome.video_path.display());
            journal.log_upload_result(&UploadReceipt::failed(e.to_string()))?;
            return Err(e.into());
        }
    };
    journal.log_upload_result(&receipt)?;

    if receipt.ok {
        info!(
            "Video delivered in {} ms ({})",
            receipt.upload_duration_ms, receipt.diagnostic
        );
        cleanup(&outcome, config.recording.keep_local)?;
    } else {
        error!(
            "Telegram rejected the video: {}; the local file is kept at {}",
            receipt.diagnostic,
            outcome.video_path.display()
        );
        anyhow::bail!("upload rejected: {}", receipt.diagnostic);
    }

    Ok(())
}

/// Run one recording session against the platform frame source.
#[cfg(target_os = "linux")]
fn record(session: RecordingSession, cancel: Arc<AtomicBool>) -> Result<SessionOutcome> {
    use screenreel::capture::X11FrameSource;

    let display_bounds = X11FrameSource::primary_display_bounds()?;
    info!(
        "Primary display: {}x{}",
        display_bounds.width, display_bounds.height
    );

    let outcome = session.record(
        display_bounds,
        |region| X11FrameSource::connect(*region),
        &cancel,
        |progress| {
            info!(
                "Recording: {}% ({}/{} frames)",
                progress.percent, progress.frames_recorded, progress.target_frames
            );
        },
    )?;
    Ok(outcome)
}

#[cfg(not(target_os = "linux"))]
fn record(_session: RecordingSession, _cancel: Arc<AtomicBool>) -> Result<SessionOutcome> {
    anyhow::bail!("screen capture is only implemented for X11 on Linux")
}

/// Delete the local file after a successful upload unless asked to keep it.
fn cleanup(outcome: &SessionOutcome, keep_local: bool) -> Result<()> {
    if keep_local {
        info!("Local video kept at {}", outcome.video_path.display());
        return Ok(());
    }
    std::fs::remove_file(&outcome.video_path)
        .with_context(|| format!("Failed to delete {}", outcome.video_path.display()))?;
    info!("Local video deleted: {}", outcome.video_path.display());
    Ok(())
}

/// Fold CLI flags over the loaded configuration.
fn apply_cli_overrides(config: &mut Config, cli: &Cli) {
    if let Some(duration) = cli.duration {
        config.recording.duration_seconds = duration;
    }
    if let Some(fps) = cli.fps {
        config.recording.fps = fps;
    }
    if let Some(quality) = cli.quality {
        config.recording.quality = quality;
    }
    if let Some(area) = &cli.area {
        if let [x, y, width, height] = area[..] {
            config.recording.region = Some(RegionSpec {
                x,
                y,
                width,
                height,
            });
        }
    }
    if cli.keep {
        config.recording.keep_local = true;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(chat_id) = &cli.chat_id {
        config.telegram.chat_id = chat_id.clone();
    }
}

/// Initialize tracing subscriber with the given log level.
fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
