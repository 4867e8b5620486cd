use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use moodlog_core::{
    DetectorError, EmotionCounts, EventLog, FaceDetector, FaceEmotionAnalyzer, FerPlusClassifier,
    Report, Timeline,
};
use moodlog_hw::Camera;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

mod config;
mod dashboard;
mod session;

use config::Config;
use session::{SessionEnd, SessionOptions};

#[derive(Parser)]
#[command(name = "moodlog", about = "Webcam facial emotion logger")]
struct Cli {
    /// Event log CSV file (overrides MOODLOG_LOG_PATH)
    #[arg(long, global = true)]
    log: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the event log if it does not exist yet
    Init,
    /// Capture from the webcam and log the dominant emotion of each frame
    Capture {
        /// Clear old data before starting
        #[arg(long)]
        fresh: bool,
        /// Stop after this many frames
        #[arg(long)]
        max_frames: Option<usize>,
        /// V4L2 device path (overrides MOODLOG_CAMERA_DEVICE)
        #[arg(long)]
        device: Option<String>,
    },
    /// Discard all logged emotions
    Reset,
    /// Show emotion statistics
    Stats {
        /// Print machine-readable JSON instead of charts
        #[arg(long)]
        json: bool,
    },
    /// Write a summary report
    Export {
        #[arg(short, long, default_value = "emotion_report.txt")]
        out: PathBuf,
    },
    /// Copy the raw event log CSV
    Download {
        #[arg(short, long, default_value = "emotion_data.csv")]
        out: PathBuf,
    },
    /// List video capture devices
    Devices,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(path) = cli.log {
        config.log_path = path;
    }

    let log = EventLog::new(&config.log_path);
    log.initialize()
        .with_context(|| format!("cannot initialize {}", config.log_path.display()))?;

    match cli.command {
        Commands::Init => {
            println!("Event log ready: {}", log.path().display());
        }
        Commands::Capture {
            fresh,
            max_frames,
            device,
        } => {
            if let Some(device) = device {
                config.camera_device = device;
            }
            if fresh {
                log.reset()?;
                println!("Old data cleared before starting webcam.");
            }
            capture(config, log, max_frames).await?;
        }
        Commands::Reset => {
            log.reset()?;
            println!("Emotion data cleared.");
        }
        Commands::Stats { json } => show_stats(&log, json)?,
        Commands::Export { out } => {
            let events = log.read_all()?;
            match Report::build(&events, chrono::Local::now().naive_local()) {
                Some(report) => {
                    report
                        .write_to(&out)
                        .with_context(|| format!("cannot write {}", out.display()))?;
                    println!("Report written to {}", out.display());
                }
                None => println!("No data to generate report."),
            }
        }
        Commands::Download { out } => {
            std::fs::write(&out, log.raw_bytes()?)
                .with_context(|| format!("cannot write {}", out.display()))?;
            println!("Event log copied to {}", out.display());
        }
        Commands::Devices => {
            let devices = Camera::list_devices();
            if devices.is_empty() {
                println!("No video capture devices found");
            }
            for d in devices {
                println!("{}  {} ({}, {})", d.path, d.name, d.driver, d.bus);
            }
        }
    }

    Ok(())
}

/// Run one capture session on a blocking thread until Ctrl-C or the loop ends.
async fn capture(config: Config, log: EventLog, max_frames: Option<usize>) -> Result<()> {
    let stop = Arc::new(AtomicBool::new(false));
    let opts = SessionOptions {
        skip_dark_frames: config.skip_dark_frames,
        max_frames,
    };

    let mut worker = tokio::task::spawn_blocking({
        let stop = stop.clone();
        move || -> Result<session::SessionSummary> {
            let model_path = config.classifier_model_path();
            let classifier = FerPlusClassifier::load(&model_path)
                .with_context(|| format!("cannot load emotion model {model_path}"))?;
            let mut analyzer = FaceEmotionAnalyzer::new(load_detector(&config)?, classifier);

            let camera = Camera::open(&config.camera_device).context("could not access webcam")?;
            camera.discard_frames(config.warmup_frames);
            println!("Webcam started. Move into frame... (Ctrl-C to stop)");

            Ok(session::run(camera, &mut analyzer, &log, &stop, &opts))
        }
    });

    let joined = tokio::select! {
        res = &mut worker => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("stop requested");
            stop.store(true, Ordering::Relaxed);
            worker.await
        }
    };
    let summary = joined.context("capture thread panicked")??;

    match &summary.end {
        SessionEnd::Stopped => println!("Webcam stopped."),
        SessionEnd::FrameLimit => println!("Frame limit reached."),
        SessionEnd::FrameReadFailure(e) => println!("Could not read from webcam: {e}"),
    }
    println!(
        "{} frames, {} emotions logged, {} skipped, {} write failures",
        summary.frames, summary.logged, summary.skipped, summary.write_failures
    );
    Ok(())
}

/// Load the face detector. A missing model file means centre-crop classification.
fn load_detector(config: &Config) -> Result<Option<FaceDetector>> {
    let path = config.detector_model_path();
    match FaceDetector::load(&path) {
        Ok(detector) => Ok(Some(detector)),
        Err(DetectorError::ModelNotFound(path)) => {
            tracing::warn!(path = %path, "face detector model not found, classifying frame centre");
            Ok(None)
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("cannot load face detector {path}"))),
    }
}

fn show_stats(log: &EventLog, json: bool) -> Result<()> {
    let events = log.read_all()?;
    let counts = EmotionCounts::from_events(&events);
    let timeline = Timeline::from_events(&events);

    if json {
        let out = serde_json::json!({
            "total": counts.total(),
            "counts": counts,
            "timeline": timeline,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if events.is_empty() {
        println!("No data yet.");
        return Ok(());
    }

    println!("Emotion Statistics ({} events)\n", counts.total());
    print!("{}", dashboard::render_bars(&counts));
    println!("\nShare");
    print!("{}", dashboard::render_shares(&counts));
    println!("\nTimeline");
    print!("{}", dashboard::render_timeline(&timeline));
    Ok(())
}
