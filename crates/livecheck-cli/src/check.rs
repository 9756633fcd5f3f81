//! `livecheck check`: run a full liveness session from a landmark recording.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use livecheck_core::DetectorError;
use livecheck_hw::StillImageCamera;
use livecheck_session::{start_session, Config, SessionStatus};

use crate::replay::RecordedLandmarks;

#[derive(clap::Args)]
pub struct Args {
    /// JSON Lines landmark recording, one detection (or `null`) per line
    #[arg(long)]
    recording: PathBuf,
    /// Image served as the camera frame (default: blank 640x480)
    #[arg(long)]
    frame: Option<PathBuf>,
    /// Poll interval in milliseconds (default: $LIVECHECK_POLL_INTERVAL_MS or 200)
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Where to write the captured selfie
    #[arg(long, default_value = "selfie.jpg")]
    selfie_out: PathBuf,
    /// Verify model assets in this directory before starting
    #[arg(long)]
    model_dir: Option<PathBuf>,
    /// Give up after this many seconds
    #[arg(long)]
    max_secs: Option<u64>,
}

pub async fn run(args: Args, config: &Config) -> Result<()> {
    let mut session_config = config.session.clone();
    if let Some(ms) = args.interval_ms {
        session_config.poll_interval = Duration::from_millis(ms);
    }

    let mut camera = match &args.frame {
        Some(path) => StillImageCamera::open(path)
            .with_context(|| format!("failed to open frame image {}", path.display()))?,
        None => StillImageCamera::blank(640, 480),
    };

    let model_dir = args.model_dir.clone();
    let recording = args.recording.clone();
    let load_source = move || -> Result<RecordedLandmarks, DetectorError> {
        if let Some(dir) = &model_dir {
            livecheck_models::verify_models_dir(dir)
                .map_err(|e| DetectorError::ModelUnavailable(e.to_string()))?;
        }
        RecordedLandmarks::load(&recording)
    };

    let handle = start_session(&session_config, &mut camera, load_source)
        .context("liveness session could not start")?;
    println!("session {} started", handle.id());

    let mut status = handle.status();
    let printer = tokio::spawn({
        let mut status = status.clone();
        async move {
            loop {
                let current = status.borrow_and_update().clone();
                println!("  {current}");
                if current.is_terminal() || status.changed().await.is_err() {
                    break;
                }
            }
        }
    });

    let deadline = async {
        match args.max_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending().await,
        }
    };

    let outcome = tokio::select! {
        result = handle.verified() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
        _ = deadline => None,
    };

    let result = match outcome {
        Some(result) => result?,
        None => {
            // The handle was dropped with the select; wait for the camera to go.
            let _ = status.wait_for(SessionStatus::is_terminal).await;
            printer.await.ok();
            bail!("session cancelled before verification");
        }
    };
    printer.await.ok();

    let selfie = result
        .captured_frame
        .context("verified session produced no selfie")?;
    std::fs::write(&args.selfie_out, &selfie.jpeg)
        .with_context(|| format!("failed to write {}", args.selfie_out.display()))?;
    println!(
        "verified at {}; selfie {}x{} written to {}",
        result.captured_at.to_rfc3339(),
        selfie.width,
        selfie.height,
        args.selfie_out.display()
    );
    Ok(())
}
