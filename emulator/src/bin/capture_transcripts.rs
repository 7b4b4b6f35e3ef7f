//! Records scripted emulator sessions as transcripts.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lens_emulator::{LensConfig, Session, SessionOptions};

#[derive(Debug, Parser)]
#[command(about = "Record scripted lens sessions")]
struct Cli {
    /// Directory receiving the transcript files.
    #[arg(long, default_value = "transcripts")]
    out_dir: PathBuf,

    /// Lens configuration file. Defaults to `lens.toml` when present.
    #[arg(long, short)]
    config: Option<PathBuf>,
}

const RIDDLE_RUN: &[&str] = &[
    "help",
    "track on",
    "tick",
    "pose TPOSE",
    "run 1100ms",
    "status",
    "pose ARMS_UP",
    "run 1100ms",
    "pose THIRD_POSE_NO_ARMS",
    "run 1100ms",
    "pose TPOSE",
    "run 1100ms",
    "status",
    "run 4s",
    "status",
    "log",
];

const TRACKING_LOSS: &[&str] = &[
    "track on",
    "tick",
    "pose TPOSE",
    "run 600ms",
    "relax",
    "tick 3",
    "pose TPOSE",
    "run 1100ms",
    "track off",
    "tick",
    "status",
    "track on",
    "tick",
    "status",
];

const MANUAL_CONTROL: &[&str] = &[
    "start",
    "pose ARMS_UP",
    "run 2s",
    "pose CARTWHEEL",
    "reset",
    "start",
    "pose TPOSE",
    "run 500ms",
    "start",
    "status",
    "help track",
];

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = LensConfig::discover(cli.config.as_deref())?;

    record(&config, &cli.out_dir, "riddle_run", RIDDLE_RUN)?;
    record(&config, &cli.out_dir, "tracking_loss", TRACKING_LOSS)?;

    let mut manual = config.clone();
    manual.sequence.use_tracking_triggers = false;
    record(&manual, &cli.out_dir, "manual_control", MANUAL_CONTROL)?;
    Ok(())
}

fn record(config: &LensConfig, out_dir: &Path, name: &str, script: &[&str]) -> Result<()> {
    let path = out_dir.join(format!("{name}.log"));
    let mut session = Session::new(
        config,
        SessionOptions {
            transcript: Some(path.clone()),
            header: format!("Scripted lens session: {name}"),
            styled: false,
        },
    )?;
    for line in script {
        session.handle_command(line)?;
    }
    info!(path = %path.display(), lines = script.len(), "transcript recorded");
    Ok(())
}
