use std::io::{self, BufRead, IsTerminal, Write};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lens_emulator::{LensConfig, Session, SessionOptions};

/// Terminal emulator for the pose sequence lens.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Lens configuration file. Defaults to `lens.toml` when present.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Also write the session to this transcript file.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Override the simulated frame rate.
    #[arg(long)]
    frame_rate: Option<u32>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = LensConfig::discover(cli.config.as_deref())?;
    if let Some(frame_rate) = cli.frame_rate {
        config.frame_rate = frame_rate;
    }

    let stdout = io::stdout();
    let styled = stdout.is_terminal();
    let mut session = Session::new(
        &config,
        SessionOptions {
            transcript: cli.transcript,
            header: "Interactive lens emulator session".to_string(),
            styled,
        },
    )?;

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();
    let mut line = String::new();

    writeln!(
        writer,
        "Pose Sequence Lens Emulator ready. Type `help` for commands or `exit` to quit."
    )?;

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        for response in session.handle_command(trimmed)? {
            writeln!(writer, "{response}")?;
        }
    }

    Ok(())
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}
