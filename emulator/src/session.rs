use std::fmt::Write as _;
use std::fs::{self, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use sequence_core::controller::{PoseSequenceController, SequenceView};
use sequence_core::input::PoseLibrary;
use sequence_core::repl::catalog;
use sequence_core::repl::grammar::{self, Command, HelpCommand};
use sequence_core::repl::status::StatusFormatter;
use sequence_core::sequence::RestartPolicy;
use sequence_core::subscribers::SubscriberContext;
use sequence_core::triggers::{Trigger, TriggerBus, TriggerCatalog};

use crate::config::LensConfig;
use crate::scene::Scene;

/// Pose library standing in for the lens body tracker.
///
/// Knows a fixed list of pose ids; the host decides which one the body is
/// striking.
#[derive(Debug)]
pub struct SimulatedBody {
    known: Vec<String>,
    striking: Option<String>,
}

impl SimulatedBody {
    #[must_use]
    pub fn new(known: Vec<String>) -> Self {
        Self {
            known,
            striking: None,
        }
    }

    #[must_use]
    pub fn knows(&self, pose: &str) -> bool {
        self.known.iter().any(|known| known == pose)
    }

    #[must_use]
    pub fn striking(&self) -> Option<&str> {
        self.striking.as_deref()
    }
}

impl PoseLibrary for SimulatedBody {
    type Pose = String;

    fn lookup_pose_frames(&self, ids: &[&str]) -> Vec<String> {
        ids.iter()
            .filter(|id| self.knows(id))
            .map(|id| (*id).to_string())
            .collect()
    }

    fn matches_pose(&mut self, pose: &String, _threshold: f32) -> bool {
        self.striking.as_ref() == Some(pose)
    }
}

#[derive(Clone, Debug, Default)]
pub struct SessionOptions {
    /// File receiving every host and emulator line.
    pub transcript: Option<PathBuf>,
    pub header: String,
    /// Colour the progress bar.
    pub styled: bool,
}

/// One emulated lens run: controller, scene and simulated inputs.
pub struct Session {
    bus: Rc<TriggerBus>,
    controller: PoseSequenceController<SimulatedBody>,
    scene: Scene,
    tracking: bool,
    tracking_triggers: Option<(Trigger, Trigger)>,
    frame: Duration,
    elapsed: Duration,
    frames: u64,
    styled: bool,
    transcript: Option<TranscriptLogger>,
}

impl Session {
    /// Builds the bus, the controller and the scene described by `config`.
    ///
    /// A controller configuration fault does not fail the session: the
    /// controller stays disabled and `status` reports why.
    ///
    /// # Errors
    ///
    /// Fails when the configuration cannot be converted or the transcript
    /// file cannot be created.
    pub fn new(config: &LensConfig, options: SessionOptions) -> Result<Self> {
        let sequence = config.sequence_config()?;
        let bus = Rc::new(TriggerBus::new(TriggerCatalog::for_sequence(&sequence)));
        let controller = PoseSequenceController::new(
            &sequence,
            SimulatedBody::new(config.library.poses.clone()),
            Rc::clone(&bus),
        );
        let context =
            SubscriberContext::new(Rc::clone(&bus), controller.monitor(), &sequence.lifecycle)
                .context("resolving lifecycle triggers")?;
        let scene = Scene::attach(&context, config);

        let tracking_triggers = match &sequence.tracking_triggers {
            Some(triggers) => Some((bus.resolve(&triggers.started)?, bus.resolve(&triggers.lost)?)),
            None => None,
        };

        let transcript = options
            .transcript
            .as_deref()
            .map(|path| TranscriptLogger::create(path, &options.header))
            .transpose()?;

        info!(
            poses = controller.pose_count(),
            enabled = controller.is_enabled(),
            frame_ms = config.frame_interval().as_millis(),
            "lens session ready"
        );

        Ok(Self {
            bus,
            controller,
            scene,
            tracking: false,
            tracking_triggers,
            frame: config.frame_interval(),
            elapsed: Duration::ZERO,
            frames: 0,
            styled: options.styled,
            transcript,
        })
    }

    #[must_use]
    pub fn controller(&self) -> &PoseSequenceController<SimulatedBody> {
        &self.controller
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Simulated time since the session started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Parses and runs one REPL line, returning the response lines.
    ///
    /// # Errors
    ///
    /// Fails only when the transcript cannot be written.
    pub fn handle_command(&mut self, line: &str) -> Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.record(TranscriptRole::Host, &[trimmed.to_string()])?;
        let lines = match grammar::parse(trimmed) {
            Ok(command) => self.execute(&command)?,
            Err(err) => vec![format!("ERR syntax {err}")],
        };
        self.record(TranscriptRole::Emulator, &lines)?;
        Ok(lines)
    }

    fn execute(&mut self, command: &Command<'_>) -> Result<Vec<String>> {
        debug!(?command, "execute");
        let lines = match command {
            Command::Start => self.start(),
            Command::Reset => self.reset(),
            Command::Track(present) => self.set_tracking(*present),
            Command::Pose(pose) => self.strike(pose),
            Command::Relax => {
                self.controller.library_mut().striking = None;
                vec!["OK relax".to_string()]
            }
            Command::Tick(count) => self.advance(*count),
            Command::Run(duration) => self.advance(self.frames_covering(*duration)),
            Command::Status => self.status()?,
            Command::Log => self.log(),
            Command::Help(help) => help_lines(help),
        };
        Ok(lines)
    }

    fn start(&mut self) -> Vec<String> {
        let before = self.bus.published();
        if self.controller.start_sequence() {
            let mut lines = vec!["OK start".to_string()];
            lines.extend(self.trigger_lines(before));
            return lines;
        }
        let reason = match self.controller.fault() {
            Some(fault) => format!("controller disabled ({fault})"),
            None if self.controller.restart_policy() == RestartPolicy::RequireReset => {
                "reset required".to_string()
            }
            None => "not ready".to_string(),
        };
        vec![format!("ERR start refused: {reason}")]
    }

    fn reset(&mut self) -> Vec<String> {
        if !self.controller.is_enabled() {
            return vec!["ERR reset ignored: controller disabled".to_string()];
        }
        let before = self.bus.published();
        self.controller.reset_sequence();
        let mut lines = vec!["OK reset".to_string()];
        lines.extend(self.trigger_lines(before));
        lines
    }

    fn set_tracking(&mut self, present: bool) -> Vec<String> {
        let label = on_off(present);
        if self.tracking == present {
            return vec![format!("OK track {label} (unchanged)")];
        }
        self.tracking = present;

        let mut lines = vec![format!("OK track {label}")];
        if let Some((started, lost)) = self.tracking_triggers {
            let before = self.bus.published();
            self.bus.publish(if present { started } else { lost });
            lines.extend(self.trigger_lines(before));
        }
        let queued = self.controller.pending_commands();
        if queued > 0 {
            lines.push(format!("  {queued} lifecycle command(s) queued for the next frame"));
        }
        lines
    }

    fn strike(&mut self, pose: &str) -> Vec<String> {
        let body = self.controller.library_mut();
        if !body.knows(pose) {
            return vec![format!(
                "ERR unknown pose `{pose}` (known: {})",
                body.known.join(", ")
            )];
        }
        body.striking = Some(pose.to_string());
        vec![format!("OK pose {pose}")]
    }

    fn frames_covering(&self, duration: Duration) -> u32 {
        let frame = self.frame.as_nanos().max(1);
        u32::try_from(duration.as_nanos().div_ceil(frame)).unwrap_or(u32::MAX)
    }

    fn advance(&mut self, frames: u32) -> Vec<String> {
        let mut events = Vec::new();
        for _ in 0..frames {
            let before = self.bus.published();
            self.controller.update(&self.tracking, &self.frame);
            self.scene.update(&self.frame);
            self.elapsed += self.frame;
            self.frames += 1;
            events.extend(self.trigger_lines(before));
        }

        let snapshot = self.controller.snapshot();
        let mut lines = vec![format!(
            "OK {frames} frame(s) t=+{}ms state={} pose-state={}",
            self.elapsed.as_millis(),
            snapshot.sequence_state,
            snapshot.pose_state
        )];
        lines.extend(events);
        lines
    }

    fn trigger_lines(&self, since: u32) -> Vec<String> {
        let count = self.bus.published().wrapping_sub(since);
        self.bus
            .journal()
            .iter()
            .filter(|record| record.sequence.wrapping_sub(since) < count)
            .map(|record| {
                format!(
                    "  trigger {} at=+{}ms",
                    self.bus.name(record.trigger),
                    self.elapsed.as_millis()
                )
            })
            .collect()
    }

    fn status(&self) -> Result<Vec<String>> {
        let formatter = StatusFormatter::new(&self.controller);
        let mut sequence = String::new();
        formatter.write_sequence_line(&mut sequence)?;
        let mut hold = String::new();
        formatter.write_hold_line(&mut hold)?;

        let mut body = format!("body tracking={}", on_off(self.tracking));
        write!(
            body,
            " pose={} t=+{}ms frames={}",
            self.controller.library().striking().unwrap_or("none"),
            self.elapsed.as_millis(),
            self.frames
        )?;

        let mut lines = vec![sequence, hold, body];
        if let Some(fault) = self.controller.fault() {
            lines.push(format!("controller disabled: {fault}"));
        }
        lines.extend(self.scene.describe(self.styled));
        Ok(lines)
    }

    fn log(&self) -> Vec<String> {
        let journal = self.bus.journal();
        if journal.is_empty() {
            return vec!["journal empty".to_string()];
        }
        let mut lines = vec![format!(
            "journal ({} of {} publications)",
            journal.len(),
            self.bus.published()
        )];
        lines.extend(journal.iter().map(|record| {
            format!(
                "  #{:<4} {} handlers={}",
                record.sequence,
                self.bus.name(record.trigger),
                record.handlers
            )
        }));
        lines
    }

    fn record(&mut self, role: TranscriptRole, lines: &[String]) -> Result<()> {
        if let Some(transcript) = self.transcript.as_mut() {
            for line in lines {
                transcript.append_line(self.elapsed, role, line)?;
            }
        }
        Ok(())
    }
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

fn help_lines(help: &HelpCommand<'_>) -> Vec<String> {
    let describe = |spec: &catalog::CommandSpec| format!("{:<16} - {}", spec.usage, spec.summary);
    match help.topic {
        Some(topic) => match catalog::find(topic) {
            Some(spec) => vec![describe(spec)],
            None => {
                let topics: Vec<&str> = catalog::commands().iter().map(|spec| spec.name).collect();
                vec![
                    format!("No help available for `{topic}`."),
                    format!("Available topics: {}", topics.join(", ")),
                ]
            }
        },
        None => {
            let mut lines = vec!["Available commands:".to_string()];
            lines.extend(
                catalog::commands()
                    .iter()
                    .map(|spec| format!("  {}", describe(spec))),
            );
            lines.push("Type `help <command>` for a specific command.".to_string());
            lines
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

struct TranscriptLogger {
    writer: BufWriter<fs::File>,
}

impl TranscriptLogger {
    fn create(path: &Path, header: &str) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .with_context(|| format!("opening transcript {}", path.display()))?;
        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        writeln!(logger.writer, "# {header}")?;
        writeln!(
            logger.writer,
            "# Timestamps are simulated milliseconds since session start"
        )?;
        writeln!(logger.writer)?;
        logger.writer.flush()?;
        Ok(logger)
    }

    fn append_line(&mut self, elapsed: Duration, role: TranscriptRole, line: &str) -> Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            elapsed.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sequence_core::controller::SequenceState;

    fn session() -> Session {
        Session::new(&LensConfig::default(), SessionOptions::default()).unwrap()
    }

    fn run(session: &mut Session, lines: &[&str]) -> Vec<String> {
        let mut output = Vec::new();
        for line in lines {
            output.extend(session.handle_command(line).unwrap());
        }
        output
    }

    #[test]
    fn tracking_starts_the_riddle_and_poses_complete_it() {
        let mut session = session();
        let output = run(
            &mut session,
            &[
                "track on",
                "tick",
                "pose TPOSE",
                "run 1100ms",
                "pose ARMS_UP",
                "run 1100ms",
                "pose THIRD_POSE_NO_ARMS",
                "run 1100ms",
                "pose TPOSE",
                "run 1100ms",
            ],
        );

        assert!(output.iter().any(|line| line.contains("trigger SEQUENCE_START")));
        assert!(output.iter().any(|line| line.contains("trigger TPOSE_2_COMPLETE")));
        assert!(output.iter().any(|line| line.contains("trigger SEQUENCE_COMPLETE")));
        assert_eq!(
            session.controller().sequence_state(),
            SequenceState::Completed
        );
        assert!(session.scene().final_number_shown());
        assert_eq!(
            session.scene().hud_instruction(),
            "Sequence Complete! Great job!"
        );
    }

    #[test]
    fn losing_the_body_resets_on_the_next_frame() {
        let mut session = session();
        run(
            &mut session,
            &["track on", "tick", "pose TPOSE", "run 1100ms", "track off"],
        );
        assert_eq!(session.controller().pose_index(), 1);

        let output = run(&mut session, &["tick"]);
        assert!(output.iter().any(|line| line.contains("trigger SEQUENCE_RESET")));
        assert_eq!(
            session.controller().sequence_state(),
            SequenceState::WaitingForStart
        );
    }

    #[test]
    fn reports_syntax_errors_and_unknown_poses() {
        let mut session = session();
        let output = run(&mut session, &["jump", "pose CARTWHEEL", "run 5"]);
        assert!(output[0].starts_with("ERR syntax"));
        assert!(output[1].starts_with("ERR unknown pose `CARTWHEEL`"));
        assert!(output[2].starts_with("ERR syntax"));
    }

    #[test]
    fn unknown_library_pose_disables_the_controller() {
        let mut config = LensConfig::default();
        config.library.poses.retain(|pose| pose != "THIRD_POSE_NO_ARMS");
        let mut session = Session::new(&config, SessionOptions::default()).unwrap();

        let output = run(&mut session, &["start", "status"]);
        assert!(output[0].starts_with("ERR start refused: controller disabled"));
        assert!(
            output
                .iter()
                .any(|line| line.starts_with("controller disabled:"))
        );
    }

    #[test]
    fn help_lists_every_command() {
        let mut session = session();
        let output = run(&mut session, &["help"]);
        for spec in catalog::commands() {
            assert!(
                output.iter().any(|line| line.contains(spec.usage)),
                "{}",
                spec.name
            );
        }
        let output = run(&mut session, &["help dance"]);
        assert_eq!(output[0], "No help available for `dance`.");
    }

    #[test]
    fn status_shows_sequence_and_scene() {
        let mut session = session();
        let output = run(&mut session, &["track on", "tick", "pose TPOSE", "tick 10", "status"]);
        assert!(
            output
                .iter()
                .any(|line| line == "sequence state=in-progress pose=TPOSE index=0/4")
        );
        assert!(output.iter().any(|line| line.starts_with("hud bar [")));
        assert!(
            output
                .iter()
                .any(|line| line.starts_with("riddle panel=\"riddle 1\""))
        );
    }
}
