//! Per-run decision trace.
//!
//! Every pipeline decision is kept twice: a terse log line and a bracketed,
//! timestamped pipeline line. At the end of a run the pipeline lines are
//! written to a text artifact so the run can be replayed for audit.

use chrono::{SecondsFormat, Utc};
use chrono_tz::Tz;
use log::{debug, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Outcome of writing the trace to disk.
#[derive(Debug, Clone)]
pub struct TraceArtifact {
    /// Full trace text; equals the file content when `path` is set.
    pub content: String,
    pub path: Option<PathBuf>,
    pub error: Option<String>,
}

pub trait Tracer {
    /// Terse log line.
    fn log(&mut self, message: &str);

    /// Pipeline line; also mirrored into the log.
    fn step(&mut self, line: &str);

    fn log_lines(&self) -> &[String];

    fn steps(&self) -> &[String];

    /// Serialize the pipeline lines. Never fails: write errors are reported
    /// in the returned artifact.
    fn finish(&mut self) -> TraceArtifact;
}

/// File-backed tracer. One instance per pipeline run.
pub struct RunTracer {
    timezone: Tz,
    path: PathBuf,
    shift_id: Option<i32>,
    steps: Vec<String>,
    logs: Vec<String>,
}

impl RunTracer {
    /// Trace file name is unique per run so concurrent runs never collide.
    pub fn new(dir: &Path, timezone: Tz) -> Self {
        let stamp = Utc::now().with_timezone(&timezone).format("%Y%m%d_%H%M%S");
        let file_name = format!("assign_trace_{}_{}.txt", stamp, uuid::Uuid::new_v4().simple());
        Self {
            timezone,
            path: dir.join(file_name),
            shift_id: None,
            steps: Vec::new(),
            logs: Vec::new(),
        }
    }

    /// Tag debug output with the shift being processed.
    pub fn for_shift(mut self, shift_id: i32) -> Self {
        self.shift_id = Some(shift_id);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn timestamp(&self) -> String {
        Utc::now()
            .with_timezone(&self.timezone)
            .to_rfc3339_opts(SecondsFormat::Secs, false)
    }

    fn write_artifact(&self, content: &str, closing: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, content)?;
        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        file.write_all(closing.as_bytes())?;
        Ok(())
    }
}

impl Tracer for RunTracer {
    fn log(&mut self, message: &str) {
        let line = format!("{} {}", self.timestamp(), message);
        self.logs.push(line);
    }

    fn step(&mut self, line: &str) {
        match self.shift_id {
            Some(id) => debug!("[shift {}] {}", id, line),
            None => debug!("{}", line),
        }
        let stamped = format!("[{}] {}", self.timestamp(), line);
        self.steps.push(stamped);
        self.log(line);
    }

    fn log_lines(&self) -> &[String] {
        &self.logs
    }

    fn steps(&self) -> &[String] {
        &self.steps
    }

    fn finish(&mut self) -> TraceArtifact {
        let body = format!("{}\n", self.steps.join("\n"));
        let closing = format!(
            "[{}] Trace written to {}\n",
            self.timestamp(),
            self.path.display()
        );

        match self.write_artifact(&body, &closing) {
            Ok(()) => {
                self.log(&format!("Trace written to {}", self.path.display()));
                TraceArtifact {
                    content: format!("{}{}", body, closing),
                    path: Some(self.path.clone()),
                    error: None,
                }
            }
            Err(e) => {
                warn!("Failed to write trace {}: {}", self.path.display(), e);
                self.step(&format!("Error writing trace: {}", e));
                TraceArtifact {
                    content: format!("{}\n", self.steps.join("\n")),
                    path: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tz() -> Tz {
        chrono_tz::America::Argentina::Buenos_Aires
    }

    #[test]
    fn test_step_is_bracketed_and_mirrored_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracer = RunTracer::new(dir.path(), tz());
        tracer.step("Stage 1: approved requests");
        tracer.log("plain log only");

        assert_eq!(tracer.steps().len(), 1);
        assert!(tracer.steps()[0].starts_with('['));
        assert!(tracer.steps()[0].ends_with("] Stage 1: approved requests"));
        assert_eq!(tracer.log_lines().len(), 2);
        assert!(tracer.log_lines()[1].ends_with(" plain log only"));
    }

    #[test]
    fn test_finish_writes_file_matching_content() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracer = RunTracer::new(dir.path(), tz());
        tracer.step("first");
        tracer.step("second");

        let artifact = tracer.finish();
        let path = artifact.path.clone().expect("artifact path");
        let on_disk = fs::read_to_string(&path).unwrap();

        assert_eq!(on_disk, artifact.content);
        assert!(artifact.error.is_none());
        let lines: Vec<&str> = on_disk.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[2].contains(&path.display().to_string()));
    }

    #[test]
    fn test_unique_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let a = RunTracer::new(dir.path(), tz());
        let b = RunTracer::new(dir.path(), tz());
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_unwritable_dir_still_returns_trace() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        fs::write(&blocker, "file in the way").unwrap();

        let mut tracer = RunTracer::new(&blocker, tz());
        tracer.step("only line");
        let artifact = tracer.finish();

        assert!(artifact.path.is_none());
        assert!(artifact.error.is_some());
        assert!(artifact.content.contains("only line"));
        assert!(artifact.content.contains("Error writing trace"));
    }
}
