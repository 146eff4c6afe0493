//! Bulk-enqueue progress reporting.
//!
//! Reports observable progress during `rsm enqueue <dir>` so users see what is
//! being scanned and how many files are queued. Progress is emitted on
//! **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a bulk enqueue.
#[derive(Clone, Debug)]
pub enum EnqueueEvent {
    /// Walking the directory tree; total not known yet.
    Scanning { dir: String },
    ///n files spooled and queued out of total matches.
    Enqueued {
        file_name: String,
        n: u64,
        total: u64,
    },
}

/// Reports enqueue progress. Implementations write to stderr (human or JSON).
pub trait EnqueueReporter: Send + Sync {
    /// Emit a progress event. Called once per queued file.
    fn report(&self, event: EnqueueEvent);
}

/// Human-friendly progress on stderr: "enqueue  12 / 340 files  alice-resume.pdf".
pub struct StderrProgress;

impl EnqueueReporter for StderrProgress {
    fn report(&self, event: EnqueueEvent) {
        let line = match &event {
            EnqueueEvent::Scanning { dir } => {
                format!("enqueue {}  scanning...\n", dir)
            }
            EnqueueEvent::Enqueued {
                file_name,
                n,
                total,
            } => {
                let n_fmt = format_number(*n);
                let total_fmt = format_number(*total);
                format!("enqueue  {} / {} files  {}\n", n_fmt, total_fmt, file_name)
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl EnqueueReporter for JsonProgress {
    fn report(&self, event: EnqueueEvent) {
        let obj = match &event {
            EnqueueEvent::Scanning { dir } => serde_json::json!({
                "event": "progress",
                "phase": "scanning",
                "dir": dir
            }),
            EnqueueEvent::Enqueued {
                file_name,
                n,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "enqueueing",
                "file": file_name,
                "n": n,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl EnqueueReporter for NoProgress {
    fn report(&self, _event: EnqueueEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. Caller passes it to the bulk enqueue.
    pub fn reporter(&self) -> Box<dyn EnqueueReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(1), "1");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234), "1,234");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }
}
