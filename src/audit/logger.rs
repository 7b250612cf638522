use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use parking_lot::Mutex;
use tracing::warn;

use crate::audit::event::AuditEvent;

/// Appends audit events to a JSONL file. Write problems are logged and
/// never interrupt a fill.
pub struct AuditLogger {
    file: Option<Mutex<File>>,
}

impl AuditLogger {
    pub fn new(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path);

        match file {
            Ok(f) => Self {
                file: Some(Mutex::new(f)),
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not open audit file");
                Self { file: None }
            }
        }
    }

    /// A logger that drops every event.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.file.is_some()
    }

    pub fn log(&self, event: &AuditEvent) {
        let Some(file) = &self.file else {
            return;
        };

        let json = match serde_json::to_string(event) {
            Ok(j) => j,
            Err(e) => {
                warn!(error = %e, "failed to serialize audit event");
                return;
            }
        };

        if let Err(e) = writeln!(file.lock(), "{}", json) {
            warn!(error = %e, "failed to write audit event");
        }
    }
}
