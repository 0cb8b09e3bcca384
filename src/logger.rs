use std::fs::{File, OpenOptions};
use std::io::Write;

use chrono::Utc;
use serde_json::{Value, json};
use tracing::warn;

pub enum MessageLogMode {
    Full,
    /// Masks credential fields in logged request bodies.
    Redacted,
}

const MASKED_FIELDS: &[&str] = &["Password", "sessionId"];

pub(crate) struct MessageLogger {
    mode: MessageLogMode,
    file: File,
}

impl MessageLogger {
    pub fn new(mode: MessageLogMode, path: &str) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self { mode, file })
    }

    pub fn log_request(&mut self, method: &str, path: &str, body: Option<&Value>) {
        let body = body.map(|b| self.prepare(b));
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "req",
            "method": method,
            "path": path,
            "body": body,
        });
        self.write_line(&entry);
    }

    pub fn log_task_poll(&mut self, task_id: &str, attempt: u32, state: &str) {
        let entry = json!({
            "ts": Utc::now().to_rfc3339(),
            "dir": "task",
            "task": task_id,
            "attempt": attempt,
            "state": state,
        });
        self.write_line(&entry);
    }

    fn prepare(&self, body: &Value) -> Value {
        match self.mode {
            MessageLogMode::Full => body.clone(),
            MessageLogMode::Redacted => {
                let mut redacted = body.clone();
                if let Value::Object(map) = &mut redacted {
                    for field in MASKED_FIELDS {
                        if map.contains_key(*field) {
                            map.insert((*field).to_string(), json!("***"));
                        }
                    }
                }
                redacted
            }
        }
    }

    fn write_line(&mut self, entry: &Value) {
        if let Ok(line) = serde_json::to_string(entry)
            && let Err(e) = writeln!(self.file, "{line}")
        {
            warn!("failed to write log entry: {e}");
        }
    }
}
