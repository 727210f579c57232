//! Append-only audit trail of boundary operations.
//!
//! One line per event (JSONL or plain text). Clip content is truncated
//! before it hits the log; the audit file is not a second copy of the store.

use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use serde::Serialize;

use crate::Result;

const AUDIT_MAX_TEXT: usize = 200;

#[derive(Clone, Debug, Serialize)]
pub struct AuditEvent {
    pub timestamp: String,
    pub event: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    fn new(event: &str, user_id: Option<i64>, code: Option<&str>, detail: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event: event.to_string(),
            user_id,
            code: code.map(|s| s.to_string()),
            detail: detail.map(|s| s.to_string()),
        }
    }

    pub fn save(user_id: i64, code: &str, content: &str) -> Self {
        Self::new("save", Some(user_id), Some(code), Some(content))
    }

    pub fn fetch(user_id: i64, code: &str) -> Self {
        Self::new("fetch", Some(user_id), Some(code), None)
    }

    pub fn denied(user_id: i64, code: &str, reason: &str) -> Self {
        Self::new("denied", Some(user_id), Some(code), Some(reason))
    }

    pub fn sweep(removed: usize) -> Self {
        Self::new("sweep", None, None, Some(&format!("removed {removed}")))
    }
}

#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&self, mut event: AuditEvent) -> Result<()> {
        if let Some(s) = &event.detail {
            event.detail = Some(truncate_text(s, AUDIT_MAX_TEXT));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        if self.json {
            let line = serde_json::to_string(&event)?;
            writeln!(file, "{line}")?;
            return Ok(());
        }

        let mut out = format!("{} {}", event.timestamp, event.event);
        if let Some(id) = event.user_id {
            out.push_str(&format!(" user={id}"));
        }
        if let Some(code) = &event.code {
            out.push_str(&format!(" code={code}"));
        }
        if let Some(detail) = &event.detail {
            out.push_str(&format!(" detail={detail:?}"));
        }
        writeln!(file, "{out}")?;
        Ok(())
    }
}

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_file(prefix: &str) -> PathBuf {
        let ts = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let pid = std::process::id();
        PathBuf::from(format!("/tmp/{prefix}-{pid}-{ts}.log"))
    }

    #[test]
    fn truncate_text_adds_ellipsis() {
        let s = "a".repeat(AUDIT_MAX_TEXT + 10);
        let t = truncate_text(&s, AUDIT_MAX_TEXT);
        assert!(t.ends_with("..."));
    }

    #[test]
    fn write_truncates_long_detail() {
        let log = AuditLogger::new(tmp_file("clipbot-audit-test"), true);
        let content = "x".repeat(AUDIT_MAX_TEXT + 50);
        log.write(AuditEvent::save(1, "CLIP-ABCDEF", &content))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("..."));
        assert!(written.contains("CLIP-ABCDEF"));
    }

    #[test]
    fn plain_text_lines_carry_event_fields() {
        let log = AuditLogger::new(tmp_file("clipbot-audit-plain"), false);
        log.write(AuditEvent::denied(7, "CLIP-ABCDEF", "private"))
            .unwrap();

        let written = std::fs::read_to_string(log.path()).unwrap();
        assert!(written.contains("denied"));
        assert!(written.contains("user=7"));
        assert!(written.contains("code=CLIP-ABCDEF"));
    }
}
