//! RS-015: Append-only JSONL provenance event log.

use crate::core::error::EngineError;
use crate::core::types::{ProvenanceEvent, TimestampedEvent};
use chrono::{SecondsFormat, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Current UTC time as RFC 3339 with a `Z` suffix.
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Generate a session ID.
pub fn generate_session_id() -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default() as u64;
    format!("s-{:012x}", nanos & 0xFFFF_FFFF_FFFF)
}

/// Event log path inside a journal directory.
pub fn event_log_path(journal_dir: &Path) -> PathBuf {
    journal_dir.join("events.jsonl")
}

/// Append one event to the journal.
pub fn append_event(journal_dir: &Path, event: ProvenanceEvent) -> Result<(), EngineError> {
    std::fs::create_dir_all(journal_dir).map_err(|e| {
        EngineError::Journal(format!("cannot create {}: {}", journal_dir.display(), e))
    })?;
    let path = event_log_path(journal_dir);

    let te = TimestampedEvent {
        ts: now_rfc3339(),
        event,
    };
    let json = serde_json::to_string(&te)
        .map_err(|e| EngineError::Journal(format!("JSON serialize error: {}", e)))?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| EngineError::Journal(format!("cannot open {}: {}", path.display(), e)))?;

    writeln!(file, "{}", json).map_err(|e| EngineError::Journal(format!("write error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rs015_now_rfc3339() {
        let ts = now_rfc3339();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_rs015_generate_session_id() {
        let id = generate_session_id();
        assert!(id.starts_with("s-"));
        assert_eq!(id.len(), 2 + 12);
    }

    #[test]
    fn test_rs015_event_log_path() {
        let p = event_log_path(Path::new("/work/state"));
        assert_eq!(p, PathBuf::from("/work/state/events.jsonl"));
    }

    #[test]
    fn test_rs015_append_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let journal = dir.path().join("nested").join("state");
        append_event(
            &journal,
            ProvenanceEvent::ModelComputed {
                session_id: "s-abc".to_string(),
                duration_seconds: 0.5,
            },
        )
        .unwrap();

        let content = std::fs::read_to_string(journal.join("events.jsonl")).unwrap();
        let te: TimestampedEvent = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(
            te.event,
            ProvenanceEvent::ModelComputed {
                session_id: "s-abc".to_string(),
                duration_seconds: 0.5,
            }
        );
        assert!(content.contains("\"event\":\"model_computed\""));
    }

    #[test]
    fn test_rs015_append_multiple() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            let event = ProvenanceEvent::ScriptFailed {
                session_id: "s-1".to_string(),
                script: format!("s{}.calc", i),
                error: "boom".to_string(),
            };
            append_event(dir.path(), event).unwrap();
        }
        let content = std::fs::read_to_string(dir.path().join("events.jsonl")).unwrap();
        assert_eq!(content.lines().count(), 3);
    }

    #[test]
    fn test_rs015_unwritable_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let err = append_event(
            &blocker.join("state"),
            ProvenanceEvent::ModelComputed {
                session_id: "s".to_string(),
                duration_seconds: 0.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, EngineError::Journal(_)));
    }
}
