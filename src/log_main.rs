//! Session and catch history, appended as JSON arrays under `<data>/logs`

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::{format_duration, Session, StopReason};
use crate::utils::path::logs_dir;

/// One finished run as stored in `sessions.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub start: String,
    pub stop: Option<String>,
    pub throws: u32,
    pub catches: u32,
    pub duration: String,
    pub stop_reason: StopReason,
}

impl From<&Session> for SessionRecord {
    fn from(session: &Session) -> Self {
        Self {
            start: session.started_at.to_rfc3339(),
            stop: session.stopped_at.map(|t| t.to_rfc3339()),
            throws: session.throws,
            catches: session.catches,
            duration: format_duration(session.duration()),
            stop_reason: session.stop_reason,
        }
    }
}

/// Log entry for a confirmed catch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchLogEntry {
    pub timestamp: String,
    #[serde(rename = "catch")]
    pub status: bool,
}

pub fn sessions_path() -> PathBuf {
    logs_dir().join("sessions.json")
}

pub fn fishing_log_path() -> PathBuf {
    logs_dir().join("fishing_log.json")
}

/// Missing or unreadable files read as empty
fn load_entries<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    if !path.exists() {
        return Vec::new();
    }
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("[LOG] Ignoring malformed {:?}: {}", path, e);
            Vec::new()
        }),
        Err(e) => {
            tracing::warn!("[LOG] Failed to read {:?}: {}", path, e);
            Vec::new()
        }
    }
}

fn append_entry<T: Serialize + DeserializeOwned>(path: &Path, entry: T) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut data: Vec<T> = load_entries(path);
    data.push(entry);
    let content = serde_json::to_string_pretty(&data)?;
    fs::write(path, content)
}

pub fn load_sessions(path: &Path) -> Vec<SessionRecord> {
    load_entries(path)
}

pub fn append_session(path: &Path, session: &Session) -> io::Result<()> {
    append_entry(path, SessionRecord::from(session))
}

pub fn load_catches(path: &Path) -> Vec<CatchLogEntry> {
    load_entries(path)
}

pub fn log_catch(path: &Path) -> io::Result<()> {
    append_entry(
        path,
        CatchLogEntry {
            timestamp: Utc::now().to_rfc3339(),
            status: true,
        },
    )
}
