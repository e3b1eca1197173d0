//! Append-only commentary feed
//!
//! Every step of the strategy loop narrates into this log. It is the only
//! error-reporting channel the dashboard has, so entries are never mutated,
//! reordered or dropped within a session.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a commentary entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommentaryKind {
    Entry,
    Exit,
    Analysis,
    Risk,
}

impl CommentaryKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "entry" => Some(Self::Entry),
            "exit" => Some(Self::Exit),
            "analysis" => Some(Self::Analysis),
            "risk" => Some(Self::Risk),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommentaryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
            Self::Analysis => write!(f, "analysis"),
            Self::Risk => write!(f, "risk"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentaryMessage {
    /// Strictly increasing within a log
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: CommentaryKind,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CommentaryLog {
    entries: Vec<CommentaryMessage>,
    next_id: u64,
}

impl CommentaryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its id
    pub fn append(&mut self, kind: CommentaryKind, message: impl Into<String>) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.entries.push(CommentaryMessage {
            id,
            kind,
            message: message.into(),
            timestamp: Utc::now(),
        });
        id
    }

    /// Full feed in insertion order
    pub fn entries(&self) -> &[CommentaryMessage] {
        &self.entries
    }

    /// The most recent `limit` entries, oldest first
    pub fn recent(&self, limit: usize) -> &[CommentaryMessage] {
        let start = self.entries.len().saturating_sub(limit);
        &self.entries[start..]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self, kind: CommentaryKind) -> usize {
        self.entries.iter().filter(|e| e.kind == kind).count()
    }
}
