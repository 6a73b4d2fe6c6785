//! Append-only event log narrating a simulation run.
//!
//! The log is the product of the engine: every pipeline stage appends
//! human-readable entries attributed to an actor, and an educational UI or
//! CLI renders them verbatim. Entries are never mutated or reordered after
//! they are appended.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::SystemTime;

/// Who an event is attributed to in the narration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Actor {
    /// The signer
    A,
    /// The verifier
    B,
    /// Neutral pipeline narration
    System,
    /// In-transit adversary
    Attacker,
}

impl Actor {
    /// Display name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::System => "System",
            Self::Attacker => "Attacker",
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Severity of a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

impl LogLevel {
    /// Lowercase name (transcripts, CLI rendering).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One narration event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Unique within the log, strictly increasing in append order
    pub id: u64,
    /// Time the entry was appended (virtual time in simulation)
    pub timestamp: SystemTime,
    /// Attributed actor
    pub actor: Actor,
    /// Human-readable narration text
    pub text: String,
    /// Severity
    pub level: LogLevel,
}

/// Append-only, ordered sequence of [`LogEntry`] values.
///
/// Ids come from a monotonic counter, so they stay unique and ordered even
/// when two entries share a timestamp. The counter survives `clear`, so an
/// id is never reused for the lifetime of the log.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<LogEntry>,
    next_id: u64,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry and returns its assigned id.
    ///
    /// This and [`clear`](Self::clear) are the only mutators; appending is
    /// synchronous and non-fallible.
    pub fn append(
        &mut self,
        actor: Actor,
        level: LogLevel,
        text: impl Into<String>,
        timestamp: SystemTime,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(LogEntry {
            id,
            timestamp,
            actor,
            text: text.into(),
            level,
        });
        id
    }

    /// All entries in append order.
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry has been appended (or all were cleared).
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every entry. Id assignment continues where it left off.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries attributed to `actor`, in append order.
    pub fn entries_by_actor(&self, actor: Actor) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.actor == actor).collect()
    }

    /// Entries at `level`, in append order.
    pub fn entries_by_level(&self, level: LogLevel) -> Vec<&LogEntry> {
        self.entries.iter().filter(|e| e.level == level).collect()
    }

    /// First entry whose text contains `needle`.
    pub fn find(&self, needle: &str) -> Option<&LogEntry> {
        self.entries.iter().find(|e| e.text.contains(needle))
    }
}
