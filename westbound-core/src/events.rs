//! Append-only event log.
//!
//! Every turn appends structured records; context building reads back only
//! a bounded recent tail.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What kind of thing happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// The player's input text.
    Action,
    /// Narrator (or combat status) text shown to the player.
    Narration,
    /// One combat round resolved.
    CombatRound,
    /// A dice check was rolled.
    RollResult,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Action => "action",
            EventKind::Narration => "narration",
            EventKind::CombatRound => "combat_round",
            EventKind::RollResult => "roll_result",
        }
    }
}

/// One log record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    pub content: String,
    #[serde(default)]
    pub meta: Value,
}

impl EventRecord {
    pub fn new(kind: EventKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            meta: Value::Null,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = meta;
        self
    }
}

/// The append-only log for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventLog {
    pub session_id: String,
    pub events: Vec<EventRecord>,
}

impl EventLog {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            events: Vec::new(),
        }
    }

    pub fn append(&mut self, record: EventRecord) {
        self.events.push(record);
    }

    /// The most recent `n` records, oldest first.
    pub fn recent(&self, n: usize) -> &[EventRecord] {
        let start = self.events.len().saturating_sub(n);
        &self.events[start..]
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recent_returns_bounded_tail() {
        let mut log = EventLog::new("sess_log");
        for i in 0..12 {
            log.append(EventRecord::new(EventKind::Action, format!("step {i}")));
        }
        let tail = log.recent(8);
        assert_eq!(tail.len(), 8);
        assert_eq!(tail[0].content, "step 4");
        assert_eq!(tail[7].content, "step 11");

        assert_eq!(log.recent(100).len(), 12);
    }

    #[test]
    fn test_meta_round_trips() {
        let record = EventRecord::new(EventKind::RollResult, "directive_check")
            .with_meta(json!({"total": 14, "dc": 15}));
        let json = serde_json::to_string(&record).unwrap();
        let restored: EventRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, record);
    }
}
