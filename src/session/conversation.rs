use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::constants::DEFAULT_HISTORY_CAPACITY;

/// Opaque 128-bit conversation identifier.
///
/// Serializes as the canonical hyphenated UUID string, so parse -> format -> parse
/// is stable at every boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(Uuid);

impl ConversationId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ConversationId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for ConversationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// One logical chat with a bounded answer history
#[derive(Debug)]
pub struct Conversation {
    id: ConversationId,
    history_capacity: usize,
    created_at: DateTime<Utc>,
    history: Mutex<VecDeque<String>>,
}

impl Conversation {
    /// Create a conversation. A `history_capacity` of 0 selects
    /// [`DEFAULT_HISTORY_CAPACITY`].
    pub fn new(id: ConversationId, history_capacity: usize) -> Self {
        let history_capacity = if history_capacity == 0 {
            DEFAULT_HISTORY_CAPACITY
        } else {
            history_capacity
        };

        Self {
            id,
            history_capacity,
            created_at: Utc::now(),
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Record an answer. Once the history is at capacity the oldest entry is
    /// dropped first, so the length never exceeds `history_capacity`.
    pub fn append_answer(&self, answer: impl Into<String>) {
        let mut history = self.history.lock();
        while history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(answer.into());
    }

    /// Snapshot of the retained answers, oldest first
    pub fn history(&self) -> Vec<String> {
        self.history.lock().iter().cloned().collect()
    }

    pub fn last_answer(&self) -> Option<String> {
        self.history.lock().back().cloned()
    }

    pub fn len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.lock().is_empty()
    }
}
