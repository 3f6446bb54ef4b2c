use autoreply_core::{Paths, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Conversations already replied to on one calendar day.
///
/// Serialized as `{"date": "YYYY-MM-DD", "chats": [..]}`. `chats` keeps
/// insertion order but never holds duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyHistory {
    pub date: NaiveDate,
    #[serde(default)]
    chats: Vec<String>,
}

impl ReplyHistory {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            chats: Vec::new(),
        }
    }

    pub fn contains(&self, chat_id: &str) -> bool {
        self.chats.iter().any(|c| c == chat_id)
    }

    /// Returns false if the id was already present.
    pub fn insert(&mut self, chat_id: impl Into<String>) -> bool {
        let chat_id = chat_id.into();
        if self.contains(&chat_id) {
            return false;
        }
        self.chats.push(chat_id);
        true
    }

    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    pub fn is_for(&self, today: NaiveDate) -> bool {
        self.date == today
    }
}

/// Reads and writes one account's history file.
pub struct HistoryStore {
    path: PathBuf,
}

impl HistoryStore {
    pub fn new(paths: &Paths, account_id: &str) -> Self {
        Self {
            path: paths.history_file(account_id),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load today's history. A missing, unreadable or stale file yields an
    /// empty set for `today`.
    pub fn load(&self, today: NaiveDate) -> ReplyHistory {
        match self.read() {
            Ok(Some(history)) if history.is_for(today) => history,
            Ok(Some(history)) => {
                debug!(path = %self.path.display(), stored = %history.date, "History is from another day, starting fresh");
                ReplyHistory::empty(today)
            }
            Ok(None) => ReplyHistory::empty(today),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load history, starting fresh");
                ReplyHistory::empty(today)
            }
        }
    }

    /// Raw file contents regardless of date.
    pub fn read(&self) -> Result<Option<ReplyHistory>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        let history: ReplyHistory = serde_json::from_str(&content)?;
        Ok(Some(history))
    }

    pub fn save(&self, history: &ReplyHistory) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(history)?;
        // write-then-rename so a crash mid-write never leaves a truncated file
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self, today: NaiveDate) -> Result<()> {
        self.save(&ReplyHistory::empty(today))
    }
}
