use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One seller identity. Immutable after load; owns its own browser profile,
/// cookie file and history file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: String,
    pub name: String,
    /// Status indicator shown next to the name in logs and the window title.
    pub emoji: String,
    /// Browser profile folder name under the browser data directory.
    pub folder: String,
}

impl Account {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            emoji: "●".to_string(),
            folder: id.to_lowercase(),
            id,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_emoji(mut self, emoji: impl Into<String>) -> Self {
        self.emoji = emoji.into();
        self
    }

    /// `"🟢 Toko Satu"`
    pub fn label(&self) -> String {
        format!("{} {}", self.emoji, self.name)
    }
}

/// Source of the current calendar day, so day rollover can be driven in tests.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        history_day(&Utc::now())
    }
}

/// History files are keyed by the UTC date, so a day rolls over at UTC
/// midnight whatever the machine's zone.
fn history_day<Tz: TimeZone>(at: &DateTime<Tz>) -> NaiveDate {
    at.naive_utc().date()
}

/// Shorten `text` to at most `max_chars` characters, ending with `...` when cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    let count = text.chars().count();
    if count <= max_chars {
        return text.to_string();
    }
    if max_chars <= 3 {
        return text.chars().take(max_chars).collect();
    }
    let mut out: String = text.chars().take(max_chars - 3).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_defaults() {
        let account = Account::new("TOKO1");
        assert_eq!(account.name, "TOKO1");
        assert_eq!(account.folder, "toko1");
        assert_eq!(account.emoji, "●");
        assert_eq!(account.label(), "● TOKO1");
    }

    #[test]
    fn test_history_day_is_utc_date() {
        let jakarta = chrono::FixedOffset::east_opt(7 * 3600).unwrap();
        let early = jakarta.with_ymd_and_hms(2026, 10, 15, 3, 0, 0).unwrap();
        assert_eq!(history_day(&early), NaiveDate::from_ymd_opt(2026, 10, 14).unwrap());

        let later = jakarta.with_ymd_and_hms(2026, 10, 15, 7, 0, 0).unwrap();
        assert_eq!(history_day(&later), NaiveDate::from_ymd_opt(2026, 10, 15).unwrap());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("Budi", 18), "Budi");
        assert_eq!(truncate("halo kak barangnya ready?", 10), "halo ka...");
        assert_eq!(truncate("abcdef", 3), "abc");
        // multi-byte characters are never split
        assert_eq!(truncate("ééééééé", 5), "éé...");
    }
}
