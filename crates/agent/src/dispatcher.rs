//! Reply Dispatcher: opens an unread conversation, sends the reply script and
//! records the conversation in today's history.

use autoreply_browser::{click_with_fallback, first_present_within, Locator, Page};
use autoreply_core::{truncate, Config, Error, LogConfig, Result};
use autoreply_storage::{HistoryStore, ReplyHistory};
use std::time::Duration;
use tracing::{debug, error, info};

pub const UNKNOWN_TITLE: &str = "(unknown)";
const SNAPSHOT_CHARS: usize = 40;

pub struct ReplyDispatcher {
    title_candidates: Vec<String>,
    message: Locator,
    inputs: Vec<Locator>,
    reply_lines: Vec<String>,
    typing_delay: Duration,
    line_pause: Duration,
    element_timeout: Duration,
    log: LogConfig,
}

impl ReplyDispatcher {
    pub fn from_config(config: &Config) -> Self {
        let selectors = &config.selectors;
        Self {
            title_candidates: selectors.chat_title_candidates.clone(),
            message: Locator::css(&selectors.message_content).last(),
            inputs: vec![
                Locator::css(&selectors.chat_input_textarea).first(),
                Locator::css(&selectors.chat_input_contenteditable).first(),
                Locator::css(&selectors.chat_input_fallback).first(),
            ],
            reply_lines: config.reply_lines.clone(),
            typing_delay: Duration::from_millis(config.timing.typing_delay_ms),
            line_pause: Duration::from_millis(config.timing.line_pause_ms),
            element_timeout: Duration::from_millis(config.timing.element_timeout_ms),
            log: config.log.clone(),
        }
    }

    /// Identifying title of a row. Never fails: falls back to a text snapshot
    /// of the row and finally to [`UNKNOWN_TITLE`].
    pub async fn read_title(&self, page: &dyn Page, row: &Locator) -> String {
        for candidate in &self.title_candidates {
            let loc = row.within(candidate).first();
            if page.count(&loc).await.unwrap_or(0) == 0 {
                continue;
            }
            if let Some(title) = non_empty(page.attribute(&loc, "title").await) {
                return title;
            }
            if let Some(title) = non_empty(page.text_content(&loc).await) {
                return title;
            }
        }

        match non_empty(page.text_content(row).await) {
            Some(snapshot) => snapshot.chars().take(SNAPSHOT_CHARS).collect(),
            None => UNKNOWN_TITLE.to_string(),
        }
    }

    /// Open `row`, send every reply line in order and record `title`.
    pub async fn dispatch(
        &self,
        page: &dyn Page,
        row: &Locator,
        title: &str,
        history: &mut ReplyHistory,
        store: &HistoryStore,
    ) -> Result<()> {
        click_with_fallback(page, row, self.element_timeout).await?;

        let input = first_present_within(page, &self.inputs, self.element_timeout)
            .await?
            .ok_or_else(|| Error::NotFound("reply input".to_string()))?
            .clone();

        let last_message = non_empty(page.text_content(&self.message).await).unwrap_or_default();

        for (index, line) in self.reply_lines.iter().enumerate() {
            if index > 0 {
                page.wait(self.line_pause).await;
            }
            page.type_text(&input, line, self.typing_delay).await?;
            page.press(&input, "Enter").await?;
            debug!(line = index + 1, "Reply line sent");
        }

        history.insert(title);
        if let Err(e) = store.save(history) {
            error!(path = %store.path().display(), error = %e, "Failed to save reply history");
        }

        info!(
            title = %truncate(title, self.log.max_username_length),
            message = %truncate(&last_message, self.log.max_message_length),
            "Replied"
        );
        Ok(())
    }
}

fn non_empty(value: Result<Option<String>>) -> Option<String> {
    value
        .ok()
        .flatten()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePage, FakeRow, FakeState, InputKind};
    use autoreply_core::Paths;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
    }

    fn dispatcher(lines: &[&str]) -> ReplyDispatcher {
        let mut config = Config::default();
        config.reply_lines = lines.iter().map(|l| l.to_string()).collect();
        ReplyDispatcher::from_config(&config)
    }

    fn row(n: usize) -> Locator {
        Locator::css(&Config::default().selectors.conversation_cell).nth(n)
    }

    #[tokio::test]
    async fn test_sends_lines_in_order_and_records() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(&Paths::with_base(tmp.path().to_path_buf()), "TOKO1");
        let mut history = ReplyHistory::empty(today());
        let page = FakePage::with_rows(vec![FakeRow::unread("Budi", "1")]);
        let d = dispatcher(&["halo kak", "pesanan diproses otomatis"]);

        let title = d.read_title(&page, &row(0)).await;
        assert_eq!(title, "Budi");
        d.dispatch(&page, &row(0), &title, &mut history, &store)
            .await
            .unwrap();

        let state = page.state();
        assert_eq!(state.sent, vec!["halo kak", "pesanan diproses otomatis"]);
        assert!(state.waits.contains(&Duration::from_millis(150)));
        assert!(history.contains("Budi"));
        assert_eq!(store.load(today()), history);
    }

    #[tokio::test]
    async fn test_contenteditable_input_tier() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(&Paths::with_base(tmp.path().to_path_buf()), "TOKO1");
        let mut history = ReplyHistory::empty(today());
        let page = FakePage::new(FakeState {
            rows: vec![FakeRow::unread("Budi", "1")],
            input: InputKind::ContentEditable,
            ..FakeState::default()
        });
        dispatcher(&["ok"])
            .dispatch(&page, &row(0), "Budi", &mut history, &store)
            .await
            .unwrap();
        assert_eq!(page.state().sent, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_generic_fallback_input_tier() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(&Paths::with_base(tmp.path().to_path_buf()), "TOKO1");
        let mut history = ReplyHistory::empty(today());
        let page = FakePage::new(FakeState {
            rows: vec![FakeRow::unread("Budi", "1")],
            input: InputKind::Fallback,
            ..FakeState::default()
        });
        dispatcher(&["ok"])
            .dispatch(&page, &row(0), "Budi", &mut history, &store)
            .await
            .unwrap();
        assert_eq!(page.state().sent, vec!["ok"]);
        assert!(history.contains("Budi"));
    }

    #[tokio::test]
    async fn test_dom_click_fallback_opens_row() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(&Paths::with_base(tmp.path().to_path_buf()), "TOKO1");
        let mut history = ReplyHistory::empty(today());
        let page = FakePage::new(FakeState {
            rows: vec![FakeRow::unread("Budi", "1")],
            pointer_click_fails: true,
            ..FakeState::default()
        });
        dispatcher(&["ok"])
            .dispatch(&page, &row(0), "Budi", &mut history, &store)
            .await
            .unwrap();
        let state = page.state();
        assert_eq!(state.dom_clicks.len(), 1);
        assert_eq!(state.sent, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_missing_input_records_nothing() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(&Paths::with_base(tmp.path().to_path_buf()), "TOKO1");
        let mut history = ReplyHistory::empty(today());
        let page = FakePage::new(FakeState {
            rows: vec![FakeRow::unread("Budi", "1")],
            input: InputKind::Missing,
            ..FakeState::default()
        });
        let err = dispatcher(&["ok"])
            .dispatch(&page, &row(0), "Budi", &mut history, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(history.is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_title_fallbacks() {
        let d = dispatcher(&["ok"]);
        let mut untitled = FakeRow::unread("ignored", "1").untitled();
        untitled.last_message = "Permisi kak, apakah barang ini masih tersedia untuk dikirim hari ini?".into();
        let blank = FakeRow::unread("ignored", "1").untitled();
        let page = FakePage::with_rows(vec![untitled, FakeRow {
            last_message: String::new(),
            ..blank
        }]);

        let snapshot = d.read_title(&page, &row(0)).await;
        assert_eq!(snapshot, "Permisi kak, apakah barang ini masih ter");

        assert_eq!(d.read_title(&page, &row(1)).await, UNKNOWN_TITLE);
    }
}
