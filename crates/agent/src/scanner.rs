//! Unread Scanner: finds the first conversation row with an unread badge,
//! scrolling the list a bounded number of steps before giving up.

use autoreply_browser::{Locator, Page};
use autoreply_core::{Config, Result, ScrollConfig};
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tracing::debug;

static UNREAD_COUNT: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());

/// A badge counts as unread only when its trimmed text is all digits.
pub fn is_unread_badge_text(text: &str) -> bool {
    UNREAD_COUNT.is_match(text.trim())
}

pub struct UnreadScanner {
    list: Locator,
    cells: Locator,
    indicator: String,
    badge: String,
    scroll: ScrollConfig,
}

impl UnreadScanner {
    pub fn from_config(config: &Config) -> Self {
        let selectors = &config.selectors;
        Self {
            list: Locator::css(&selectors.conversation_list),
            cells: Locator::css(&selectors.conversation_cell),
            indicator: selectors.unread_indicator.clone(),
            badge: selectors.unread_badge.clone(),
            scroll: config.scroll.clone(),
        }
    }

    /// First unread row, top to bottom. Scrolls down up to the step budget;
    /// when nothing turns up the list is scrolled back to the top and `None`
    /// is returned. Without a conversation list nothing is scrolled.
    pub async fn find_first_unread(&self, page: &dyn Page) -> Result<Option<Locator>> {
        if let Some(row) = self.scan_rendered(page).await? {
            return Ok(Some(row));
        }

        for step in 1..=self.scroll.down_steps {
            if !self.scroll_down_step(page).await? {
                debug!(step, "Conversation list gone, stopping scan");
                break;
            }
            if let Some(row) = self.scan_rendered(page).await? {
                debug!(step, "Unread row found after scrolling");
                return Ok(Some(row));
            }
        }

        self.scroll_to_top(page).await?;
        Ok(None)
    }

    /// Returns false when there is no list to scroll.
    async fn scroll_down_step(&self, page: &dyn Page) -> Result<bool> {
        if page.count(&self.list).await? == 0 {
            return Ok(false);
        }
        self.hover_list(page).await;
        page.wheel(self.scroll.down_pixels).await?;
        page.wait(Duration::from_millis(self.scroll.settle_ms)).await;
        Ok(true)
    }

    async fn scroll_to_top(&self, page: &dyn Page) -> Result<()> {
        if page.count(&self.list).await? == 0 {
            return Ok(());
        }
        self.hover_list(page).await;
        for _ in 0..self.scroll.top_passes {
            page.wheel(-self.scroll.up_pixels).await?;
            page.wait(Duration::from_millis(self.scroll.up_settle_ms)).await;
        }
        Ok(())
    }

    async fn hover_list(&self, page: &dyn Page) {
        if let Err(e) = page.hover(&self.list.first()).await {
            debug!(error = %e, "Could not hover conversation list");
        }
    }

    async fn scan_rendered(&self, page: &dyn Page) -> Result<Option<Locator>> {
        let rows = page.count(&self.cells).await?;
        for index in 0..rows {
            let row = self.cells.nth(index);
            if self.is_unread(page, &row).await? {
                return Ok(Some(row));
            }
        }
        Ok(None)
    }

    /// Indicator container, then a badge inside it, then numeric badge text.
    pub async fn is_unread(&self, page: &dyn Page, row: &Locator) -> Result<bool> {
        let indicator = row.within(&self.indicator);
        if page.count(&indicator).await? == 0 {
            return Ok(false);
        }
        let badge = indicator.first().within(&self.badge).first();
        if page.count(&badge).await? == 0 {
            return Ok(false);
        }
        Ok(page
            .text_content(&badge)
            .await?
            .map(|text| is_unread_badge_text(&text))
            .unwrap_or(false))
    }
}
