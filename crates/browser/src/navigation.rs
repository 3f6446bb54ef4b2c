//! Navigation protocol and login state machine for the conversation view.

use autoreply_core::{Config, Error, Result, TimingConfig};
use regex::Regex;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::locator::Locator;
use crate::page::{Page, POLL_INTERVAL};

/// How often the login-wait title is rewritten; the page may reset it.
const TITLE_REFRESH: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    LoginRequired,
    OnTargetView,
    Unknown,
}

/// Which condition settled the post-navigation race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GotoOutcome {
    UrlMatched,
    ListVisible,
    LoginVisible,
    /// Nothing resolved, even after one reload. Callers re-check state.
    Ambiguous,
}

pub struct Navigator {
    chat_url: String,
    url_pattern: Regex,
    list: Locator,
    cells: Locator,
    login: Locator,
    timing: TimingConfig,
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

impl Navigator {
    pub fn from_config(config: &Config) -> Result<Self> {
        let selectors = &config.selectors;
        let url_pattern = Regex::new(&selectors.target_url_pattern)
            .map_err(|e| Error::Config(format!("invalid targetUrlPattern: {}", e)))?;
        Ok(Self {
            chat_url: config.chat_url.clone(),
            url_pattern,
            list: Locator::css(&selectors.conversation_list),
            cells: Locator::css(&selectors.conversation_cell),
            login: Locator::css(&selectors.login_indicators),
            timing: config.timing.clone(),
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    /// Best-effort load of the chat URL followed by a bounded race between
    /// the URL pattern, the conversation list and the login form. Never fails.
    pub async fn robust_goto(&self, page: &dyn Page) -> GotoOutcome {
        if let Err(e) = page
            .goto(&self.chat_url, ms(self.timing.navigation_timeout_ms))
            .await
        {
            debug!(error = %e, "Navigation did not settle, continuing");
        }

        if let Some(outcome) = self.race(page).await {
            debug!(?outcome, "Navigation settled");
            return outcome;
        }

        warn!("Navigation ambiguous, reloading once");
        if let Err(e) = page.reload(ms(self.timing.reload_timeout_ms)).await {
            debug!(error = %e, "Reload did not settle");
        }
        GotoOutcome::Ambiguous
    }

    async fn race(&self, page: &dyn Page) -> Option<GotoOutcome> {
        let limit = ms(self.timing.settle_race_ms);
        let mut waited = Duration::ZERO;
        loop {
            if let Ok(url) = page.url().await {
                if self.url_pattern.is_match(&url) {
                    return Some(GotoOutcome::UrlMatched);
                }
            }
            if present(page, &self.list).await {
                return Some(GotoOutcome::ListVisible);
            }
            if present(page, &self.login).await {
                return Some(GotoOutcome::LoginVisible);
            }
            if waited >= limit {
                return None;
            }
            page.wait(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }

    async fn target_present(&self, page: &dyn Page) -> bool {
        present(page, &self.list).await || present(page, &self.cells).await
    }

    /// Whether the conversation list (or any row) shows up within the probe
    /// timeout.
    pub async fn is_on_target_view(&self, page: &dyn Page) -> bool {
        let limit = ms(self.timing.probe_timeout_ms);
        let mut waited = Duration::ZERO;
        loop {
            if self.target_present(page).await {
                return true;
            }
            if waited >= limit {
                return false;
            }
            page.wait(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }

    /// Classify the current page, polling up to the probe timeout.
    pub async fn detect(&self, page: &dyn Page) -> ViewState {
        let limit = ms(self.timing.probe_timeout_ms);
        let mut waited = Duration::ZERO;
        loop {
            if self.target_present(page).await {
                return ViewState::OnTargetView;
            }
            if present(page, &self.login).await {
                return ViewState::LoginRequired;
            }
            if waited >= limit {
                return ViewState::Unknown;
            }
            page.wait(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }

    /// Settle the login state after a navigation. An unknown state triggers
    /// one more navigation; a login form blocks until a human signs in or the
    /// login timeout passes.
    pub async fn resolve_login(&self, page: &dyn Page, waiting_title: &str) -> Result<ViewState> {
        let mut state = self.detect(page).await;
        if state == ViewState::Unknown {
            debug!("View state unknown, navigating again");
            self.robust_goto(page).await;
            state = self.detect(page).await;
        }

        if state == ViewState::LoginRequired {
            warn!(
                timeout_secs = self.timing.login_timeout_ms / 1000,
                "Login required, waiting for manual login"
            );
            self.wait_for_manual_login(page, waiting_title).await?;
            info!("Login detected");
            return Ok(ViewState::OnTargetView);
        }
        Ok(state)
    }

    async fn wait_for_manual_login(&self, page: &dyn Page, waiting_title: &str) -> Result<()> {
        let limit = ms(self.timing.login_timeout_ms);
        let mut waited = Duration::ZERO;
        let mut since_title = TITLE_REFRESH;
        loop {
            if since_title >= TITLE_REFRESH {
                if let Err(e) = page.set_title(waiting_title).await {
                    debug!(error = %e, "Failed to set window title");
                }
                since_title = Duration::ZERO;
            }
            if self.target_present(page).await {
                return Ok(());
            }
            if waited >= limit {
                return Err(Error::Timeout(format!(
                    "manual login not completed within {}s",
                    limit.as_secs()
                )));
            }
            page.wait(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
            since_title += POLL_INTERVAL;
        }
    }
}

async fn present(page: &dyn Page, locator: &Locator) -> bool {
    page.count(locator).await.map(|n| n > 0).unwrap_or(false)
}
