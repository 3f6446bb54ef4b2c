//! View-State Controller: keeps the conversation list filtered to "all chats"
//! and "all buyers" so the scanner sees every conversation.

use autoreply_browser::{click_with_fallback, first_present_within, Locator, Page};
use autoreply_core::{Config, Error, FilterConfig, FilterKind, FilterSpec, Result, SelectorConfig};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::context::ViewStateFlags;

pub struct ViewStateController {
    filters: FilterConfig,
    selectors: SelectorConfig,
    element_timeout: Duration,
}

impl ViewStateController {
    pub fn from_config(config: &Config) -> Self {
        Self {
            filters: config.filters.clone(),
            selectors: config.selectors.clone(),
            element_timeout: Duration::from_millis(config.timing.element_timeout_ms),
        }
    }

    /// Ordered lookup strategies for one filter control. The first that
    /// matches anything wins.
    pub fn strategies(&self, label: &str) -> Vec<Locator> {
        vec![
            Locator::exact_text(&self.selectors.conversation_list_wrapper, label),
            Locator::role("button", regex::escape(label)),
            Locator::contains_text(&self.selectors.nav_wrapper, "div", label),
        ]
    }

    fn marker_for(&self, kind: FilterKind) -> &str {
        match kind {
            FilterKind::Toggle => &self.selectors.filter_active_marker,
            FilterKind::Expander => &self.selectors.expander_open_marker,
        }
    }

    /// Make sure every required filter is active. Retries with linear
    /// backoff; exhaustion logs one error and returns false.
    pub async fn ensure_filters(&self, page: &dyn Page, flags: &mut ViewStateFlags) -> bool {
        let attempts = self.filters.retries.max(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.assert_all(page).await {
                Ok(clicks) => {
                    if flags.had_error {
                        info!("Filters restored after earlier failure");
                    } else if !flags.asserted_once {
                        info!(clicks, "Filters asserted");
                    } else {
                        debug!(clicks, "Filters re-asserted");
                    }
                    flags.asserted_once = true;
                    flags.had_error = false;
                    return true;
                }
                Err(e) => {
                    debug!(attempt, error = %e, "Filter assertion attempt failed");
                    last_error = Some(e);
                    if attempt < attempts {
                        page.wait(Duration::from_millis(
                            self.filters.backoff_ms * u64::from(attempt),
                        ))
                        .await;
                    }
                }
            }
        }

        error!(
            attempts,
            error = %last_error.map(|e| e.to_string()).unwrap_or_default(),
            "Failed to assert conversation filters"
        );
        flags.had_error = true;
        false
    }

    /// One pass over every required filter. Returns how many were clicked.
    async fn assert_all(&self, page: &dyn Page) -> Result<usize> {
        let mut clicks = 0;
        for spec in &self.filters.required {
            if self.assert_one(page, spec).await? {
                clicks += 1;
            }
        }
        Ok(clicks)
    }

    async fn assert_one(&self, page: &dyn Page, spec: &FilterSpec) -> Result<bool> {
        let strategies = self.strategies(&spec.label);
        let control = first_present_within(page, &strategies, self.element_timeout)
            .await?
            .ok_or_else(|| Error::NotFound(format!("filter \"{}\"", spec.label)))?
            .first();

        if page.has_marker(&control, self.marker_for(spec.kind)).await? {
            debug!(filter = %spec.label, "Filter already active");
            return Ok(false);
        }

        click_with_fallback(page, &control, self.element_timeout).await?;
        debug!(filter = %spec.label, locator = %control, "Filter clicked");
        Ok(true)
    }
}
