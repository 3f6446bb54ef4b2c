use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;
use crate::paths::Paths;
use crate::types::Account;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimingConfig {
    /// Sleep between iterations that found nothing to reply to.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// How often the list filters are re-asserted even without drift.
    #[serde(default = "default_reassert_filter_ms")]
    pub reassert_filter_ms: u64,
    /// Pause after handling (or skipping) a found row.
    #[serde(default = "default_after_row_pause_ms")]
    pub after_row_pause_ms: u64,
    /// Cooldown after an iteration failed and the page was recovered.
    #[serde(default = "default_error_cooldown_ms")]
    pub error_cooldown_ms: u64,
    /// Per-character typing delay for reply lines.
    #[serde(default = "default_typing_delay_ms")]
    pub typing_delay_ms: u64,
    /// Pause between two submitted reply lines.
    #[serde(default = "default_line_pause_ms")]
    pub line_pause_ms: u64,
    /// Ceiling for the human-in-the-loop login wait.
    #[serde(default = "default_login_timeout_ms")]
    pub login_timeout_ms: u64,
    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    /// Bound on the url/list/login race that follows a navigation.
    #[serde(default = "default_settle_race_ms")]
    pub settle_race_ms: u64,
    #[serde(default = "default_reload_timeout_ms")]
    pub reload_timeout_ms: u64,
    /// Capped wait used by individual element lookups and clicks.
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
    /// Wait used when probing whether the page is the login form or the list.
    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    5_000
}

fn default_reassert_filter_ms() -> u64 {
    60_000
}

fn default_after_row_pause_ms() -> u64 {
    800
}

fn default_error_cooldown_ms() -> u64 {
    3_000
}

fn default_typing_delay_ms() -> u64 {
    40
}

fn default_line_pause_ms() -> u64 {
    150
}

fn default_login_timeout_ms() -> u64 {
    5 * 60_000
}

fn default_navigation_timeout_ms() -> u64 {
    90_000
}

fn default_settle_race_ms() -> u64 {
    30_000
}

fn default_reload_timeout_ms() -> u64 {
    60_000
}

fn default_element_timeout_ms() -> u64 {
    10_000
}

fn default_probe_timeout_ms() -> u64 {
    5_000
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            reassert_filter_ms: default_reassert_filter_ms(),
            after_row_pause_ms: default_after_row_pause_ms(),
            error_cooldown_ms: default_error_cooldown_ms(),
            typing_delay_ms: default_typing_delay_ms(),
            line_pause_ms: default_line_pause_ms(),
            login_timeout_ms: default_login_timeout_ms(),
            navigation_timeout_ms: default_navigation_timeout_ms(),
            settle_race_ms: default_settle_race_ms(),
            reload_timeout_ms: default_reload_timeout_ms(),
            element_timeout_ms: default_element_timeout_ms(),
            probe_timeout_ms: default_probe_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrollConfig {
    #[serde(default = "default_scroll_down_steps")]
    pub down_steps: u32,
    #[serde(default = "default_scroll_down_pixels")]
    pub down_pixels: f64,
    #[serde(default = "default_scroll_up_pixels")]
    pub up_pixels: f64,
    #[serde(default = "default_scroll_top_passes")]
    pub top_passes: u32,
    #[serde(default = "default_scroll_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_scroll_up_settle_ms")]
    pub up_settle_ms: u64,
}

fn default_scroll_down_steps() -> u32 {
    4
}

fn default_scroll_down_pixels() -> f64 {
    600.0
}

fn default_scroll_up_pixels() -> f64 {
    2000.0
}

fn default_scroll_top_passes() -> u32 {
    6
}

fn default_scroll_settle_ms() -> u64 {
    400
}

fn default_scroll_up_settle_ms() -> u64 {
    180
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            down_steps: default_scroll_down_steps(),
            down_pixels: default_scroll_down_pixels(),
            up_pixels: default_scroll_up_pixels(),
            top_passes: default_scroll_top_passes(),
            settle_ms: default_scroll_settle_ms(),
            up_settle_ms: default_scroll_up_settle_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    #[serde(default = "default_max_username_length")]
    pub max_username_length: usize,
}

fn default_max_message_length() -> usize {
    25
}

fn default_max_username_length() -> usize {
    18
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_message_length: default_max_message_length(),
            max_username_length: default_max_username_length(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathsConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_browser_data_dir")]
    pub browser_data_dir: String,
    #[serde(default = "default_logs_dir")]
    pub logs_dir: String,
}

fn default_data_dir() -> String {
    "./data".to_string()
}

fn default_browser_data_dir() -> String {
    "./browser-data".to_string()
}

fn default_logs_dir() -> String {
    "./logs".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            browser_data_dir: default_browser_data_dir(),
            logs_dir: default_logs_dir(),
        }
    }
}

/// Which of the two filter shapes a list filter has.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterKind {
    /// A tab-like toggle; active when it carries the active marker.
    Toggle,
    /// A dropdown-like expander; open when it carries the open marker.
    Expander,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub label: String,
    pub kind: FilterKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterConfig {
    #[serde(default = "default_filters")]
    pub required: Vec<FilterSpec>,
    #[serde(default = "default_filter_retries")]
    pub retries: u32,
    /// Linear backoff unit: attempt `n` waits `n * backoff_ms`.
    #[serde(default = "default_filter_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_filters() -> Vec<FilterSpec> {
    vec![
        FilterSpec {
            label: "Semua Chat".to_string(),
            kind: FilterKind::Toggle,
        },
        FilterSpec {
            label: "Semua Pembeli".to_string(),
            kind: FilterKind::Expander,
        },
    ]
}

fn default_filter_retries() -> u32 {
    3
}

fn default_filter_backoff_ms() -> u64 {
    600
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            required: default_filters(),
            retries: default_filter_retries(),
            backoff_ms: default_filter_backoff_ms(),
        }
    }
}

/// CSS selectors for the target storefront. Kept in config so the locator
/// strategies can be pointed at a different surface without code changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectorConfig {
    #[serde(default = "default_conversation_list")]
    pub conversation_list: String,
    #[serde(default = "default_conversation_list_wrapper")]
    pub conversation_list_wrapper: String,
    #[serde(default = "default_conversation_cell")]
    pub conversation_cell: String,
    #[serde(default = "default_chat_title_candidates")]
    pub chat_title_candidates: Vec<String>,
    #[serde(default = "default_login_indicators")]
    pub login_indicators: String,
    #[serde(default = "default_nav_wrapper")]
    pub nav_wrapper: String,
    #[serde(default = "default_chat_input_textarea")]
    pub chat_input_textarea: String,
    #[serde(default = "default_chat_input_contenteditable")]
    pub chat_input_contenteditable: String,
    #[serde(default = "default_chat_input_fallback")]
    pub chat_input_fallback: String,
    #[serde(default = "default_message_content")]
    pub message_content: String,
    /// Container inside a row that holds the unread badge.
    #[serde(default = "default_unread_indicator")]
    pub unread_indicator: String,
    /// Badge element inside the unread container.
    #[serde(default = "default_unread_badge")]
    pub unread_badge: String,
    #[serde(default = "default_filter_active_marker")]
    pub filter_active_marker: String,
    #[serde(default = "default_expander_open_marker")]
    pub expander_open_marker: String,
    /// Regex the page URL must match to count as the conversation view.
    #[serde(default = "default_target_url_pattern")]
    pub target_url_pattern: String,
}

fn default_conversation_list() -> String {
    r#"[data-cy="webchat-conversation-list"]"#.to_string()
}

fn default_conversation_list_wrapper() -> String {
    r#"[data-cy="webchat-conversation-list-wrapper"]"#.to_string()
}

fn default_conversation_cell() -> String {
    r#"[data-cy="webchat-conversation-cell-container"], ._76X82Hdj2p"#.to_string()
}

fn default_chat_title_candidates() -> Vec<String> {
    vec![
        "._2-8iOrKyky[title]".to_string(),
        "._2-8iOrKyky".to_string(),
        r#"[data-cy="webchat-conversation-cell-container"] [title]"#.to_string(),
        "[title]".to_string(),
    ]
}

fn default_login_indicators() -> String {
    r#"input[name="loginKey"], input[type="password"], [data-testid*="login"]"#.to_string()
}

fn default_nav_wrapper() -> String {
    r#"div[role="navigation"], [data-cy="webchat-conversation-list-wrapper"]"#.to_string()
}

fn default_chat_input_textarea() -> String {
    "textarea".to_string()
}

fn default_chat_input_contenteditable() -> String {
    r#"[contenteditable="true"]"#.to_string()
}

fn default_chat_input_fallback() -> String {
    "textarea, [contenteditable='true']".to_string()
}

fn default_message_content() -> String {
    r#"[data-cy="webchat-message-content"], .message-content"#.to_string()
}

fn default_unread_indicator() -> String {
    r#"[data-cy="webchat-conversation-cell-unread"], [class*="unread"]"#.to_string()
}

fn default_unread_badge() -> String {
    r#"[class*="badge"], [class*="count"], span"#.to_string()
}

fn default_filter_active_marker() -> String {
    r#"[class*="active"], [class*="selected"], [aria-selected="true"], [aria-pressed="true"]"#
        .to_string()
}

fn default_expander_open_marker() -> String {
    r#"[aria-expanded="true"], [class*="expanded"], [class*="open"]"#.to_string()
}

fn default_target_url_pattern() -> String {
    r"(?i)webchat/conversations".to_string()
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            conversation_list: default_conversation_list(),
            conversation_list_wrapper: default_conversation_list_wrapper(),
            conversation_cell: default_conversation_cell(),
            chat_title_candidates: default_chat_title_candidates(),
            login_indicators: default_login_indicators(),
            nav_wrapper: default_nav_wrapper(),
            chat_input_textarea: default_chat_input_textarea(),
            chat_input_contenteditable: default_chat_input_contenteditable(),
            chat_input_fallback: default_chat_input_fallback(),
            message_content: default_message_content(),
            unread_indicator: default_unread_indicator(),
            unread_badge: default_unread_badge(),
            filter_active_marker: default_filter_active_marker(),
            expander_open_marker: default_expander_open_marker(),
            target_url_pattern: default_target_url_pattern(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub headless: bool,
    #[serde(default = "default_chat_url")]
    pub chat_url: String,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default = "default_reply_lines")]
    pub reply_lines: Vec<String>,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub scroll: ScrollConfig,
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub filters: FilterConfig,
    #[serde(default)]
    pub selectors: SelectorConfig,
}

fn default_chat_url() -> String {
    "https://seller.shopee.co.id/new-webchat/conversations".to_string()
}

fn default_reply_lines() -> Vec<String> {
    vec!["ready kk kuh, d proses otomatis setelah checkout ya :)".to_string()]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            headless: false,
            chat_url: default_chat_url(),
            accounts: Vec::new(),
            reply_lines: default_reply_lines(),
            timing: TimingConfig::default(),
            scroll: ScrollConfig::default(),
            log: LogConfig::default(),
            paths: PathsConfig::default(),
            filters: FilterConfig::default(),
            selectors: SelectorConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// File config overlaid with the process environment.
    pub fn load_with_env(path: &Path) -> Result<Self> {
        let mut config = Self::load_or_default(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Overlay recognized environment variables. Numbers that fail to parse
    /// keep their current value.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("HEADLESS") {
            self.headless = v.trim().eq_ignore_ascii_case("true");
        }
        if let Some(v) = lookup("CHAT_URL").or_else(|| lookup("SHOPEE_CHAT_URL")) {
            if !v.trim().is_empty() {
                self.chat_url = v.trim().to_string();
            }
        }
        if let Some(raw) = lookup("STORES") {
            self.accounts = parse_accounts(&raw, &lookup);
        }
        if let Some(raw) = lookup("REPLY_LINES") {
            let lines = parse_reply_lines(&raw);
            if !lines.is_empty() {
                self.reply_lines = lines;
            }
        }

        override_num(&lookup, "POLL_INTERVAL_MS", &mut self.timing.poll_interval_ms);
        override_num(&lookup, "REASSERT_FILTER_MS", &mut self.timing.reassert_filter_ms);
        override_num(&lookup, "SCROLL_DOWN_STEPS", &mut self.scroll.down_steps);
        override_num(&lookup, "MAX_MSG_LENGTH", &mut self.log.max_message_length);
        override_num(&lookup, "MAX_USERNAME_LENGTH", &mut self.log.max_username_length);

        if let Some(v) = lookup("DATA_DIR") {
            self.paths.data_dir = v;
        }
        if let Some(v) = lookup("BROWSER_DATA_DIR") {
            self.paths.browser_data_dir = v;
        }
        if let Some(v) = lookup("LOGS_DIR") {
            self.paths.logs_dir = v;
        }
    }

    pub fn paths(&self) -> Paths {
        Paths::new(
            PathBuf::from(&self.paths.data_dir),
            PathBuf::from(&self.paths.browser_data_dir),
            PathBuf::from(&self.paths.logs_dir),
        )
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|a| a.id.eq_ignore_ascii_case(id))
    }
}

fn parse_accounts<F>(raw: &str, lookup: &F) -> Vec<Account>
where
    F: Fn(&str) -> Option<String>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|id| {
            let mut account = Account::new(id);
            if let Some(name) = lookup(&format!("STORE_{}_NAME", id)) {
                account = account.with_name(name);
            }
            if let Some(emoji) = lookup(&format!("STORE_{}_EMOJI", id)) {
                account = account.with_emoji(emoji);
            }
            account
        })
        .collect()
}

/// Reply lines are separated by `||`; blank segments are dropped.
pub fn parse_reply_lines(raw: &str) -> Vec<String> {
    raw.split("||")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn override_num<F, T>(lookup: &F, key: &str, target: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr + PartialOrd + Default,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        // zero is treated as unset
        Ok(parsed) if parsed > T::default() => *target = parsed,
        Ok(_) => {}
        Err(_) => warn!(key, value = %raw, "Ignoring non-numeric environment override"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert!(!cfg.headless);
        assert!(cfg.accounts.is_empty());
        assert_eq!(cfg.timing.poll_interval_ms, 5000);
        assert_eq!(cfg.timing.reassert_filter_ms, 60000);
        assert_eq!(cfg.scroll.down_steps, 4);
        assert_eq!(cfg.filters.required.len(), 2);
        assert_eq!(cfg.filters.required[1].kind, FilterKind::Expander);
    }

    #[test]
    fn test_env_accounts_with_overrides() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("STORES", " TOKO1, ,TOKO2 "),
            ("STORE_TOKO1_NAME", "Multi Zone"),
            ("STORE_TOKO1_EMOJI", "🟢"),
        ]));
        assert_eq!(cfg.accounts.len(), 2);
        assert_eq!(cfg.accounts[0].name, "Multi Zone");
        assert_eq!(cfg.accounts[0].emoji, "🟢");
        assert_eq!(cfg.accounts[0].folder, "toko1");
        assert_eq!(cfg.accounts[1].name, "TOKO2");
        assert!(cfg.account("toko2").is_some());
    }

    #[test]
    fn test_env_reply_lines_and_numbers() {
        let mut cfg = Config::default();
        cfg.apply_env(env(&[
            ("REPLY_LINES", "halo kak || siap kirim hari ini ||  "),
            ("POLL_INTERVAL_MS", "2500"),
            ("REASSERT_FILTER_MS", "abc"),
            ("SCROLL_DOWN_STEPS", "0"),
            ("HEADLESS", "TRUE"),
        ]));
        assert_eq!(cfg.reply_lines, vec!["halo kak", "siap kirim hari ini"]);
        assert_eq!(cfg.timing.poll_interval_ms, 2500);
        assert_eq!(cfg.timing.reassert_filter_ms, 60000);
        assert_eq!(cfg.scroll.down_steps, 4);
        assert!(cfg.headless);
    }

    #[test]
    fn test_partial_json() {
        let raw = r#"{
  "accounts": [{ "id": "TOKO1", "name": "Satu", "emoji": "🔵", "folder": "toko1" }],
  "timing": { "pollIntervalMs": 1000 }
}"#;
        let cfg: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.accounts[0].label(), "🔵 Satu");
        assert_eq!(cfg.timing.poll_interval_ms, 1000);
        assert_eq!(cfg.timing.error_cooldown_ms, 3000);
        assert_eq!(cfg.selectors.chat_title_candidates.len(), 4);
    }

    #[test]
    fn test_load_file_then_env() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("autoreply.json");
        assert!(Config::load_or_default(&path).unwrap().accounts.is_empty());

        std::fs::write(
            &path,
            r#"{"accounts": [{"id": "TOKO9", "name": "Sembilan", "emoji": "🔵", "folder": "toko9"}]}"#,
        )
        .unwrap();
        let mut cfg = Config::load_or_default(&path).unwrap();
        assert_eq!(cfg.account("toko9").map(|a| a.name.as_str()), Some("Sembilan"));

        cfg.apply_env(env(&[("STORES", "TOKO1")]));
        assert_eq!(cfg.accounts, vec![Account::new("TOKO1")]);
    }
}
