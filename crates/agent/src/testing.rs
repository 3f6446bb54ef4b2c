//! In-memory seller-chat page for the agent tests.

use async_trait::async_trait;
use autoreply_browser::{Locator, Page};
use autoreply_core::{Error, Result, SelectorConfig};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub title: String,
    /// Text of the unread badge; `None` means no unread container.
    pub badge: Option<String>,
    pub last_message: String,
    /// Scroll offset at which the row gets rendered.
    pub reveal_at: f64,
    /// Whether the title candidates find anything in this row.
    pub titled: bool,
}

impl FakeRow {
    pub fn read(title: &str) -> Self {
        Self {
            title: title.to_string(),
            badge: None,
            last_message: String::new(),
            reveal_at: 0.0,
            titled: true,
        }
    }

    pub fn unread(title: &str, badge: &str) -> Self {
        Self {
            badge: Some(badge.to_string()),
            last_message: "kak, ready?".to_string(),
            ..Self::read(title)
        }
    }

    pub fn revealed_at(mut self, offset: f64) -> Self {
        self.reveal_at = offset;
        self
    }

    pub fn untitled(mut self) -> Self {
        self.titled = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Textarea,
    ContentEditable,
    /// Only the generic fallback selector finds the input.
    Fallback,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    ExactText,
    Role,
    ContainsText,
}

#[derive(Debug, Clone)]
pub struct FakeFilter {
    pub active: bool,
    /// Strategies that find the control; empty means it is not rendered.
    pub found_by: Vec<Strategy>,
}

impl FakeFilter {
    pub fn inactive() -> Self {
        Self {
            active: false,
            found_by: vec![Strategy::ExactText, Strategy::Role, Strategy::ContainsText],
        }
    }
}

#[derive(Debug)]
pub struct FakeState {
    pub url: String,
    pub on_target: bool,
    pub login: bool,
    /// Whether a navigation lands on the conversation list.
    pub goto_lands_on_target: bool,
    pub rows: Vec<FakeRow>,
    pub scroll: f64,
    pub filters: HashMap<String, FakeFilter>,
    pub input: InputKind,
    pub pointer_click_fails: bool,
    pub mark_read_on_reply: bool,
    /// Row id of the open conversation.
    pub opened: Option<usize>,
    /// Typed but not yet submitted input.
    pub buffer: String,

    pub clicks: Vec<String>,
    pub dom_clicks: Vec<String>,
    pub filter_clicks: Vec<String>,
    pub sent: Vec<String>,
    pub wheel: Vec<f64>,
    pub hovers: usize,
    pub waits: Vec<Duration>,
    pub gotos: usize,
    pub reloads: usize,
    pub titles: Vec<String>,
}

impl Default for FakeState {
    fn default() -> Self {
        let mut filters = HashMap::new();
        filters.insert("Semua Chat".to_string(), FakeFilter::inactive());
        filters.insert("Semua Pembeli".to_string(), FakeFilter::inactive());
        Self {
            url: "https://seller.shopee.co.id/new-webchat/conversations".to_string(),
            on_target: true,
            login: false,
            goto_lands_on_target: true,
            rows: Vec::new(),
            scroll: 0.0,
            filters,
            input: InputKind::Textarea,
            pointer_click_fails: false,
            mark_read_on_reply: true,
            opened: None,
            buffer: String::new(),
            clicks: Vec::new(),
            dom_clicks: Vec::new(),
            filter_clicks: Vec::new(),
            sent: Vec::new(),
            wheel: Vec::new(),
            hovers: 0,
            waits: Vec::new(),
            gotos: 0,
            reloads: 0,
            titles: Vec::new(),
        }
    }
}

impl FakeState {
    fn rendered(&self) -> Vec<usize> {
        if !self.on_target {
            return Vec::new();
        }
        self.rows
            .iter()
            .enumerate()
            .filter(|(_, r)| r.reveal_at <= self.scroll)
            .map(|(i, _)| i)
            .collect()
    }

    /// Row id of the `n`th rendered row.
    fn row(&self, n: usize) -> Option<usize> {
        self.rendered().get(n).copied()
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    List,
    Cells,
    Login,
    Row(usize),
    Indicator(usize),
    Badge(usize),
    Title(usize, usize),
    Message,
    Input(InputKind),
    Filter(String, Strategy),
    Unknown,
}

pub struct FakePage {
    selectors: SelectorConfig,
    state: Mutex<FakeState>,
}

impl FakePage {
    pub fn new(state: FakeState) -> Self {
        Self {
            selectors: SelectorConfig::default(),
            state: Mutex::new(state),
        }
    }

    pub fn with_rows(rows: Vec<FakeRow>) -> Self {
        Self::new(FakeState {
            rows,
            ..FakeState::default()
        })
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn resolve(&self, locator: &Locator) -> Target {
        let sel = &self.selectors;
        match locator {
            Locator::Css(css) if css == &sel.conversation_list => Target::List,
            Locator::Css(css) if css == &sel.conversation_cell => Target::Cells,
            Locator::Css(css) if css == &sel.login_indicators => Target::Login,
            Locator::Css(css) if css == &sel.message_content => Target::Message,
            Locator::Css(css) if css == &sel.chat_input_textarea => Target::Input(InputKind::Textarea),
            Locator::Css(css) if css == &sel.chat_input_contenteditable => {
                Target::Input(InputKind::ContentEditable)
            }
            Locator::Css(css) if css == &sel.chat_input_fallback => Target::Input(InputKind::Fallback),
            Locator::Nth(inner, n) => match self.resolve(inner) {
                Target::Cells => Target::Row(*n),
                other => other,
            },
            Locator::Last(inner) => self.resolve(inner),
            Locator::Within(inner, css) => match self.resolve(inner) {
                Target::Row(n) if css == &sel.unread_indicator => Target::Indicator(n),
                Target::Indicator(n) if css == &sel.unread_badge => Target::Badge(n),
                Target::Row(n) => match sel.chat_title_candidates.iter().position(|c| c == css) {
                    Some(idx) => Target::Title(n, idx),
                    None => Target::Unknown,
                },
                _ => Target::Unknown,
            },
            Locator::ExactText { text, .. } => Target::Filter(text.clone(), Strategy::ExactText),
            Locator::Role { name, .. } => Target::Filter(name.clone(), Strategy::Role),
            Locator::ContainsText { text, .. } => {
                Target::Filter(text.clone(), Strategy::ContainsText)
            }
            _ => Target::Unknown,
        }
    }

    fn count_in(state: &FakeState, target: &Target) -> usize {
        let row = |n: &usize| state.row(*n).map(|id| &state.rows[id]);
        let found = match target {
            Target::List => state.on_target,
            Target::Cells => return state.rendered().len(),
            Target::Login => state.login,
            Target::Row(n) => row(n).is_some(),
            Target::Indicator(n) | Target::Badge(n) => {
                row(n).map(|r| r.badge.is_some()).unwrap_or(false)
            }
            Target::Title(n, idx) => *idx == 0 && row(n).map(|r| r.titled).unwrap_or(false),
            Target::Message => state.opened.is_some(),
            Target::Input(kind) => {
                state.opened.is_some()
                    && match (kind, state.input) {
                        (_, InputKind::Missing) => false,
                        (InputKind::Fallback, _) => true,
                        (wanted, actual) => *wanted == actual,
                    }
            }
            Target::Filter(label, strategy) => state
                .filters
                .get(label)
                .map(|f| f.found_by.contains(strategy))
                .unwrap_or(false),
            Target::Unknown => false,
        };
        found as usize
    }

    fn not_found(locator: &Locator) -> Error {
        Error::NotFound(locator.to_string())
    }
}

#[async_trait]
impl Page for FakePage {
    async fn count(&self, locator: &Locator) -> Result<usize> {
        let target = self.resolve(locator);
        Ok(Self::count_in(&self.state(), &target))
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let target = self.resolve(locator);
        let mut state = self.state();
        if Self::count_in(&state, &target) == 0 {
            return Err(Self::not_found(locator));
        }
        match target {
            Target::Filter(label, _) => {
                state.clicks.push(locator.to_string());
                state.filter_clicks.push(label.clone());
                if let Some(filter) = state.filters.get_mut(&label) {
                    filter.active = true;
                }
                Ok(())
            }
            Target::Row(n) => {
                if state.pointer_click_fails {
                    return Err(Error::NotFound(format!("{} (not visible)", locator)));
                }
                state.clicks.push(locator.to_string());
                state.opened = state.row(n);
                Ok(())
            }
            _ => Err(Self::not_found(locator)),
        }
    }

    async fn dom_click(&self, locator: &Locator) -> Result<()> {
        let target = self.resolve(locator);
        let mut state = self.state();
        match target {
            Target::Row(n) if state.row(n).is_some() => {
                state.dom_clicks.push(locator.to_string());
                state.opened = state.row(n);
                Ok(())
            }
            _ => Err(Self::not_found(locator)),
        }
    }

    async fn hover(&self, locator: &Locator) -> Result<()> {
        let target = self.resolve(locator);
        let mut state = self.state();
        if Self::count_in(&state, &target) == 0 {
            return Err(Self::not_found(locator));
        }
        state.hovers += 1;
        Ok(())
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        let target = self.resolve(locator);
        let state = self.state();
        let row = |n: usize| state.row(n).map(|id| &state.rows[id]);
        Ok(match target {
            Target::Badge(n) => row(n).and_then(|r| r.badge.clone()),
            Target::Title(n, 0) => row(n).filter(|r| r.titled).map(|r| r.title.clone()),
            Target::Row(n) => row(n).map(|r| {
                if r.titled {
                    format!("{} {}", r.title, r.last_message)
                } else {
                    r.last_message.clone()
                }
            }),
            Target::Message => state.opened.map(|id| state.rows[id].last_message.clone()),
            _ => None,
        })
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let target = self.resolve(locator);
        let state = self.state();
        Ok(match target {
            Target::Title(n, 0) if name == "title" => state
                .row(n)
                .map(|id| &state.rows[id])
                .filter(|r| r.titled)
                .map(|r| r.title.clone()),
            _ => None,
        })
    }

    async fn has_marker(&self, locator: &Locator, _marker: &str) -> Result<bool> {
        let target = self.resolve(locator);
        let state = self.state();
        Ok(match target {
            Target::Filter(label, _) => state.filters.get(&label).map(|f| f.active).unwrap_or(false),
            _ => false,
        })
    }

    async fn type_text(&self, locator: &Locator, text: &str, _delay: Duration) -> Result<()> {
        let target = self.resolve(locator);
        let mut state = self.state();
        if !matches!(target, Target::Input(_)) || Self::count_in(&state, &target) == 0 {
            return Err(Self::not_found(locator));
        }
        state.buffer.push_str(text);
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<()> {
        let target = self.resolve(locator);
        let mut state = self.state();
        if !matches!(target, Target::Input(_)) || Self::count_in(&state, &target) == 0 {
            return Err(Self::not_found(locator));
        }
        if key == "Enter" {
            let line = std::mem::take(&mut state.buffer);
            state.sent.push(line);
            if state.mark_read_on_reply {
                if let Some(id) = state.opened {
                    state.rows[id].badge = None;
                }
            }
        }
        Ok(())
    }

    async fn wheel(&self, delta_y: f64) -> Result<()> {
        let mut state = self.state();
        state.wheel.push(delta_y);
        state.scroll = (state.scroll + delta_y).max(0.0);
        Ok(())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.state().url.clone())
    }

    async fn goto(&self, url: &str, _timeout: Duration) -> Result<()> {
        let mut state = self.state();
        state.gotos += 1;
        state.url = url.to_string();
        state.on_target = state.goto_lands_on_target;
        state.opened = None;
        state.scroll = 0.0;
        Ok(())
    }

    async fn reload(&self, _timeout: Duration) -> Result<()> {
        self.state().reloads += 1;
        Ok(())
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        self.state().titles.push(title.to_string());
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        self.state().waits.push(duration);
    }
}
