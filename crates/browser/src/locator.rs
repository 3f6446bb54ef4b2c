//! Element locators and ordered locator strategies.
//!
//! A [`Locator`] describes how to find elements; [`Locator::to_js`] compiles
//! it to a script expression yielding an `Element[]` in document order.

use autoreply_core::Result;
use serde_json::Value;
use std::time::Duration;

use crate::page::{Page, POLL_INTERVAL};

/// Helpers every compiled locator script may use.
pub(crate) const PRELUDE: &str = concat!(
    "const __visible = (el) => { if (!el || !el.isConnected) return false;",
    " const s = window.getComputedStyle(el);",
    " if (s.visibility === 'hidden' || s.display === 'none') return false;",
    " const r = el.getBoundingClientRect(); return r.width > 0 && r.height > 0; };",
    " const __text = (el) => (el.innerText || el.textContent || '').trim();",
    " const __name = (el) => (el.getAttribute('aria-label') || el.getAttribute('title') || __text(el));",
    " const __all = (root, sel) => Array.from(root.querySelectorAll(sel));",
);

#[derive(Debug, Clone, PartialEq)]
pub enum Locator {
    /// Every element matching a CSS selector.
    Css(String),
    /// Descendants matching `css` of every element the parent yields.
    Within(Box<Locator>, String),
    Nth(Box<Locator>, usize),
    Last(Box<Locator>),
    /// Visible innermost element inside `scope` whose trimmed text equals `text`.
    ExactText { scope: String, text: String },
    /// Elements with an explicit or implicit `role` whose accessible name
    /// matches `name` (case-insensitive regex).
    Role { role: String, name: String },
    /// Visible `tag` elements inside the first `scope` element whose text
    /// contains `text`.
    ContainsText {
        scope: String,
        tag: String,
        text: String,
    },
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css(selector.into())
    }

    pub fn within(&self, selector: impl Into<String>) -> Self {
        Locator::Within(Box::new(self.clone()), selector.into())
    }

    pub fn nth(&self, index: usize) -> Self {
        Locator::Nth(Box::new(self.clone()), index)
    }

    pub fn first(&self) -> Self {
        self.nth(0)
    }

    pub fn last(&self) -> Self {
        Locator::Last(Box::new(self.clone()))
    }

    pub fn exact_text(scope: impl Into<String>, text: impl Into<String>) -> Self {
        Locator::ExactText {
            scope: scope.into(),
            text: text.into(),
        }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn contains_text(
        scope: impl Into<String>,
        tag: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Locator::ContainsText {
            scope: scope.into(),
            tag: tag.into(),
            text: text.into(),
        }
    }

    /// Expression evaluating to the matched `Element[]`. Requires [`PRELUDE`].
    pub fn to_js(&self) -> String {
        match self {
            Locator::Css(sel) => format!("__all(document, {})", js_str(sel)),
            Locator::Within(parent, sel) => format!(
                "({}).flatMap((p) => __all(p, {}))",
                parent.to_js(),
                js_str(sel)
            ),
            Locator::Nth(parent, n) => format!("({}).slice({}, {})", parent.to_js(), n, n + 1),
            Locator::Last(parent) => format!("({}).slice(-1)", parent.to_js()),
            Locator::ExactText { scope, text } => format!(
                concat!(
                    "((t) => __all(document, {scope}).flatMap((s) => __all(s, '*'))",
                    ".filter((el) => __visible(el) && __text(el) === t",
                    " && !Array.from(el.children).some((c) => __text(c) === t)))({text})"
                ),
                scope = js_str(scope),
                text = js_str(text),
            ),
            Locator::Role { role, name } => format!(
                concat!(
                    "((re) => __all(document, {sel})",
                    ".filter((el) => __visible(el) && re.test(__name(el))))(new RegExp({name}, 'i'))"
                ),
                sel = js_str(&role_selector(role)),
                name = js_str(name),
            ),
            Locator::ContainsText { scope, tag, text } => format!(
                concat!(
                    "((t) => __all(document, {scope}).slice(0, 1).flatMap((s) => __all(s, {tag}))",
                    ".filter((el) => __visible(el) && __text(el).includes(t)))({text})"
                ),
                scope = js_str(scope),
                tag = js_str(tag),
                text = js_str(text),
            ),
        }
    }

    /// Self-invoking script that binds the matches to `els` and runs `body`.
    pub fn script(&self, body: &str) -> String {
        format!(
            "(() => {{ {} const els = {}; {} }})()",
            PRELUDE,
            self.to_js(),
            body
        )
    }
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Locator::Css(sel) => write!(f, "{}", sel),
            Locator::Within(parent, sel) => write!(f, "{} >> {}", parent, sel),
            Locator::Nth(parent, n) => write!(f, "{} >> nth={}", parent, n),
            Locator::Last(parent) => write!(f, "{} >> last", parent),
            Locator::ExactText { scope, text } => write!(f, "{} >> text=\"{}\"", scope, text),
            Locator::Role { role, name } => write!(f, "role={}[name=/{}/i]", role, name),
            Locator::ContainsText { scope, tag, text } => {
                write!(f, "{} >> {}:has-text(\"{}\")", scope, tag, text)
            }
        }
    }
}

fn role_selector(role: &str) -> String {
    let implicit = match role {
        "button" => ", button, input[type=\"button\"], input[type=\"submit\"]",
        "link" => ", a[href]",
        "textbox" => ", textarea, input:not([type])",
        _ => "",
    };
    format!("[role=\"{}\"]{}", role, implicit)
}

/// Quote a Rust string as a JavaScript string literal.
fn js_str(raw: &str) -> String {
    Value::String(raw.to_string()).to_string()
}

/// Evaluate `candidates` in order and return the first that matches at least
/// one element.
pub async fn first_present<'a>(
    page: &dyn Page,
    candidates: &'a [Locator],
) -> Result<Option<&'a Locator>> {
    for candidate in candidates {
        if page.count(candidate).await? > 0 {
            return Ok(Some(candidate));
        }
    }
    Ok(None)
}

/// Like [`first_present`], but keeps polling the whole list until one
/// strategy matches or `timeout` passes.
pub async fn first_present_within<'a>(
    page: &dyn Page,
    candidates: &'a [Locator],
    timeout: Duration,
) -> Result<Option<&'a Locator>> {
    let mut waited = Duration::ZERO;
    loop {
        if let Some(found) = first_present(page, candidates).await? {
            return Ok(Some(found));
        }
        if waited >= timeout {
            return Ok(None);
        }
        page.wait(POLL_INTERVAL).await;
        waited += POLL_INTERVAL;
    }
}
