//! The page surface the reply loop drives.
//!
//! [`Page`] is the seam between the reply logic and the browser: the agent
//! crate only talks to `dyn Page`, [`CdpPage`] implements it over CDP.

use async_trait::async_trait;
use autoreply_core::{Error, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::cdp::{parse_key_spec, CdpClient};
use crate::locator::Locator;

/// Poll step used by the default wait helpers.
pub const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[async_trait]
pub trait Page: Send + Sync {
    /// Number of elements the locator currently matches.
    async fn count(&self, locator: &Locator) -> Result<usize>;

    /// Pointer click at the center of the first match.
    async fn click(&self, locator: &Locator) -> Result<()>;

    /// `element.click()` on the first match, bypassing hit-testing.
    async fn dom_click(&self, locator: &Locator) -> Result<()>;

    /// Move the pointer over the first match.
    async fn hover(&self, locator: &Locator) -> Result<()>;

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>>;

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// Whether the first match, one of its close ancestors or one of its
    /// descendants matches the CSS `marker`.
    async fn has_marker(&self, locator: &Locator, marker: &str) -> Result<bool>;

    /// Focus the first match and type `text` one character at a time.
    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> Result<()>;

    /// Focus the first match and press a key such as "Enter".
    async fn press(&self, locator: &Locator, key: &str) -> Result<()>;

    /// Emit a wheel event at the current pointer position.
    async fn wheel(&self, delta_y: f64) -> Result<()>;

    async fn url(&self) -> Result<String>;

    /// Navigate and wait for the document to become interactive.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<()>;

    async fn reload(&self, timeout: Duration) -> Result<()>;

    async fn set_title(&self, title: &str) -> Result<()>;

    /// Suspend for `duration`. Every pause in the reply loop goes through here.
    async fn wait(&self, duration: Duration);

    /// Poll until the locator matches, or fail with [`Error::Timeout`].
    async fn wait_for(&self, locator: &Locator, timeout: Duration) -> Result<()> {
        let mut waited = Duration::ZERO;
        loop {
            if self.count(locator).await.unwrap_or(0) > 0 {
                return Ok(());
            }
            if waited >= timeout {
                return Err(Error::Timeout(format!("waiting for {}", locator)));
            }
            self.wait(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }
}

/// Wait for `locator`, then pointer-click it; a failed pointer click falls
/// back to a DOM-level click.
pub async fn click_with_fallback(page: &dyn Page, locator: &Locator, timeout: Duration) -> Result<()> {
    page.wait_for(locator, timeout).await?;
    if let Err(e) = page.click(locator).await {
        debug!(locator = %locator, error = %e, "Pointer click failed, using DOM click");
        page.dom_click(locator).await?;
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: f64,
    y: f64,
}

/// [`Page`] over a CDP page-target connection.
pub struct CdpPage {
    cdp: Arc<CdpClient>,
    /// Last pointer position; wheel events are dispatched here.
    pointer: Mutex<Point>,
}

impl CdpPage {
    pub fn new(cdp: Arc<CdpClient>) -> Self {
        Self {
            cdp,
            pointer: Mutex::new(Point { x: 0.0, y: 0.0 }),
        }
    }

    /// Scroll the first match into view and return its center.
    async fn center_of(&self, locator: &Locator) -> Result<Point> {
        let script = locator.script(concat!(
            "const el = els[0]; if (!el) return null;",
            " el.scrollIntoView({block: 'center', inline: 'center'});",
            " const r = el.getBoundingClientRect();",
            " return {x: r.left + r.width / 2, y: r.top + r.height / 2, w: r.width, h: r.height};"
        ));
        let value = self.cdp.evaluate(&script).await?;
        if value.is_null() {
            return Err(Error::NotFound(locator.to_string()));
        }
        let num = |key: &str| value.get(key).and_then(|v| v.as_f64()).unwrap_or(0.0);
        if num("w") <= 0.0 || num("h") <= 0.0 {
            return Err(Error::NotFound(format!("{} (not visible)", locator)));
        }
        Ok(Point {
            x: num("x"),
            y: num("y"),
        })
    }

    async fn move_to(&self, point: Point) -> Result<()> {
        self.cdp
            .dispatch_mouse_event("mouseMoved", point.x, point.y, "none", 0)
            .await?;
        *self.pointer.lock().await = point;
        Ok(())
    }

    async fn focus(&self, locator: &Locator) -> Result<()> {
        let script = locator.script("const el = els[0]; if (!el) return false; el.focus(); return true;");
        match self.cdp.evaluate(&script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(Error::NotFound(locator.to_string())),
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<()> {
        let mut waited = Duration::ZERO;
        loop {
            if let Ok(Value::String(state)) = self.cdp.evaluate("document.readyState").await {
                if state == "complete" || state == "interactive" {
                    return Ok(());
                }
            }
            if waited >= timeout {
                return Err(Error::Timeout("page load".to_string()));
            }
            tokio::time::sleep(POLL_INTERVAL).await;
            waited += POLL_INTERVAL;
        }
    }
}

#[async_trait]
impl Page for CdpPage {
    async fn count(&self, locator: &Locator) -> Result<usize> {
        let value = self.cdp.evaluate(&locator.script("return els.length;")).await?;
        Ok(value.as_u64().unwrap_or(0) as usize)
    }

    async fn click(&self, locator: &Locator) -> Result<()> {
        let point = self.center_of(locator).await?;
        self.move_to(point).await?;
        self.cdp
            .dispatch_mouse_event("mousePressed", point.x, point.y, "left", 1)
            .await?;
        self.cdp
            .dispatch_mouse_event("mouseReleased", point.x, point.y, "left", 1)
            .await?;
        Ok(())
    }

    async fn dom_click(&self, locator: &Locator) -> Result<()> {
        let script = locator.script("const el = els[0]; if (!el) return false; el.click(); return true;");
        match self.cdp.evaluate(&script).await? {
            Value::Bool(true) => Ok(()),
            _ => Err(Error::NotFound(locator.to_string())),
        }
    }

    async fn hover(&self, locator: &Locator) -> Result<()> {
        let point = self.center_of(locator).await?;
        self.move_to(point).await
    }

    async fn text_content(&self, locator: &Locator) -> Result<Option<String>> {
        let script = locator.script("return els.length ? els[0].textContent : null;");
        Ok(self.cdp.evaluate(&script).await?.as_str().map(str::to_string))
    }

    async fn attribute(&self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let body = format!(
            "return els.length ? els[0].getAttribute({}) : null;",
            Value::String(name.to_string())
        );
        Ok(self
            .cdp
            .evaluate(&locator.script(&body))
            .await?
            .as_str()
            .map(str::to_string))
    }

    async fn has_marker(&self, locator: &Locator, marker: &str) -> Result<bool> {
        let body = format!(
            concat!(
                "const m = {}; const el = els[0]; if (!el) return false;",
                " for (let n = el, i = 0; n && i < 4; n = n.parentElement, i++) {{",
                " if (n.matches(m)) return true; }}",
                " return !!el.querySelector(m);"
            ),
            Value::String(marker.to_string())
        );
        Ok(self
            .cdp
            .evaluate(&locator.script(&body))
            .await?
            .as_bool()
            .unwrap_or(false))
    }

    async fn type_text(&self, locator: &Locator, text: &str, delay: Duration) -> Result<()> {
        self.focus(locator).await?;
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            self.cdp.insert_text(ch.encode_utf8(&mut buf)).await?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
        Ok(())
    }

    async fn press(&self, locator: &Locator, key: &str) -> Result<()> {
        self.focus(locator).await?;
        let spec = parse_key_spec(key);
        self.cdp.dispatch_key_event("keyDown", &spec).await?;
        self.cdp.dispatch_key_event("keyUp", &spec).await?;
        Ok(())
    }

    async fn wheel(&self, delta_y: f64) -> Result<()> {
        let point = *self.pointer.lock().await;
        self.cdp
            .dispatch_mouse_wheel(point.x, point.y, 0.0, delta_y)
            .await
    }

    async fn url(&self) -> Result<String> {
        let value = self.cdp.evaluate("window.location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn goto(&self, url: &str, timeout: Duration) -> Result<()> {
        self.cdp.navigate(url).await?;
        self.wait_for_load(timeout).await?;
        debug!(url = %url, "Navigated");
        Ok(())
    }

    async fn reload(&self, timeout: Duration) -> Result<()> {
        self.cdp.reload().await?;
        self.wait_for_load(timeout).await
    }

    async fn set_title(&self, title: &str) -> Result<()> {
        let script = format!("document.title = {};", json!(title));
        self.cdp.evaluate(&script).await?;
        Ok(())
    }

    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
