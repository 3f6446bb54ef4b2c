//! Per-account browser sessions.
//!
//! Every account gets its own Chrome process with a persistent profile
//! directory, so a login survives restarts even without the cookie jar.

use autoreply_core::{Account, Error, Paths, Result};
use autoreply_storage::{CookieRecord, CookieStore};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::cdp::CdpClient;
use crate::page::CdpPage;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
    (KHTML, like Gecko) Chrome/141.0.0.0 Safari/537.36";
const ACCEPT_LANGUAGE: &str = "id-ID,id;q=0.9,en-US;q=0.8,en;q=0.7";
const CDP_READY_TIMEOUT: Duration = Duration::from_secs(20);

/// Hides the automation flag before any page script runs.
const STEALTH_SCRIPT: &str = concat!(
    "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });",
    " Object.defineProperty(navigator, 'languages', { get: () => ['id-ID', 'id', 'en-US', 'en'] });"
);

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub user_data_dir: PathBuf,
}

impl LaunchOptions {
    pub fn for_account(paths: &Paths, account: &Account, headless: bool) -> Self {
        Self {
            headless,
            user_data_dir: paths.profile_dir(&account.folder),
        }
    }
}

/// One running browser with a CDP connection to its page target.
pub struct BrowserSession {
    user_data_dir: PathBuf,
    process: Child,
    cdp: Arc<CdpClient>,
}

impl BrowserSession {
    pub async fn launch(options: &LaunchOptions) -> Result<Self> {
        let browser_path = find_browser_binary()
            .ok_or_else(|| Error::Browser("Chrome/Chromium not found. Please install it.".into()))?;

        std::fs::create_dir_all(&options.user_data_dir)?;
        let debug_port = find_free_port().await?;
        let args = build_browser_args(debug_port, &options.user_data_dir, options.headless);

        info!(
            port = debug_port,
            headless = options.headless,
            profile = %options.user_data_dir.display(),
            "Launching browser"
        );

        let process = Command::new(&browser_path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Browser(format!("Failed to launch {}: {}", browser_path, e)))?;

        wait_for_cdp_ready(debug_port, CDP_READY_TIMEOUT).await?;
        let page_ws_url = get_page_ws_url(debug_port).await?;
        let cdp = CdpClient::connect(&page_ws_url).await?;

        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        cdp.enable_domain("Network").await?;
        cdp.add_script_on_new_document(STEALTH_SCRIPT).await?;
        cdp.set_user_agent(USER_AGENT, ACCEPT_LANGUAGE).await?;

        debug!(ws_url = %page_ws_url, "CDP connection established (page target)");

        Ok(Self {
            user_data_dir: options.user_data_dir.clone(),
            process,
            cdp: Arc::new(cdp),
        })
    }

    pub fn page(&self) -> CdpPage {
        CdpPage::new(self.cdp.clone())
    }

    /// Inject previously saved cookies into the browser context.
    pub async fn restore_cookies(&self, cookies: &[CookieRecord]) -> Result<usize> {
        if cookies.is_empty() {
            return Ok(0);
        }
        let params: Vec<Value> = cookies.iter().map(to_cdp_cookie).collect();
        self.cdp.set_cookies(params).await?;
        Ok(cookies.len())
    }

    /// Snapshot the browser's cookies into `store`.
    pub async fn save_cookies(&self, store: &CookieStore) -> Result<usize> {
        let raw = self.cdp.get_all_cookies().await?;
        let cookies: Vec<CookieRecord> = raw.iter().filter_map(CookieRecord::from_value).collect();
        store.save(&cookies)?;
        Ok(cookies.len())
    }

    /// Ask the browser to exit, then make sure the process is gone.
    pub async fn close(&mut self) {
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            debug!("CDP Browser.close failed (may already be closed): {}", e);
        }
        if let Err(e) = self.process.kill().await {
            debug!("Browser process kill failed: {}", e);
        }
        info!(profile = %self.user_data_dir.display(), "Browser closed");
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        let _ = self.process.start_kill();
    }
}

/// CDP `Network.CookieParam` for a stored cookie. Session cookies carry no
/// `expires`.
pub fn to_cdp_cookie(cookie: &CookieRecord) -> Value {
    let mut param = json!({
        "name": cookie.name,
        "value": cookie.value,
        "domain": cookie.domain,
        "path": cookie.path,
        "httpOnly": cookie.http_only,
        "secure": cookie.secure,
        "sameSite": cookie.same_site.as_str(),
    });
    if cookie.expires > 0.0 {
        param["expires"] = json!(cookie.expires);
    }
    param
}

fn build_browser_args(debug_port: u16, user_data_dir: &Path, headless: bool) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={}", debug_port),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-blink-features=AutomationControlled".to_string(),
        "--start-maximized".to_string(),
        "--lang=id-ID".to_string(),
        "--password-store=basic".to_string(),
    ];
    if headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    args
}

/// Find a Chrome-family binary on the system.
pub fn find_browser_binary() -> Option<String> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "linux") {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    } else {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    };

    for candidate in candidates {
        if Path::new(candidate).exists() {
            return Some(candidate.to_string());
        }
        if !candidate.contains('/') && !candidate.contains('\\') && which::which(candidate).is_ok()
        {
            return Some(candidate.to_string());
        }
    }
    None
}

async fn find_free_port() -> Result<u16> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

/// Poll /json/version until the browser-level endpoint answers.
async fn wait_for_cdp_ready(port: u16, timeout: Duration) -> Result<String> {
    let start = std::time::Instant::now();
    let url = format!("http://127.0.0.1:{}/json/version", port);

    loop {
        if start.elapsed() > timeout {
            return Err(Error::Timeout(format!(
                "Chrome CDP not ready after {}s on port {}",
                timeout.as_secs(),
                port
            )));
        }

        if let Ok(resp) = reqwest::get(&url).await {
            if let Ok(body) = resp.json::<Value>().await {
                if let Some(ws_url) = body.get("webSocketDebuggerUrl").and_then(|v| v.as_str()) {
                    return Ok(ws_url.to_string());
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
    }
}

/// First "page" target's WebSocket URL from /json/list. Retries while the
/// initial tab is still being created.
async fn get_page_ws_url(port: u16) -> Result<String> {
    let url = format!("http://127.0.0.1:{}/json/list", port);

    for attempt in 0..10 {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
        let targets: Vec<Value> = match reqwest::get(&url).await {
            Ok(resp) => match resp.json().await {
                Ok(t) => t,
                Err(_) => continue,
            },
            Err(e) => {
                warn!(attempt, error = %e, "Target list request failed");
                continue;
            }
        };

        let page = targets.iter().find_map(|target| {
            if target.get("type").and_then(|v| v.as_str()) != Some("page") {
                return None;
            }
            target.get("webSocketDebuggerUrl").and_then(|v| v.as_str())
        });
        if let Some(ws_url) = page {
            return Ok(ws_url.to_string());
        }
    }

    Err(Error::Browser("No page target found after retries".to_string()))
}
