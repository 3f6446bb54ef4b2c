//! Browser Session Manager: a Chrome instance per account driven over CDP.

pub mod cdp;
pub mod locator;
pub mod navigation;
pub mod page;
pub mod session;

pub use cdp::CdpClient;
pub use locator::{first_present, first_present_within, Locator};
pub use navigation::{GotoOutcome, Navigator, ViewState};
pub use page::{click_with_fallback, CdpPage, Page, POLL_INTERVAL};
pub use session::{find_browser_binary, BrowserSession, LaunchOptions};
