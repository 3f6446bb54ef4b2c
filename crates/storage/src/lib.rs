pub mod cookies;
pub mod history;

pub use cookies::{CookieRecord, CookieStore, SameSite};
pub use history::{HistoryStore, ReplyHistory};
