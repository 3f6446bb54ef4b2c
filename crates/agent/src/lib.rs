pub mod context;
pub mod dispatcher;
pub mod filters;
pub mod runtime;
pub mod scanner;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{AccountContext, ReplyCounters, ViewStateFlags};
pub use dispatcher::{ReplyDispatcher, UNKNOWN_TITLE};
pub use filters::ViewStateController;
pub use runtime::{run_account, AccountRuntime, CookieSink, StepOutcome};
pub use scanner::{is_unread_badge_text, UnreadScanner};
