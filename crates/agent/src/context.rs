use autoreply_core::Account;
use std::collections::HashSet;
use tokio::sync::watch;

/// Filter-assertion bookkeeping for one account. Lives as long as the
/// account's task; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewStateFlags {
    /// Filters were asserted successfully at least once.
    pub asserted_once: bool,
    /// The last assertion attempt failed.
    pub had_error: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyCounters {
    pub replied: u64,
    /// Distinct titles skipped because they were already replied to today.
    pub skipped: u64,
    pub errors: u64,
}

/// Per-account state owned by the account's loop.
pub struct AccountContext {
    pub account: Account,
    pub flags: ViewStateFlags,
    counters: ReplyCounters,
    counters_tx: watch::Sender<ReplyCounters>,
    skip_logged: HashSet<String>,
}

impl AccountContext {
    pub fn new(account: Account, counters_tx: watch::Sender<ReplyCounters>) -> Self {
        Self {
            account,
            flags: ViewStateFlags::default(),
            counters: ReplyCounters::default(),
            counters_tx,
            skip_logged: HashSet::new(),
        }
    }

    /// Context with a private counters channel, for callers that don't
    /// observe counters.
    pub fn detached(account: Account) -> Self {
        let (tx, _rx) = watch::channel(ReplyCounters::default());
        Self::new(account, tx)
    }

    pub fn counters(&self) -> ReplyCounters {
        self.counters
    }

    pub fn record_reply(&mut self) {
        self.counters.replied += 1;
        self.publish();
    }

    /// Returns true the first time `title` is skipped in this process, which
    /// is also the only time it is counted and logged.
    pub fn record_skip(&mut self, title: &str) -> bool {
        if !self.skip_logged.insert(title.to_string()) {
            return false;
        }
        self.counters.skipped += 1;
        self.publish();
        true
    }

    pub fn record_error(&mut self) {
        self.counters.errors += 1;
        self.publish();
    }

    /// Window title shown while waiting for a human to log in.
    pub fn login_title(&self) -> String {
        format!("{} - SILAKAN LOGIN", self.account.label())
    }

    pub fn ready_title(&self) -> String {
        format!("{} - Shopee Seller Chat", self.account.label())
    }

    fn publish(&self) {
        // no receivers left is fine; the orchestrator may have exited first
        let _ = self.counters_tx.send(self.counters);
    }
}
