use async_trait::async_trait;
use autoreply_browser::{BrowserSession, LaunchOptions, Navigator, Page};
use autoreply_core::{truncate, Account, Clock, Config, Result, SystemClock, TimingConfig};
use autoreply_storage::{CookieStore, HistoryStore, ReplyHistory};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};

use crate::context::{AccountContext, ReplyCounters, ViewStateFlags};
use crate::dispatcher::ReplyDispatcher;
use crate::filters::ViewStateController;
use crate::scanner::UnreadScanner;

/// Persists the browser's cookies once the login state is settled.
#[async_trait]
pub trait CookieSink: Send + Sync {
    async fn persist(&self) -> Result<usize>;
}

struct SessionCookies {
    session: Arc<BrowserSession>,
    store: CookieStore,
}

#[async_trait]
impl CookieSink for SessionCookies {
    async fn persist(&self) -> Result<usize> {
        self.session.save_cookies(&self.store).await
    }
}

/// What one loop iteration did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Replied,
    /// Found an unread row that was already replied to today.
    Skipped,
    /// Nothing unread.
    Idle,
}

fn ms(value: u64) -> Duration {
    Duration::from_millis(value)
}

/// The polling loop of one account.
pub struct AccountRuntime {
    ctx: AccountContext,
    page: Arc<dyn Page>,
    clock: Arc<dyn Clock>,
    cookies: Option<Arc<dyn CookieSink>>,
    navigator: Navigator,
    filters: ViewStateController,
    scanner: UnreadScanner,
    dispatcher: ReplyDispatcher,
    history_store: HistoryStore,
    history: ReplyHistory,
    timing: TimingConfig,
    title_width: usize,
    last_filter_check: Option<Instant>,
}

impl AccountRuntime {
    pub fn new(
        config: &Config,
        ctx: AccountContext,
        page: Arc<dyn Page>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let history_store = HistoryStore::new(&config.paths(), &ctx.account.id);
        let history = history_store.load(clock.today());
        Ok(Self {
            navigator: Navigator::from_config(config)?,
            filters: ViewStateController::from_config(config),
            scanner: UnreadScanner::from_config(config),
            dispatcher: ReplyDispatcher::from_config(config),
            timing: config.timing.clone(),
            title_width: config.log.max_username_length,
            history_store,
            history,
            ctx,
            page,
            clock,
            cookies: None,
            last_filter_check: None,
        })
    }

    pub fn with_cookie_sink(mut self, sink: Arc<dyn CookieSink>) -> Self {
        self.cookies = Some(sink);
        self
    }

    pub fn counters(&self) -> ReplyCounters {
        self.ctx.counters()
    }

    pub fn flags(&self) -> ViewStateFlags {
        self.ctx.flags
    }

    pub fn history(&self) -> &ReplyHistory {
        &self.history
    }

    /// Open the chat, settle the login state, save cookies and assert the
    /// filters. Fails only when a manual login never completes.
    pub async fn establish(&mut self) -> Result<()> {
        let page = self.page.clone();
        let page = page.as_ref();

        info!(url = %self.navigator.chat_url(), "Opening seller chat");
        self.navigator.robust_goto(page).await;
        self.navigator
            .resolve_login(page, &self.ctx.login_title())
            .await?;

        if let Some(sink) = &self.cookies {
            match sink.persist().await {
                Ok(count) => debug!(count, "Cookies saved"),
                Err(e) => warn!(error = %e, "Failed to save cookies"),
            }
        }
        if let Err(e) = page.set_title(&self.ctx.ready_title()).await {
            debug!(error = %e, "Failed to set window title");
        }

        self.assert_filters(page).await;
        info!(replied_today = self.history.len(), "Ready");
        Ok(())
    }

    /// One iteration of the reply loop.
    pub async fn step(&mut self) -> Result<StepOutcome> {
        self.roll_day()?;

        let page = self.page.clone();
        let page = page.as_ref();

        if !self.navigator.is_on_target_view(page).await {
            info!("Conversation list lost, navigating back");
            self.navigator.robust_goto(page).await;
            self.assert_filters(page).await;
        } else if self.filter_check_due() {
            self.assert_filters(page).await;
        }

        let Some(row) = self.scanner.find_first_unread(page).await? else {
            return Ok(StepOutcome::Idle);
        };
        let title = self.dispatcher.read_title(page, &row).await;

        if self.history.contains(&title) {
            if self.ctx.record_skip(&title) {
                info!(
                    title = %truncate(&title, self.title_width),
                    "Already replied today, skipping"
                );
            }
            return Ok(StepOutcome::Skipped);
        }

        self.dispatcher
            .dispatch(page, &row, &title, &mut self.history, &self.history_store)
            .await?;
        self.ctx.record_reply();
        Ok(StepOutcome::Replied)
    }

    /// Run one iteration, recovering from any failure. Returns how long to
    /// pause before the next one.
    pub async fn tick(&mut self) -> Duration {
        match self.step().await {
            Ok(StepOutcome::Idle) => ms(self.timing.poll_interval_ms),
            Ok(_) => ms(self.timing.after_row_pause_ms),
            Err(e) => {
                self.ctx.record_error();
                if e.is_transient() {
                    warn!(error = %e, "Iteration failed, recovering");
                } else {
                    error!(error = %e, "Iteration failed, recovering");
                }
                self.recover().await;
                ms(self.timing.error_cooldown_ms)
            }
        }
    }

    /// Loop until `shutdown` fires. Returns the final counters.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) -> ReplyCounters {
        info!("Account loop started");
        let mut established = false;

        loop {
            let pause = if established {
                tokio::select! {
                    pause = self.tick() => pause,
                    _ = shutdown.recv() => break,
                }
            } else {
                let result = tokio::select! {
                    result = self.establish() => result,
                    _ = shutdown.recv() => break,
                };
                match result {
                    Ok(()) => {
                        established = true;
                        Duration::ZERO
                    }
                    Err(e) => {
                        self.ctx.record_error();
                        error!(error = %e, "Session setup failed, retrying");
                        ms(self.timing.error_cooldown_ms)
                    }
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(pause) => {}
                _ = shutdown.recv() => break,
            }
        }

        info!("Account loop stopped");
        self.ctx.counters()
    }

    fn roll_day(&mut self) -> Result<()> {
        let today = self.clock.today();
        if self.history.is_for(today) {
            return Ok(());
        }
        info!(
            previous = %self.history.date,
            replied = self.history.len(),
            "New day, resetting reply history"
        );
        self.history = ReplyHistory::empty(today);
        self.history_store.clear(today)
    }

    fn filter_check_due(&self) -> bool {
        self.last_filter_check
            .map(|at| at.elapsed() >= ms(self.timing.reassert_filter_ms))
            .unwrap_or(true)
    }

    async fn assert_filters(&mut self, page: &dyn Page) {
        self.filters.ensure_filters(page, &mut self.ctx.flags).await;
        self.last_filter_check = Some(Instant::now());
    }

    async fn recover(&mut self) {
        let page = self.page.clone();
        self.navigator.robust_goto(page.as_ref()).await;
        self.assert_filters(page.as_ref()).await;
    }
}

/// Launch the account's browser and run its loop until shutdown.
pub async fn run_account(
    config: Arc<Config>,
    account: Account,
    shutdown: broadcast::Receiver<()>,
    counters_tx: watch::Sender<ReplyCounters>,
) -> Result<ReplyCounters> {
    let paths = config.paths();
    let options = LaunchOptions::for_account(&paths, &account, config.headless);
    let session = BrowserSession::launch(&options).await?;

    let cookie_store = CookieStore::new(&paths, &account.id);
    match session.restore_cookies(&cookie_store.load()).await {
        Ok(0) => debug!("No saved cookies"),
        Ok(count) => info!(count, "Cookies restored"),
        Err(e) => warn!(error = %e, "Failed to restore cookies"),
    }

    let session = Arc::new(session);
    let page: Arc<dyn Page> = Arc::new(session.page());
    let ctx = AccountContext::new(account, counters_tx);
    let runtime = AccountRuntime::new(&config, ctx, page, Arc::new(SystemClock))?
        .with_cookie_sink(Arc::new(SessionCookies {
            session: session.clone(),
            store: cookie_store,
        }));

    let counters = runtime.run(shutdown).await;
    if let Ok(mut session) = Arc::try_unwrap(session) {
        session.close().await;
    }
    Ok(counters)
}
