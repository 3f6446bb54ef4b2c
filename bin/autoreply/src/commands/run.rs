use autoreply_agent::{run_account, ReplyCounters};
use autoreply_core::{Account, Config};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{error, info, info_span, warn, Instrument};

/// How long account loops get to wind down after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

/// Start one loop per account and block until a shutdown signal.
pub async fn run(config: Config) -> anyhow::Result<()> {
    orchestrate(config, run_account, wait_for_signal())
        .await
        .map(|_| ())
}

/// Spawn `start` once per account, then wait for `signal` or for every loop
/// to end. One account failing never stops the others. Returns each
/// account's final counters.
async fn orchestrate<F, Fut, S>(
    config: Config,
    start: F,
    signal: S,
) -> anyhow::Result<Vec<(Account, ReplyCounters)>>
where
    F: Fn(Arc<Config>, Account, broadcast::Receiver<()>, watch::Sender<ReplyCounters>) -> Fut,
    Fut: Future<Output = autoreply_core::Result<ReplyCounters>> + Send + 'static,
    S: Future<Output = std::io::Result<()>>,
{
    if config.accounts.is_empty() {
        anyhow::bail!(
            "No accounts configured. Set STORES (e.g. STORES=TOKO1,TOKO2) or add \"accounts\" to the config file."
        );
    }

    let paths = config.paths();
    paths.ensure_dirs()?;

    info!(
        accounts = config.accounts.len(),
        headless = config.headless,
        poll_ms = config.timing.poll_interval_ms,
        "Starting auto-reply"
    );

    let config = Arc::new(config);
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut tasks = JoinSet::new();
    let mut monitors: Vec<(Account, watch::Receiver<ReplyCounters>)> = Vec::new();

    for account in config.accounts.iter().cloned() {
        info!(account = %account.id, name = %account.label(), "Launching account");
        let (counters_tx, counters_rx) = watch::channel(ReplyCounters::default());
        monitors.push((account.clone(), counters_rx));

        let span = info_span!("account", id = %account.id);
        let account_loop = start(config.clone(), account, shutdown_tx.subscribe(), counters_tx);
        tasks.spawn(
            async move {
                match account_loop.await {
                    Ok(counters) => info!(replied = counters.replied, "Account stopped"),
                    Err(e) => error!(error = %e, "Fatal: account loop failed"),
                }
            }
            .instrument(span),
        );
    }

    let all_stopped = tokio::select! {
        signal = signal => {
            signal?;
            false
        }
        _ = drain(&mut tasks) => true,
    };

    if all_stopped {
        log_summary(&monitors);
        anyhow::bail!("All account loops stopped");
    }

    info!("Shutdown signal received, stopping accounts");
    let _ = shutdown_tx.send(());
    if tokio::time::timeout(SHUTDOWN_GRACE, drain(&mut tasks))
        .await
        .is_err()
    {
        warn!(remaining = tasks.len(), "Accounts did not stop in time, aborting");
        tasks.abort_all();
    }

    let summary = log_summary(&monitors);
    info!("Shutdown complete");
    Ok(summary)
}

async fn drain(tasks: &mut JoinSet<()>) {
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            if e.is_panic() {
                error!(error = %e, "Account task panicked");
            }
        }
    }
}

fn log_summary(
    monitors: &[(Account, watch::Receiver<ReplyCounters>)],
) -> Vec<(Account, ReplyCounters)> {
    monitors
        .iter()
        .map(|(account, counters)| {
            let counters = *counters.borrow();
            info!(
                replied = counters.replied,
                skipped = counters.skipped,
                errors = counters.errors,
                "{}",
                account.label()
            );
            (account.clone(), counters)
        })
        .collect()
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoreply_core::Error;
    use tempfile::TempDir;

    fn config(tmp: &TempDir, ids: &[&str]) -> Config {
        let mut config = Config::default();
        config.accounts = ids.iter().map(|id| Account::new(*id)).collect();
        config.paths.data_dir = tmp.path().join("data").display().to_string();
        config.paths.browser_data_dir = tmp.path().join("browser").display().to_string();
        config.paths.logs_dir = tmp.path().join("logs").display().to_string();
        config
    }

    /// Fails at once for "BROKEN"; every other account counts a reply every
    /// few milliseconds until shutdown.
    async fn scripted_loop(
        _config: Arc<Config>,
        account: Account,
        mut shutdown: broadcast::Receiver<()>,
        counters_tx: watch::Sender<ReplyCounters>,
    ) -> autoreply_core::Result<ReplyCounters> {
        if account.id == "BROKEN" {
            return Err(Error::Browser("launch failed".into()));
        }
        let mut counters = ReplyCounters::default();
        loop {
            tokio::select! {
                _ = shutdown.recv() => return Ok(counters),
                _ = tokio::time::sleep(Duration::from_millis(5)) => {
                    counters.replied += 1;
                    let _ = counters_tx.send(counters);
                }
            }
        }
    }

    async fn failing_loop(
        _config: Arc<Config>,
        account: Account,
        _shutdown: broadcast::Receiver<()>,
        _counters_tx: watch::Sender<ReplyCounters>,
    ) -> autoreply_core::Result<ReplyCounters> {
        Err(Error::Browser(format!("{} crashed", account.id)))
    }

    #[tokio::test]
    async fn test_failed_account_does_not_stop_others() {
        let tmp = TempDir::new().unwrap();
        let signal = async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok::<(), std::io::Error>(())
        };

        let summary = orchestrate(config(&tmp, &["BROKEN", "TOKO1"]), scripted_loop, signal)
            .await
            .unwrap();

        assert_eq!(summary.len(), 2);
        let (broken, broken_counters) = &summary[0];
        assert_eq!(broken.id, "BROKEN");
        assert_eq!(broken_counters.replied, 0);
        let (healthy, healthy_counters) = &summary[1];
        assert_eq!(healthy.id, "TOKO1");
        assert!(healthy_counters.replied > 0);
    }

    #[tokio::test]
    async fn test_all_accounts_ending_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let result = orchestrate(
            config(&tmp, &["TOKO1", "TOKO2"]),
            failing_loop,
            std::future::pending(),
        )
        .await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("All account loops stopped"));
    }

    #[tokio::test]
    async fn test_no_accounts_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let result = orchestrate(config(&tmp, &[]), failing_loop, std::future::pending()).await;
        assert!(result.is_err());
    }
}
