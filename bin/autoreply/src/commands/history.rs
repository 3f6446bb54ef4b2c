use autoreply_core::{Clock, Config, SystemClock};
use autoreply_storage::HistoryStore;

/// Empty today's history so every unread conversation is answered again.
pub fn clear(config: &Config, account_id: &str) -> anyhow::Result<()> {
    let account = config
        .account(account_id)
        .ok_or_else(|| anyhow::anyhow!("Unknown account '{}'", account_id))?;

    let today = SystemClock.today();
    let store = HistoryStore::new(&config.paths(), &account.id);
    let previous = store.load(today).len();
    store.clear(today)?;

    println!(
        "Cleared {} conversation(s) from {} ({})",
        previous,
        account.label(),
        store.path().display()
    );
    Ok(())
}
