use autoreply_core::{Clock, Config, SystemClock};
use autoreply_storage::{CookieStore, HistoryStore};

pub fn run(config: &Config) -> anyhow::Result<()> {
    let paths = config.paths();
    let today = SystemClock.today();

    println!("autoreply status");
    println!("================");
    println!();
    println!("Chat URL:  {}", config.chat_url);
    println!("Headless:  {}", config.headless);
    println!(
        "Polling:   every {} ms, filters every {} ms",
        config.timing.poll_interval_ms, config.timing.reassert_filter_ms
    );
    println!("Replies:   {} line(s)", config.reply_lines.len());
    for line in &config.reply_lines {
        println!("  > {}", line);
    }
    println!();

    if config.accounts.is_empty() {
        println!("⚠ No accounts configured. Set STORES or add \"accounts\" to the config file.");
        return Ok(());
    }

    println!("Accounts ({}):", today);
    for account in &config.accounts {
        let history = HistoryStore::new(&paths, &account.id).load(today);
        let cookies = CookieStore::new(&paths, &account.id).load();
        let profile = paths.profile_dir(&account.folder);
        println!(
            "  {:<10} {:<24} replied {:>4}  cookies {:>3}  profile {}",
            account.id,
            account.label(),
            history.len(),
            cookies.len(),
            if profile.exists() { "✓" } else { "✗" }
        );
    }

    Ok(())
}
