use autoreply_browser::find_browser_binary;
use autoreply_core::Config;
use regex::Regex;
use std::path::Path;

/// Check everything the reply loop needs before it starts.
pub fn run(config: &Config) -> anyhow::Result<()> {
    let paths = config.paths();

    println!();
    println!("🩺 autoreply doctor");
    println!("===================");
    println!();

    let mut err_count = 0u32;
    let mut warn_count = 0u32;

    println!("🌐 Browser");
    match find_browser_binary() {
        Some(path) => print_ok("Chrome/Chromium found", &path),
        None => {
            print_err("Chrome/Chromium not found", "Install Google Chrome or Chromium");
            err_count += 1;
        }
    }
    println!();

    println!("📋 Configuration");
    if config.accounts.is_empty() {
        print_err("No accounts configured", "Set STORES=TOKO1,TOKO2 or add \"accounts\"");
        err_count += 1;
    } else {
        let ids: Vec<&str> = config.accounts.iter().map(|a| a.id.as_str()).collect();
        print_ok(&format!("{} account(s)", ids.len()), &ids.join(", "));
    }
    if config.reply_lines.is_empty() {
        print_err("No reply lines", "Set REPLY_LINES (lines separated by ||)");
        err_count += 1;
    } else {
        print_ok(&format!("{} reply line(s)", config.reply_lines.len()), "");
    }
    match Regex::new(&config.selectors.target_url_pattern) {
        Ok(pattern) if pattern.is_match(&config.chat_url) => {
            print_ok("Chat URL matches target pattern", &config.chat_url)
        }
        Ok(_) => {
            print_warn(
                "Chat URL does not match target pattern",
                &config.selectors.target_url_pattern,
            );
            warn_count += 1;
        }
        Err(e) => {
            print_err("Invalid target URL pattern", &e.to_string());
            err_count += 1;
        }
    }
    println!();

    println!("📁 Directories");
    for (label, dir) in [
        ("Data", &paths.data_dir),
        ("Browser profiles", &paths.browser_dir),
        ("Logs", &paths.logs_dir),
    ] {
        match check_writable(dir) {
            Ok(()) => print_ok(&format!("{} writable", label), &dir.display().to_string()),
            Err(e) => {
                print_err(&format!("{} not writable", label), &e.to_string());
                err_count += 1;
            }
        }
    }
    println!();

    if err_count == 0 && warn_count == 0 {
        println!("All checks passed.");
    } else {
        println!("{} error(s), {} warning(s)", err_count, warn_count);
    }
    if err_count > 0 {
        anyhow::bail!("doctor found {} error(s)", err_count);
    }
    Ok(())
}

fn check_writable(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    let probe = dir.join(".doctor_test");
    std::fs::write(&probe, "test")?;
    std::fs::remove_file(&probe)
}

fn print_ok(label: &str, detail: &str) {
    if detail.is_empty() {
        println!("  ✅ {}", label);
    } else {
        println!("  ✅ {} — {}", label, detail);
    }
}

fn print_warn(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ⚠️  {}", label);
    } else {
        println!("  ⚠️  {} — {}", label, hint);
    }
}

fn print_err(label: &str, hint: &str) {
    if hint.is_empty() {
        println!("  ❌ {}", label);
    } else {
        println!("  ❌ {} — {}", label, hint);
    }
}
