use std::path::PathBuf;

/// On-disk layout: one history file, one cookie file and one browser profile
/// directory per account, plus a shared log directory.
#[derive(Debug, Clone)]
pub struct Paths {
    pub data_dir: PathBuf,
    pub browser_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl Paths {
    pub fn new(data_dir: PathBuf, browser_dir: PathBuf, logs_dir: PathBuf) -> Self {
        Self {
            data_dir,
            browser_dir,
            logs_dir,
        }
    }

    /// All three directories under a single base, mostly useful in tests.
    pub fn with_base(base: PathBuf) -> Self {
        Self {
            data_dir: base.join("data"),
            browser_dir: base.join("browser-data"),
            logs_dir: base.join("logs"),
        }
    }

    pub fn history_file(&self, account_id: &str) -> PathBuf {
        self.data_dir
            .join(format!("repliedChats_{}.json", safe_name(account_id)))
    }

    pub fn cookies_file(&self, account_id: &str) -> PathBuf {
        self.data_dir.join(format!(
            "cookies-{}.json",
            safe_name(&account_id.to_lowercase())
        ))
    }

    pub fn profile_dir(&self, folder: &str) -> PathBuf {
        self.browser_dir.join(safe_name(folder))
    }

    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(&self.browser_dir)?;
        std::fs::create_dir_all(&self.logs_dir)?;
        Ok(())
    }
}

fn safe_name(raw: &str) -> String {
    raw.replace([':', '/', '\\'], "_")
}
