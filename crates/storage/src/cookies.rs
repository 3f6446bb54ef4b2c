use autoreply_core::{Paths, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SameSite {
    Strict,
    #[default]
    Lax,
    None,
}

impl SameSite {
    /// Lenient mapping: anything mentioning "strict" or "none" wins,
    /// everything else (including absent) is `Lax`.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Lax;
        };
        let lower = raw.to_lowercase();
        if lower.contains("strict") {
            Self::Strict
        } else if lower.contains("none") {
            Self::None
        } else {
            Self::Lax
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "Strict",
            Self::Lax => "Lax",
            Self::None => "None",
        }
    }
}

/// One persisted browser cookie.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    pub http_only: bool,
    pub secure: bool,
    /// Unix seconds; `-1` marks a session cookie.
    pub expires: f64,
    pub same_site: SameSite,
}

impl CookieRecord {
    /// Normalize a loosely-shaped cookie object (as written by a browser or
    /// by an older version of this tool). Returns `None` without a name.
    pub fn from_value(raw: &Value) -> Option<Self> {
        let name = raw.get("name")?.as_str()?.to_string();
        let str_field = |key: &str| raw.get(key).and_then(|v| v.as_str());
        let path = str_field("path")
            .filter(|p| !p.is_empty())
            .unwrap_or("/")
            .to_string();
        Some(Self {
            name,
            value: str_field("value").unwrap_or_default().to_string(),
            domain: str_field("domain").unwrap_or_default().to_string(),
            path,
            http_only: raw.get("httpOnly").and_then(|v| v.as_bool()).unwrap_or(false),
            secure: raw.get("secure").and_then(|v| v.as_bool()).unwrap_or(false),
            expires: raw.get("expires").and_then(|v| v.as_f64()).unwrap_or(-1.0),
            same_site: SameSite::parse_lenient(str_field("sameSite")),
        })
    }
}

/// Reads and writes one account's cookie jar.
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    pub fn new(paths: &Paths, account_id: &str) -> Self {
        Self {
            path: paths.cookies_file(account_id),
        }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Load the jar. A missing file, an invalid file or a non-array document
    /// all yield an empty jar.
    pub fn load(&self) -> Vec<CookieRecord> {
        if !self.path.exists() {
            return Vec::new();
        }
        let parsed = std::fs::read_to_string(&self.path)
            .map_err(autoreply_core::Error::from)
            .and_then(|content| Ok(serde_json::from_str::<Value>(&content)?));
        match parsed {
            Ok(Value::Array(items)) => items.iter().filter_map(CookieRecord::from_value).collect(),
            Ok(_) => {
                warn!(path = %self.path.display(), "Cookie file is not an array, ignoring");
                Vec::new()
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to load cookies, ignoring");
                Vec::new()
            }
        }
    }

    pub fn save(&self, cookies: &[CookieRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(cookies)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_normalize_browser_cookie() {
        let raw = json!({
            "name": "SPC_EC",
            "value": "abc",
            "domain": ".shopee.co.id",
            "expires": 1790000000.5,
            "size": 9,
            "httpOnly": true,
            "secure": true,
            "session": false,
            "sameSite": "no_restriction_None",
            "priority": "Medium"
        });
        let cookie = CookieRecord::from_value(&raw).unwrap();
        assert_eq!(cookie.path, "/");
        assert!(cookie.http_only);
        assert_eq!(cookie.expires, 1790000000.5);
        assert_eq!(cookie.same_site, SameSite::None);
    }

    #[test]
    fn test_normalize_defaults() {
        let cookie = CookieRecord::from_value(&json!({"name": "a", "value": "b"})).unwrap();
        assert_eq!(cookie.expires, -1.0);
        assert_eq!(cookie.same_site, SameSite::Lax);
        assert!(!cookie.secure);
        assert!(CookieRecord::from_value(&json!({"value": "nameless"})).is_none());
        assert_eq!(SameSite::parse_lenient(Some("STRICT")), SameSite::Strict);
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::with_base(tmp.path().to_path_buf());
        let store = CookieStore::new(&paths, "TOKO1");
        assert!(store.path().ends_with("cookies-toko1.json"));

        let jar = vec![CookieRecord {
            name: "SPC_U".into(),
            value: "42".into(),
            domain: ".shopee.co.id".into(),
            path: "/".into(),
            http_only: false,
            secure: true,
            expires: -1.0,
            same_site: SameSite::Strict,
        }];
        store.save(&jar).unwrap();
        assert_eq!(CookieStore::new(&paths, "TOKO1").load(), jar);

        let raw: Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw[0]["sameSite"], "Strict");
        assert_eq!(raw[0]["httpOnly"], false);
    }

    #[test]
    fn test_invalid_jar_is_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = Paths::with_base(tmp.path().to_path_buf());
        let store = CookieStore::new(&paths, "TOKO1");
        assert!(store.load().is_empty());

        std::fs::create_dir_all(&paths.data_dir).unwrap();
        std::fs::write(store.path(), r#"{"name": "x"}"#).unwrap();
        assert!(store.load().is_empty());

        std::fs::write(store.path(), "garbage").unwrap();
        assert!(store.load().is_empty());
    }
}
