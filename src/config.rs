use std::path::PathBuf;

use anyhow::Result;

pub const APP_IDENTIFIER: &str = "com.grimorium.app";
pub const DB_FILE_NAME: &str = "grimorium.db";
pub const SELECTION_FILE_NAME: &str = "version-selection.json";
pub const DEFAULT_LOG_FILTER: &str = "grimorium=info,sqlx=warn";

pub const ENV_DB: &str = "GRIMORIUM_DB";
pub const ENV_SELECTION: &str = "GRIMORIUM_SELECTION";
pub const ENV_LOG: &str = "GRIMORIUM_LOG";
/// Replaces the platform data dir; used by tests and CI.
pub const ENV_FAKE_APPDATA: &str = "GRIMORIUM_FAKE_APPDATA";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub selection_path: PathBuf,
    pub log_filter: String,
    /// Which variable supplied `log_filter`, if any.
    pub log_filter_source: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<L>(lookup: L) -> Result<Self>
    where
        L: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(ENV_FAKE_APPDATA) {
            Some(fake) => PathBuf::from(fake),
            None => dirs::data_dir()
                .or_else(|| std::env::current_dir().ok())
                .ok_or_else(|| anyhow::anyhow!("failed to resolve application data directory"))?
                .join(APP_IDENTIFIER),
        };

        let db_path = lookup(ENV_DB)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(DB_FILE_NAME));
        let selection_path = lookup(ENV_SELECTION)
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join(SELECTION_FILE_NAME));

        let (log_filter, log_filter_source) = match lookup("RUST_LOG") {
            Some(value) => (value, Some(String::from("RUST_LOG"))),
            None => match lookup(ENV_LOG) {
                Some(value) => (value, Some(String::from(ENV_LOG))),
                None => (DEFAULT_LOG_FILTER.to_string(), None),
            },
        };

        Ok(Self {
            data_dir,
            db_path,
            selection_path,
            log_filter,
            log_filter_source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn fake_appdata_roots_every_default_path() {
        let config =
            AppConfig::from_lookup(lookup_from(&[(ENV_FAKE_APPDATA, "/tmp/grim")])).expect("config");
        assert_eq!(config.db_path, PathBuf::from("/tmp/grim").join(DB_FILE_NAME));
        assert_eq!(
            config.selection_path,
            PathBuf::from("/tmp/grim").join(SELECTION_FILE_NAME)
        );
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(config.log_filter_source.is_none());
    }

    #[test]
    fn explicit_paths_and_rust_log_take_precedence() {
        let config = AppConfig::from_lookup(lookup_from(&[
            (ENV_FAKE_APPDATA, "/tmp/grim"),
            (ENV_DB, "/data/books.db"),
            (ENV_LOG, "grimorium=debug"),
            ("RUST_LOG", "trace"),
        ]))
        .expect("config");
        assert_eq!(config.db_path, PathBuf::from("/data/books.db"));
        assert_eq!(config.log_filter, "trace");
        assert_eq!(config.log_filter_source.as_deref(), Some("RUST_LOG"));
    }
}
