//! Runtime settings resolved from defaults and `WORKGRID_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::layout::layout_cache::DEFAULT_CACHE_ENTRIES;

pub const ENV_DB: &str = "WORKGRID_DB";
pub const ENV_MEDIA_DIR: &str = "WORKGRID_MEDIA_DIR";
pub const ENV_MEDIA_URL: &str = "WORKGRID_MEDIA_URL";
pub const ENV_LAYOUT_CACHE: &str = "WORKGRID_LAYOUT_CACHE";

const DEFAULT_MEDIA_URL: &str = "/media";

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_path: PathBuf,
    pub media_root: PathBuf,
    /// Public prefix under which uploaded files are served.
    pub media_base_url: String,
    pub layout_cache_entries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let data_dir = ProjectDirs::from("", "", "workgrid")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".workgrid"));

        Self {
            database_path: data_dir.join("workgrid.sqlite"),
            media_root: data_dir.join("media"),
            media_base_url: DEFAULT_MEDIA_URL.to_string(),
            layout_cache_entries: DEFAULT_CACHE_ENTRIES,
        }
    }
}

impl Settings {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from any key lookup; empty values are ignored.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_DB) {
            self.database_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_MEDIA_DIR) {
            self.media_root = PathBuf::from(path);
        }
        if let Some(url) = get(ENV_MEDIA_URL) {
            self.media_base_url = url;
        }
        if let Some(entries) = get(ENV_LAYOUT_CACHE) {
            self.layout_cache_entries = entries
                .trim()
                .parse()
                .with_context(|| format!("{ENV_LAYOUT_CACHE} must be a number, got {entries:?}"))?;
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert!(settings.database_path.ends_with("workgrid.sqlite"));
        assert!(settings.media_root.ends_with("media"));
        assert_eq!(settings.media_base_url, "/media");
        assert_eq!(settings.layout_cache_entries, DEFAULT_CACHE_ENTRIES);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::default()
            .with_overrides(lookup(&[
                (ENV_DB, "/tmp/w.sqlite"),
                (ENV_MEDIA_DIR, "/srv/media"),
                (ENV_MEDIA_URL, "https://cdn.example.com"),
                (ENV_LAYOUT_CACHE, " 8 "),
            ]))
            .unwrap();
        assert_eq!(settings.database_path, PathBuf::from("/tmp/w.sqlite"));
        assert_eq!(settings.media_root, PathBuf::from("/srv/media"));
        assert_eq!(settings.media_base_url, "https://cdn.example.com");
        assert_eq!(settings.layout_cache_entries, 8);
    }

    #[test]
    fn test_empty_values_ignored() {
        let settings = Settings::default()
            .with_overrides(lookup(&[(ENV_DB, "  ")]))
            .unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_bad_cache_size() {
        let err = Settings::default()
            .with_overrides(lookup(&[(ENV_LAYOUT_CACHE, "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains(ENV_LAYOUT_CACHE));
    }
}
