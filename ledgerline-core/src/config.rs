//! Configuration management
//!
//! Settings live in settings.json in the data directory:
//! ```json
//! {
//!   "store": { "timeZone": "America/New_York", "sheetName": "Transactions" },
//!   "runtime": { "timeZone": "UTC" }
//! }
//! ```
//! Keys this crate does not manage are kept when saving.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

pub const DEFAULT_SHEET_NAME: &str = "Transactions";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    store: StoreSettings,
    #[serde(default)]
    runtime: RuntimeSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoreSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sheet_name: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuntimeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Ledgerline configuration (resolved view of settings and environment)
#[derive(Debug, Clone)]
pub struct Config {
    /// Zone new sheets are created in
    pub store_zone: Tz,
    /// Zone zone-less CSV dates are read in
    pub runtime_zone: Tz,
    pub sheet_name: String,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_zone: Tz::UTC,
            runtime_zone: Tz::UTC,
            sheet_name: DEFAULT_SHEET_NAME.to_string(),
            _raw_settings: SettingsFile::default(),
        }
    }
}

/// Parse an IANA zone name
pub fn parse_zone(name: &str) -> Result<Tz> {
    Tz::from_str(name.trim()).map_err(|_| Error::config(format!("Unknown time zone '{}'", name)))
}

impl Config {
    /// Load config from the data directory
    ///
    /// Zones can be overridden with `LEDGERLINE_STORE_TZ` and
    /// `LEDGERLINE_RUNTIME_TZ`. Without either setting, the runtime zone
    /// comes from `TZ` when it names a known zone.
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with_env(data_dir, |key| std::env::var(key).ok())
    }

    /// `load` with an explicit environment lookup
    pub fn load_with_env<F>(data_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings_path = data_dir.join("settings.json");
        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .map_err(|e| Error::config(format!("Invalid settings.json: {}", e)))?
        } else {
            SettingsFile::default()
        };

        let store_zone = match env("LEDGERLINE_STORE_TZ").or_else(|| raw.store.time_zone.clone()) {
            Some(name) => parse_zone(&name)?,
            None => Tz::UTC,
        };

        let runtime_zone = match env("LEDGERLINE_RUNTIME_TZ").or_else(|| raw.runtime.time_zone.clone()) {
            Some(name) => parse_zone(&name)?,
            None => env("TZ")
                .and_then(|tz| Tz::from_str(tz.trim_start_matches(':')).ok())
                .unwrap_or(Tz::UTC),
        };

        Ok(Self {
            store_zone,
            runtime_zone,
            sheet_name: raw
                .store
                .sheet_name
                .clone()
                .unwrap_or_else(|| DEFAULT_SHEET_NAME.to_string()),
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that the CLI doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        settings.store.time_zone = Some(self.store_zone.name().to_string());
        settings.store.sheet_name = Some(self.sheet_name.clone());
        settings.runtime.time_zone = Some(self.runtime_zone.name().to_string());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults_without_settings() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(config.store_zone, Tz::UTC);
        assert_eq!(config.runtime_zone, Tz::UTC);
        assert_eq!(config.sheet_name, "Transactions");
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"store": {"timeZone": "UTC", "color": "green"}, "theme": "dark"}"#,
        )
        .unwrap();

        let mut config = Config::load_with_env(dir.path(), no_env).unwrap();
        config.store_zone = Tz::America__New_York;
        config.save(dir.path()).unwrap();

        let saved: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("settings.json")).unwrap())
                .unwrap();
        assert_eq!(saved["theme"], "dark");
        assert_eq!(saved["store"]["color"], "green");
        assert_eq!(saved["store"]["timeZone"], "America/New_York");

        let reloaded = Config::load_with_env(dir.path(), no_env).unwrap();
        assert_eq!(reloaded.store_zone, Tz::America__New_York);
    }

    #[test]
    fn test_env_overrides_and_tz_fallback() {
        let dir = tempdir().unwrap();
        let config = Config::load_with_env(dir.path(), |key| match key {
            "LEDGERLINE_STORE_TZ" => Some("Europe/Paris".to_string()),
            "TZ" => Some(":America/Chicago".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(config.store_zone, Tz::Europe__Paris);
        assert_eq!(config.runtime_zone, Tz::America__Chicago);
    }

    #[test]
    fn test_invalid_zone_is_a_config_error() {
        let dir = tempdir().unwrap();
        let err = Config::load_with_env(dir.path(), |key| {
            (key == "LEDGERLINE_RUNTIME_TZ").then(|| "Mars/Olympus".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
