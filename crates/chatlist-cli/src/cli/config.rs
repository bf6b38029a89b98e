use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chatlist_core::{StoreSchema, SyncConfig};
use serde::{Deserialize, Serialize};

const DEFAULT_INITIAL_LOAD_TIMEOUT_MS: u64 = 10_000;

/// CLI configuration that can be loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    /// Signed-in user whose conversation list is loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_user_id: Option<String>,

    /// Remote schema overrides
    #[serde(default)]
    pub schema: StoreSchema,

    /// How long to wait for the initial load before giving up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_load_timeout_ms: Option<u64>,
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: CliConfig = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// `<config_dir>/chatlist/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatlist").join("config.json"))
    }

    /// Explicit path first, then the default location if it exists, then defaults.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Engine config, with `--user` taking precedence over the file.
    pub fn sync_config(&self, user_override: Option<&str>) -> Result<SyncConfig> {
        let user = user_override
            .map(str::to_string)
            .or_else(|| self.current_user_id.clone());
        let Some(user) = user.filter(|u| !u.is_empty()) else {
            bail!("No current user: pass --user or set currentUserId in the config file");
        };
        Ok(SyncConfig::new(user).with_schema(self.schema.clone()))
    }

    pub fn initial_load_timeout(&self) -> Duration {
        Duration::from_millis(
            self.initial_load_timeout_ms
                .unwrap_or(DEFAULT_INITIAL_LOAD_TIMEOUT_MS),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_minimal() {
        let config: CliConfig = serde_json::from_str("{}").unwrap();
        assert!(config.current_user_id.is_none());
        assert_eq!(config.schema, StoreSchema::default());
        assert_eq!(config.initial_load_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "currentUserId": "me",
                "schema": {{"rosterRoot": "inbox"}},
                "initialLoadTimeoutMs": 250
            }}"#
        )
        .unwrap();

        let config = CliConfig::load(file.path()).unwrap();
        assert_eq!(config.current_user_id.as_deref(), Some("me"));
        assert_eq!(config.schema.roster_root, "inbox");
        assert_eq!(config.schema.users_root, "users");
        assert_eq!(config.initial_load_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_load_reports_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        let err = CliConfig::load(&missing).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{not json").unwrap();
        let err = CliConfig::resolve(Some(&broken)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_sync_config_user_precedence() {
        let config = CliConfig {
            current_user_id: Some("from-file".to_string()),
            ..Default::default()
        };
        assert_eq!(config.sync_config(None).unwrap().current_user_id, "from-file");
        assert_eq!(
            config.sync_config(Some("from-flag")).unwrap().current_user_id,
            "from-flag"
        );
        assert!(CliConfig::default().sync_config(None).is_err());
    }
}
