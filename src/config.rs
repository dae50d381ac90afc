use crate::error::SyncError;
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_FIELD_NAME: &str = "Harvest Hours";
pub const MAX_LOOKBACK_DAYS: u32 = 3650;

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "hoursync", "hoursync")
}

fn default_data_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("HOURSYNC_DATA_DIR") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.data_dir().to_path_buf();
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".hoursync")
}

fn default_log_dir() -> PathBuf {
    if let Some(path) = std::env::var_os("HOURSYNC_LOG_DIR") {
        return PathBuf::from(path);
    }
    default_data_dir().join("logs")
}

pub fn config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("HOURSYNC_CONFIG") {
        return PathBuf::from(path);
    }
    if let Some(dirs) = project_dirs() {
        return dirs.config_dir().join("config.toml");
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".hoursync-config.toml")
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub harvest: HarvestConfig,
    pub asana: AsanaConfig,
    pub data: DataConfig,
    pub http: HttpConfig,
    pub lock: LockConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HarvestConfig {
    pub access_token: String,
    pub account_id: String,
    pub base_url: String,
    pub lookback_days: u32,
    pub user_agent: String,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            account_id: String::new(),
            base_url: "https://api.harvestapp.com/v2".to_string(),
            lookback_days: 90,
            user_agent: format!("hoursync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AsanaConfig {
    pub access_token: String,
    pub base_url: String,
    pub field_name: String,
}

impl Default for AsanaConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            base_url: "https://app.asana.com/api/1.0".to_string(),
            field_name: DEFAULT_FIELD_NAME.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub state_dir: PathBuf,
    pub log_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            state_dir: default_data_dir(),
            log_dir: default_log_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_seconds: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 300,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LockConfig {
    pub timeout_seconds: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self { timeout_seconds: 5 }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(5))
    }
}

impl LockConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Config {
    /// Reads the TOML file if present, then layers credentials from the
    /// environment on top. A missing file is not an error; a malformed one is.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let mut config = match fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Config>(&content).map_err(|e| {
                SyncError::Config(format!("failed to parse {}: {e}", path.display()))
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Config::default(),
            Err(err) => {
                return Err(SyncError::Config(format!(
                    "failed to read {}: {err}",
                    path.display()
                )));
            }
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.normalize_paths();
        Ok(config)
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let set = |key: &str, slot: &mut String| {
            if let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) {
                *slot = value.trim().to_string();
            }
        };
        set("HARVEST_ACCESS_TOKEN", &mut self.harvest.access_token);
        set("HARVEST_ACCOUNT_ID", &mut self.harvest.account_id);
        set("ASANA_ACCESS_TOKEN", &mut self.asana.access_token);
    }

    fn normalize_paths(&mut self) {
        if self.data.state_dir.as_os_str().is_empty() {
            self.data.state_dir = default_data_dir();
        }
        if self.data.state_dir.is_relative() {
            self.data.state_dir = default_data_dir().join(&self.data.state_dir);
        }

        if self.data.log_dir.as_os_str().is_empty() {
            self.data.log_dir = default_log_dir();
        }
        if self.data.log_dir.is_relative() {
            self.data.log_dir = default_data_dir().join(&self.data.log_dir);
        }
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let mut missing = Vec::new();
        if self.harvest.access_token.trim().is_empty() {
            missing.push("HARVEST_ACCESS_TOKEN");
        }
        if self.harvest.account_id.trim().is_empty() {
            missing.push("HARVEST_ACCOUNT_ID");
        }
        if self.asana.access_token.trim().is_empty() {
            missing.push("ASANA_ACCESS_TOKEN");
        }
        if !missing.is_empty() {
            return Err(SyncError::Config(format!(
                "missing credentials: {}",
                missing.join(", ")
            )));
        }
        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.harvest.lookback_days) {
            return Err(SyncError::Config(format!(
                "harvest.lookback_days must be between 1 and {MAX_LOOKBACK_DAYS}"
            )));
        }
        if self.asana.field_name.trim().is_empty() {
            return Err(SyncError::Config("asana.field_name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_credentials_override_file_values() {
        let mut config = Config::default();
        config.harvest.access_token = "from-file".to_string();
        config.apply_env(env(&[
            ("HARVEST_ACCESS_TOKEN", " from-env "),
            ("HARVEST_ACCOUNT_ID", "12345"),
            ("ASANA_ACCESS_TOKEN", ""),
        ]));
        assert_eq!(config.harvest.access_token, "from-env");
        assert_eq!(config.harvest.account_id, "12345");
        assert_eq!(config.asana.access_token, "");
    }

    #[test]
    fn validate_names_every_missing_credential() {
        let mut config = Config::default();
        config.harvest.account_id = "1".to_string();
        let err = config.validate().expect_err("missing tokens");
        let message = err.to_string();
        assert!(message.contains("HARVEST_ACCESS_TOKEN"));
        assert!(message.contains("ASANA_ACCESS_TOKEN"));
        assert!(!message.contains("HARVEST_ACCOUNT_ID"));
    }

    #[test]
    fn validate_accepts_complete_config() {
        let mut config = Config::default();
        config.harvest.access_token = "h".to_string();
        config.harvest.account_id = "1".to_string();
        config.asana.access_token = "a".to_string();
        assert!(config.validate().is_ok());

        config.harvest.lookback_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_caps_lookback_days() {
        let mut config = Config::default();
        config.harvest.access_token = "h".to_string();
        config.harvest.account_id = "1".to_string();
        config.asana.access_token = "a".to_string();

        config.harvest.lookback_days = MAX_LOOKBACK_DAYS;
        assert!(config.validate().is_ok());
        config.harvest.lookback_days = u32::MAX;
        assert!(matches!(config.validate(), Err(SyncError::Config(_))));
    }

    #[test]
    fn load_reads_partial_toml_with_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        let state_dir = dir.path().join("state");
        fs::write(
            &path,
            format!(
                "[harvest]\nlookback_days = 30\n\n[data]\nstate_dir = {:?}\n",
                state_dir.display().to_string()
            ),
        )
        .expect("write config");

        let config = Config::load(&path).expect("load");
        assert_eq!(config.harvest.lookback_days, 30);
        assert_eq!(config.harvest.base_url, "https://api.harvestapp.com/v2");
        assert_eq!(config.asana.field_name, DEFAULT_FIELD_NAME);
        assert_eq!(config.data.state_dir, state_dir);
        assert_eq!(config.http.timeout_seconds, 300);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "[harvest\n").expect("write config");
        assert!(matches!(Config::load(&path), Err(SyncError::Config(_))));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let config = Config::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.lock.timeout_seconds, 5);
        assert!(config.data.state_dir.is_absolute());
    }
}
