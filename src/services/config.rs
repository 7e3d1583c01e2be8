use crate::error::TallyError;
use crate::models::config::AppConfig;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration manager for the service settings file
pub struct ConfigManager {
    config_dir: PathBuf,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager for the platform config directory
    ///
    /// The file lives at `<config dir>/loot-tally/config.json`. Nothing is
    /// created on disk until `save()` is called.
    pub fn new() -> Result<Self, TallyError> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TallyError::Config("Failed to determine config directory".to_string()))?
            .join("loot-tally");

        let config_path = config_dir.join("config.json");

        Ok(Self {
            config_dir,
            config_path,
        })
    }

    /// Create a ConfigManager for an explicit file path
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        let config_path = path.as_ref().to_path_buf();
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        Self {
            config_dir,
            config_path,
        }
    }

    /// Save configuration to disk
    pub fn save(&self, config: &AppConfig) -> Result<(), TallyError> {
        fs::create_dir_all(&self.config_dir)?;

        // Pretty print for hand editing
        let json = serde_json::to_string_pretty(config)
            .map_err(|e| TallyError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(&self.config_path, json)?;

        Ok(())
    }

    /// Load and validate configuration from disk
    ///
    /// If the config file doesn't exist, returns the default configuration
    pub fn load(&self) -> Result<AppConfig, TallyError> {
        if !self.config_exists() {
            tracing::info!(
                "No config file at {}, using defaults",
                self.config_path.display()
            );
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)?;

        let config: AppConfig = serde_json::from_str(&content).map_err(|e| {
            TallyError::Config(format!(
                "Failed to parse {}: {}",
                self.config_path.display(),
                e
            ))
        })?;

        config.validate().map_err(TallyError::Config)?;

        tracing::info!("Loaded config from {}", self.config_path.display());
        Ok(config)
    }

    /// Get the config file path
    pub fn config_file_path(&self) -> &PathBuf {
        &self.config_path
    }

    /// Check if config file exists
    pub fn config_exists(&self) -> bool {
        self.config_path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::FailurePolicy;
    use tempfile::TempDir;

    fn create_test_manager() -> (ConfigManager, TempDir) {
        let dir = TempDir::new().unwrap();
        // Nested directory so save() has to create it
        let manager = ConfigManager::with_path(dir.path().join("nested").join("config.json"));
        (manager, dir)
    }

    #[test]
    fn test_config_manager_new_path() {
        match dirs::config_dir() {
            Some(base) => {
                let manager = ConfigManager::new().unwrap();
                assert_eq!(
                    manager.config_file_path(),
                    &base.join("loot-tally").join("config.json")
                );
            }
            // No HOME / XDG dirs on this host
            None => assert!(matches!(ConfigManager::new(), Err(TallyError::Config(_)))),
        }
    }

    #[test]
    fn test_config_load_default_when_not_exists() {
        let (manager, _dir) = create_test_manager();

        assert!(!manager.config_exists());

        let config = manager.load().expect("load() should return default when file doesn't exist");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_config_save_and_load() {
        let (manager, _dir) = create_test_manager();

        let mut config = AppConfig::default();
        config.server.port = 8080;
        config.matching.threshold = 0.25;
        config.batch.failure_policy = FailurePolicy::SkipFailed;

        manager.save(&config).expect("save should succeed");
        assert!(manager.config_exists(), "Config file should exist after save");

        let loaded = manager.load().expect("load should succeed");
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_load_rejects_invalid_values() {
        let (manager, _dir) = create_test_manager();

        let mut config = AppConfig::default();
        config.matching.threshold = 2.0;
        manager.save(&config).unwrap();

        let result = manager.load();
        assert!(matches!(result, Err(TallyError::Config(_))));
    }

    #[test]
    fn test_config_load_rejects_malformed_json() {
        let (manager, _dir) = create_test_manager();
        fs::create_dir_all(manager.config_file_path().parent().unwrap()).unwrap();
        fs::write(manager.config_file_path(), "{ not json").unwrap();

        assert!(matches!(manager.load(), Err(TallyError::Config(_))));
    }

    #[test]
    fn test_config_overwrite() {
        let (manager, _dir) = create_test_manager();

        let mut config1 = AppConfig::default();
        config1.server.port = 4000;
        manager.save(&config1).unwrap();

        let mut config2 = AppConfig::default();
        config2.server.port = 5000;
        manager.save(&config2).unwrap();

        let loaded = manager.load().unwrap();
        assert_eq!(loaded.server.port, 5000);
    }
}
