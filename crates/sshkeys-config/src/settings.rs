use crate::paths::AppPaths;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub keys: KeysConfig,
    pub agent: AgentConfig,
    pub logging: LoggingConfig,
    pub ui: UiConfig,
}

impl AppConfig {
    pub fn keys_root(&self) -> PathBuf {
        self.keys
            .root
            .clone()
            .unwrap_or_else(AppPaths::default_ssh_dir)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AppConfigLayer {
    pub keys: Option<KeysConfigLayer>,
    pub agent: Option<AgentConfigLayer>,
    pub logging: Option<LoggingConfigLayer>,
    pub ui: Option<UiConfigLayer>,
}

impl AppConfigLayer {
    pub fn apply_to(self, cfg: &mut AppConfig) {
        if let Some(layer) = self.keys {
            cfg.keys.apply(layer);
        }
        if let Some(layer) = self.agent {
            cfg.agent.apply(layer);
        }
        if let Some(layer) = self.logging {
            cfg.logging.apply(layer);
        }
        if let Some(layer) = self.ui {
            cfg.ui.apply(layer);
        }
    }

    /// Layer carrying only the command-line overrides.
    pub fn from_overrides(root: Option<PathBuf>, socket: Option<PathBuf>) -> Self {
        Self {
            keys: root.map(|root| KeysConfigLayer { root: Some(root) }),
            agent: socket.map(|socket| AgentConfigLayer {
                socket: Some(socket),
            }),
            ..Default::default()
        }
    }
}

/// Where private keys are searched for. `None` means `~/.ssh`.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct KeysConfig {
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct KeysConfigLayer {
    pub root: Option<PathBuf>,
}

impl KeysConfig {
    fn apply(&mut self, layer: KeysConfigLayer) {
        if layer.root.is_some() {
            self.root = layer.root;
        }
    }
}

/// Agent socket. `None` means `$SSH_AUTH_SOCK`.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AgentConfig {
    pub socket: Option<PathBuf>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AgentConfigLayer {
    pub socket: Option<PathBuf>,
}

impl AgentConfig {
    fn apply(&mut self, layer: AgentConfigLayer) {
        if layer.socket.is_some() {
            self.socket = layer.socket;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
    pub stdout: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            stdout: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct LoggingConfigLayer {
    pub level: Option<String>,
    pub json: Option<bool>,
    pub stdout: Option<bool>,
}

impl LoggingConfig {
    fn apply(&mut self, layer: LoggingConfigLayer) {
        if let Some(v) = layer.level {
            self.level = v;
        }
        if let Some(v) = layer.json {
            self.json = v;
        }
        if let Some(v) = layer.stdout {
            self.stdout = v;
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UiConfig {
    pub show_format: bool,
    pub show_path: bool,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            show_format: true,
            show_path: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct UiConfigLayer {
    pub show_format: Option<bool>,
    pub show_path: Option<bool>,
}

impl UiConfig {
    fn apply(&mut self, layer: UiConfigLayer) {
        if let Some(v) = layer.show_format {
            self.show_format = v;
        }
        if let Some(v) = layer.show_path {
            self.show_path = v;
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConfigManager {
    pub paths: AppPaths,
}

impl ConfigManager {
    pub fn new(paths: AppPaths) -> Self {
        Self { paths }
    }

    pub fn load(&self, cwd: Option<&Path>, overrides: Option<AppConfigLayer>) -> Result<AppConfig> {
        let mut cfg = AppConfig::default();

        if self.paths.config_file.exists() {
            debug!(path = %self.paths.config_file.display(), "loading config");
            let layer = Self::load_layer(&self.paths.config_file)?;
            layer.apply_to(&mut cfg);
        }

        if let Some(dir) = cwd {
            let project_path = AppPaths::project_config_path(dir);
            if project_path.exists() {
                debug!(path = %project_path.display(), "loading project config");
                let layer = Self::load_layer(&project_path)?;
                layer.apply_to(&mut cfg);
            }
        }

        if let Some(layer) = overrides {
            layer.apply_to(&mut cfg);
        }

        Ok(cfg)
    }

    pub fn load_layer(path: &Path) -> Result<AppConfigLayer, ConfigError> {
        let content = fs::read_to_string(path)?;
        let layer: AppConfigLayer = toml::from_str(&content)?;
        Ok(layer)
    }

    pub fn save_default(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            fs::create_dir_all(parent)?;
        }
        let cfg = AppConfig::default();
        let content = toml::to_string_pretty(&cfg).map_err(|e| anyhow::anyhow!(e))?;
        fs::write(&self.paths.config_file, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths_in(dir: &Path) -> AppPaths {
        AppPaths {
            config_dir: dir.to_path_buf(),
            data_dir: dir.to_path_buf(),
            log_dir: dir.join("logs"),
            config_file: dir.join("config.toml"),
        }
    }

    #[test]
    fn apply_layer_overrides() {
        let mut cfg = AppConfig::default();
        let layer = AppConfigLayer {
            logging: Some(LoggingConfigLayer {
                level: Some("debug".to_string()),
                json: Some(true),
                stdout: None,
            }),
            ui: Some(UiConfigLayer {
                show_format: Some(false),
                show_path: None,
            }),
            ..Default::default()
        };
        layer.apply_to(&mut cfg);
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
        assert!(!cfg.logging.stdout);
        assert!(!cfg.ui.show_format);
        assert!(!cfg.ui.show_path);
        assert!(cfg.keys.root.is_none());
    }

    #[test]
    fn layers_apply_in_order() {
        let home = TempDir::new().unwrap();
        let project = TempDir::new().unwrap();
        fs::write(
            home.path().join("config.toml"),
            "[keys]\nroot = \"/from/user\"\n[agent]\nsocket = \"/from/user.sock\"\n",
        )
        .unwrap();
        fs::write(
            project.path().join(".sshkeys.toml"),
            "[keys]\nroot = \"/from/project\"\n",
        )
        .unwrap();

        let manager = ConfigManager::new(paths_in(home.path()));
        let cfg = manager.load(Some(project.path()), None).unwrap();
        assert_eq!(cfg.keys_root(), PathBuf::from("/from/project"));
        assert_eq!(cfg.agent.socket, Some(PathBuf::from("/from/user.sock")));

        let overrides = AppConfigLayer::from_overrides(Some(PathBuf::from("/from/cli")), None);
        let cfg = manager.load(Some(project.path()), Some(overrides)).unwrap();
        assert_eq!(cfg.keys_root(), PathBuf::from("/from/cli"));
        assert_eq!(cfg.agent.socket, Some(PathBuf::from("/from/user.sock")));
    }

    #[test]
    fn default_config_roundtrips_through_file() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::new(paths_in(&dir.path().join("nested")));
        manager.save_default().unwrap();
        let cfg = manager.load(None, None).unwrap();
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.ui.show_format);
    }

    #[test]
    fn broken_file_is_a_toml_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[keys\nroot = 1").unwrap();
        assert!(matches!(
            ConfigManager::load_layer(&path),
            Err(ConfigError::Toml(_))
        ));
    }
}
