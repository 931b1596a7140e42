use anyhow::Result;
use directories::{ProjectDirs, UserDirs};
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
    pub log_dir: PathBuf,
    pub config_file: PathBuf,
}

impl AppPaths {
    pub fn new() -> Result<Self> {
        let proj = ProjectDirs::from("org", "sshkeys", "sshkeys")
            .ok_or_else(|| anyhow::anyhow!("project dirs unavailable"))?;
        let config_dir = proj.config_dir().to_path_buf();
        let data_dir = proj.data_dir().to_path_buf();
        let log_dir = data_dir.join("logs");
        let config_file = config_dir.join("config.toml");
        Ok(Self {
            config_dir,
            data_dir,
            log_dir,
            config_file,
        })
    }

    /// Same layout, but reading the user config from `config_file`.
    pub fn with_config_file(mut self, config_file: PathBuf) -> Self {
        self.config_file = config_file;
        self
    }

    pub fn project_config_path(base: impl AsRef<Path>) -> PathBuf {
        base.as_ref().join(".sshkeys.toml")
    }

    /// `~/.ssh`, or `.ssh` relative to the working directory without a home.
    pub fn default_ssh_dir() -> PathBuf {
        match UserDirs::new() {
            Some(dirs) => dirs.home_dir().join(".ssh"),
            None => PathBuf::from(".ssh"),
        }
    }
}
