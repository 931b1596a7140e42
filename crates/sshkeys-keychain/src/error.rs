use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeychainError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("agent connection error: {0}")]
    AgentConnect(String),
    #[error("agent protocol error: {0}")]
    AgentProtocol(String),
}

impl KeychainError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Path that made a scan fail, if this is an I/O failure.
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Self::Io { path, .. } => Some(path),
            _ => None,
        }
    }
}
