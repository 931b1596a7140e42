pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AgentConfig, AppConfig, AppConfigLayer, ConfigError, ConfigManager, KeysConfig, LoggingConfig,
    UiConfig,
};
