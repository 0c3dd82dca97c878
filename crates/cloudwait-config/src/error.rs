use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found")]
    ConfigDirNotFound,

    #[error(
        "Config file not found. Looked in:\n\
        - CLOUDWAIT_CONFIG_PATH environment variable\n\
        - current directory: cloudwait.local.yaml, cloudwait.yaml\n\
        - ~/.config/cloudwait/config.yaml"
    )]
    ConfigFileNotFound,

    #[error("Invalid setting `{field}`: {reason}")]
    Invalid { field: String, reason: String },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
