use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error(
        "Stack file not found. Looked in:\n\
        - the current directory: stack.kdl, .stack.kdl\n\
        - ./.stackflow/\n\
        - ~/.config/stackflow/stack.kdl\n\
        Set STACKFLOW_CONFIG_PATH to point at a file directly"
    )]
    StackFileNotFound,

    #[error("Invalid settings file {path}: {message}")]
    InvalidSettings { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
