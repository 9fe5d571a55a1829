use thiserror::Error;

/// All errors that can occur in catalogizer-dedup.
#[derive(Debug, Error)]
pub enum DedupError {
    #[error("duplicate detection cancelled")]
    Cancelled,

    #[error("invalid scoring profile: {0}")]
    InvalidProfile(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, DedupError>;
