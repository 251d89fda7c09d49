use otpwait_core::{AcquireError, SourceError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Acquire(#[from] AcquireError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_)
            | Self::Command(_)
            | Self::Acquire(AcquireError::InvalidRequest(_)) => 2,
            Self::Acquire(AcquireError::Timeout { .. }) => 3,
            Self::Acquire(AcquireError::SourceUnavailable { .. } | AcquireError::NoSources)
            | Self::Source(_) => 4,
            Self::Acquire(AcquireError::AllSourcesExhausted { .. }) => 5,
            Self::Serialization(_) => 6,
            Self::Io(_) => 10,
        }
    }
}
