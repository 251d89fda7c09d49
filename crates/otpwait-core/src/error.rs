use thiserror::Error;

use crate::data_source::SourceError;
use crate::SourceId;

/// Validation errors for caller-supplied configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid source '{value}', expected one of twilio, messages-db, messages-app")]
    InvalidSource { value: String },

    #[error("invalid extraction pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("sender filter cannot be empty")]
    EmptySenderFilter,

    #[error("recipient number cannot be empty")]
    EmptyRecipient,

    #[error("field '{field}' must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("environment variable '{name}' is not a valid number: '{value}'")]
    InvalidNumber { name: String, value: String },

    #[error("timestamp is not a recognised UTC format: '{value}'")]
    TimestampNotUtc { value: String },
}

/// Terminal outcome of an acquisition attempt or a fallback route.
///
/// `Timeout` means the channel was readable but nothing matched in time;
/// `SourceUnavailable` means the channel itself could not be read. Callers
/// pick their fallback behaviour from that distinction.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("no code from '{source_id}' within {waited_ms}ms ({poll_cycles} poll cycle(s))")]
    Timeout {
        source_id: SourceId,
        waited_ms: u64,
        poll_cycles: u32,
    },

    #[error("source '{source_id}' unavailable: {error}")]
    SourceUnavailable {
        source_id: SourceId,
        error: SourceError,
    },

    #[error("all sources exhausted: {}", join_failures(failures))]
    AllSourcesExhausted { failures: Vec<AcquireError> },

    #[error("no message sources configured")]
    NoSources,

    #[error("invalid acquisition request: {0}")]
    InvalidRequest(ValidationError),
}

impl AcquireError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "acquire.timeout",
            Self::SourceUnavailable { .. } => "acquire.source_unavailable",
            Self::AllSourcesExhausted { .. } => "acquire.all_sources_exhausted",
            Self::NoSources => "acquire.no_sources",
            Self::InvalidRequest(_) => "acquire.invalid_request",
        }
    }

    /// Source that produced this failure, when it is attributable to one.
    pub fn source_id(&self) -> Option<SourceId> {
        match self {
            Self::Timeout { source_id, .. } | Self::SourceUnavailable { source_id, .. } => {
                Some(*source_id)
            }
            Self::AllSourcesExhausted { .. } | Self::NoSources | Self::InvalidRequest(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

fn join_failures(failures: &[AcquireError]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
