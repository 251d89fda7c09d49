//! Message source trait and request/error types.
//!
//! This module defines the adapter contract (`MessageSource`) every channel
//! implementation follows. A source answers one question: which messages are
//! currently visible on the channel? Sources do not remember what they
//! returned before; de-duplication belongs to the poller.
//!
//! An empty `Vec` is a valid answer ("nothing yet"). A read that could not be
//! completed is always a [`SourceError`], never an empty result.
//!
//! # Example
//!
//! ```rust,ignore
//! use otpwait_core::{ListRequest, MessageSource, SourceError, TwilioAdapter};
//!
//! async fn dump(adapter: &TwilioAdapter) -> Result<(), SourceError> {
//!     let messages = adapter.list_recent(ListRequest::default()).await?;
//!     for message in &messages {
//!         println!("{}: {}", message.id, message.body);
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::{Message, SourceId};

pub const DEFAULT_LOOKBACK: Duration = Duration::from_secs(120);
pub const DEFAULT_LIMIT: usize = 10;

/// Why a read failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Transport failure talking to a remote provider.
    Network,
    /// Provider answered with a non-success status.
    Upstream,
    /// Credentials rejected or local access not granted.
    AccessDenied,
    /// Required external tool is not installed.
    ToolMissing,
    /// External tool ran and failed (locked store, bad query, ...).
    QueryFailed,
    /// Response could not be decoded.
    Malformed,
    InvalidRequest,
    NotRegistered,
}

/// Structured source error. Every kind means the channel could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Network, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Upstream, message)
    }

    pub fn access_denied(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::AccessDenied, message)
    }

    pub fn tool_missing(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::ToolMissing, message)
    }

    pub fn query_failed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::QueryFailed, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Malformed, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    pub fn not_registered(source: SourceId) -> Self {
        Self::new(
            SourceErrorKind::NotRegistered,
            format!("message source '{source}' is not registered"),
        )
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Network => "source.network",
            SourceErrorKind::Upstream => "source.upstream",
            SourceErrorKind::AccessDenied => "source.access_denied",
            SourceErrorKind::ToolMissing => "source.tool_missing",
            SourceErrorKind::QueryFailed => "source.query_failed",
            SourceErrorKind::Malformed => "source.malformed",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::NotRegistered => "source.not_registered",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Read parameters for one `list_recent` call.
///
/// `lookback` is re-applied relative to "now" on every call by sources that
/// support a time window, so the window slides forward while polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRequest {
    pub limit: usize,
    pub lookback: Duration,
}

impl ListRequest {
    pub fn new(limit: usize, lookback: Duration) -> Result<Self, SourceError> {
        if limit == 0 {
            return Err(SourceError::invalid_request(
                "list request limit must be greater than zero",
            ));
        }
        if lookback.is_zero() {
            return Err(SourceError::invalid_request(
                "list request lookback must be greater than zero",
            ));
        }
        Ok(Self { limit, lookback })
    }
}

impl Default for ListRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            lookback: DEFAULT_LOOKBACK,
        }
    }
}

pub type ListFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Message>, SourceError>> + Send + 'a>>;

/// Message source adapter contract.
///
/// # Required Methods
///
/// | Method | Description |
/// |--------|-------------|
/// | [`id`](MessageSource::id) | Channel identifier |
/// | [`default_limit`](MessageSource::default_limit) | Row/page size used when the caller has no preference |
/// | [`list_recent`](MessageSource::list_recent) | Current visible messages |
///
/// Implementations must be `Send + Sync`; the router shares them behind `Arc`.
pub trait MessageSource: Send + Sync {
    fn id(&self) -> SourceId;

    fn default_limit(&self) -> usize {
        DEFAULT_LIMIT
    }

    /// Returns the messages currently visible on the channel.
    ///
    /// Ordering is whatever the channel provides (newest-first for every
    /// bundled adapter) and is stable across consecutive calls for an
    /// unmodified range.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the channel cannot be read. Never returns
    /// an empty list in place of an error.
    fn list_recent<'a>(&'a self, req: ListRequest) -> ListFuture<'a>;
}
