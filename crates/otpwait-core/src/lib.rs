//! # otpwait core
//!
//! Waits for a one-time passcode delivered by SMS and returns it exactly once.
//!
//! ## Overview
//!
//! - **Message sources** for the Twilio message log, the local Messages
//!   database and the Messages app
//! - **Seen-set** seeded from a baseline read, so codes delivered before an
//!   attempt started are never returned
//! - **Code extraction** with a configurable pattern (first six-digit run by default)
//! - **Poller** driving one source on an interval until a code, the deadline or a read failure
//! - **Router** running sources in sequence with per-source or shared deadlines
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Twilio, Messages database and Messages app sources |
//! | [`clock`] | Time source (real and virtual) |
//! | [`command_runner`] | External process abstraction |
//! | [`config`] | Environment configuration |
//! | [`data_source`] | Message source trait and request/error types |
//! | [`domain`] | Messages, identities, timestamps, codes |
//! | [`error`] | Validation and acquisition errors |
//! | [`extract`] | Code pattern and sender filter |
//! | [`http_client`] | HTTP client abstraction |
//! | [`poller`] | Attempt state machine |
//! | [`routing`] | Fallback router |
//! | [`seen`] | Attempt-scoped seen-set |
//! | [`source`] | Source identifiers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use otpwait_core::{acquire_otp, AcquireRequest, DeadlineBudget, OtpRouterBuilder};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let router = OtpRouterBuilder::new().with_env()?.build()?;
//!     let request = AcquireRequest::new(DeadlineBudget::Shared(Duration::from_secs(45)));
//!
//!     let code = acquire_otp(&router, &request).await?;
//!     println!("{code}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ CLI / automation│
//! └────────┬────────┘
//!          │ acquire_otp
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │   OtpRouter     │────▶│ Clock            │
//! └────────┬────────┘     └──────────────────┘
//!          │ one Attempt per source, in sequence
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Attempt         │────▶│ SeenSet          │
//! │ (state machine) │────▶│ CodePattern      │
//! └────────┬────────┘     └──────────────────┘
//!          │ list_recent
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ MessageSource   │────▶│ HttpClient /     │
//! │ (adapter trait) │     │ CommandRunner    │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! A read failure ends the attempt at once; it is never treated as "no
//! message yet". Only the router absorbs failures, by moving to the next
//! source:
//!
//! ```rust
//! use otpwait_core::AcquireError;
//!
//! fn describe(error: &AcquireError) -> &'static str {
//!     match error {
//!         AcquireError::Timeout { .. } => "channel readable, nothing arrived",
//!         AcquireError::SourceUnavailable { .. } => "channel could not be read",
//!         AcquireError::AllSourcesExhausted { .. } => "every source failed",
//!         AcquireError::NoSources => "nothing configured",
//!         AcquireError::InvalidRequest(_) => "request rejected before any read",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The Twilio auth token is held as a [`secrecy::SecretString`]
//! - [`OtpCode`] redacts itself in `Debug`, and codes are never logged

pub mod adapters;
pub mod clock;
pub mod command_runner;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod extract;
pub mod http_client;
pub mod poller;
pub mod routing;
pub mod seen;
pub mod source;

pub use adapters::{
    MessagesAppAdapter, MessagesDbAdapter, TwilioAdapter, MESSAGES_DB_ROW_LIMIT, TWILIO_API_BASE,
    TWILIO_PAGE_SIZE,
};

pub use clock::{Clock, ManualClock, SleepFuture, TokioClock};

pub use command_runner::{CannedRunner, CommandError, CommandFuture, CommandRunner, ProcessRunner};

pub use config::EnvConfig;

pub use data_source::{
    ListFuture, ListRequest, MessageSource, SourceError, SourceErrorKind, DEFAULT_LIMIT,
    DEFAULT_LOOKBACK,
};

pub use domain::{Message, MessageId, OtpCode, UtcDateTime};

pub use error::{AcquireError, ValidationError};

pub use extract::{CodePattern, SenderFilter, DEFAULT_CODE_PATTERN};

pub use http_client::{
    CannedHttpClient, HttpClient, HttpError, HttpFuture, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

pub use poller::{
    poll_for_code, scan, Acquired, Attempt, AttemptState, PollConfig, ScanMatch,
    DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT,
};

pub use routing::{
    acquire_otp, AcquireRequest, DeadlineBudget, OtpRouter, OtpRouterBuilder, RouteSuccess,
    SourceStrategy,
};

pub use seen::SeenSet;

pub use source::SourceId;
