//! Command-line arguments for `otpwait`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `wait` | Wait for a new code and print it |
//! | `peek` | One read from one source, for diagnosing access problems |
//! | `sources` | Which sources are configured from the environment |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `json` | Output format (json, text) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//!
//! # Examples
//!
//! ```bash
//! # Wait up to two minutes on every configured source
//! otpwait wait
//!
//! # Local database first, Twilio as fallback, one shared 45 s budget
//! otpwait wait --source messages-db --fallback twilio --timeout-ms 45000 --shared-deadline
//!
//! # Print only the code
//! otpwait --format text wait --sender-suffix 1234
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use otpwait_core::SourceId;

/// Wait for an SMS one-time passcode and print it.
#[derive(Debug, Parser)]
#[command(
    name = "otpwait",
    author,
    version,
    about = "Wait for an SMS one-time passcode",
    long_about = "otpwait polls the Twilio message log, the local Messages database or the \
Messages app until a new message carrying a one-time passcode arrives.\n\
\n\
Messages already present when a source starts are never returned.\n\
\n\
Credentials and paths are read from the environment (or a .env file); \
see 'otpwait sources'."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Single JSON object.
    Json,
    /// Plain text (`wait` prints only the code).
    Text,
}

/// Source selection for `wait`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceSelector {
    /// Every configured source: messages-db, messages-app, then twilio.
    Auto,
    Twilio,
    MessagesDb,
    MessagesApp,
}

impl SourceSelector {
    pub const fn source_id(self) -> Option<SourceId> {
        match self {
            Self::Auto => None,
            Self::Twilio => Some(SourceId::Twilio),
            Self::MessagesDb => Some(SourceId::MessagesDb),
            Self::MessagesApp => Some(SourceId::MessagesApp),
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Wait for a new code and print it.
    ///
    ///   otpwait wait
    ///   otpwait wait --source twilio --timeout-ms 30000
    ///   otpwait wait --source messages-db --fallback twilio --shared-deadline
    Wait(WaitArgs),

    /// Read one batch of recent messages from a source.
    Peek(PeekArgs),

    /// List sources and whether they are configured.
    Sources,
}

#[derive(Debug, Args)]
pub struct WaitArgs {
    /// First source to poll; `auto` tries every configured source.
    #[arg(long, value_enum, default_value_t = SourceSelector::Auto)]
    pub source: SourceSelector,

    /// Sources to fall back to, in order, after --source fails.
    #[arg(long = "fallback", value_name = "SOURCE")]
    pub fallbacks: Vec<SourceId>,

    /// Time allowed per source in milliseconds (the whole chain with --shared-deadline).
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Delay between reads in milliseconds.
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Twilio lookback window in seconds.
    #[arg(long)]
    pub lookback_secs: Option<u64>,

    /// Rows/page size per read (defaults to each source's own).
    #[arg(long)]
    pub limit: Option<usize>,

    /// Only accept messages whose sender ends with these digits.
    #[arg(long)]
    pub sender_suffix: Option<String>,

    /// Extraction regex; capture group 1 is the code.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Split one timeout across the whole fallback chain.
    #[arg(long, default_value_t = false)]
    pub shared_deadline: bool,
}

#[derive(Debug, Args)]
pub struct PeekArgs {
    #[arg(long)]
    pub source: SourceId,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub lookback_secs: Option<u64>,
}
