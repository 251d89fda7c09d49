use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use otpwait_core::{
    AcquireError, AcquireRequest, CodePattern, DeadlineBudget, EnvConfig, OtpRouter, RouteSuccess,
    SenderFilter, SourceId, SourceStrategy,
};

use crate::cli::WaitArgs;
use crate::error::CliError;

use super::CommandOutput;

/// Defaults of the manual listening entry point.
const DEFAULT_WAIT_TIMEOUT_MS: u64 = 120_000;
const DEFAULT_WAIT_LOOKBACK_SECS: u64 = 300;

#[derive(Debug, Serialize)]
struct WaitResponseData {
    code: String,
    source: SourceId,
    message_id: String,
    source_chain: Vec<SourceId>,
    poll_cycles: u32,
    latency_ms: u64,
    warnings: Vec<String>,
    failures: Vec<FailureData>,
}

#[derive(Debug, Serialize)]
struct FailureData {
    source: Option<SourceId>,
    code: &'static str,
    message: String,
}

impl From<&AcquireError> for FailureData {
    fn from(error: &AcquireError) -> Self {
        Self {
            source: error.source_id(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

pub async fn run(args: &WaitArgs, config: &EnvConfig, router: &OtpRouter) -> Result<CommandOutput, CliError> {
    let strategy = strategy(args)?;
    let request = request(args, config)?;

    debug!(?strategy, timeout_ms = request.budget.total().as_millis() as u64, "waiting for code");
    let route = router.acquire(&request, &strategy).await?;

    let text = route.code.to_string();
    let data = serde_json::to_value(response(route))?;
    Ok(CommandOutput::new(data, text))
}

fn strategy(args: &WaitArgs) -> Result<SourceStrategy, CliError> {
    match (args.source.source_id(), args.fallbacks.is_empty()) {
        (None, true) => Ok(SourceStrategy::Auto),
        (None, false) => Err(CliError::Command(String::from(
            "--fallback requires an explicit --source",
        ))),
        (Some(source), true) => Ok(SourceStrategy::Strict(source)),
        (Some(source), false) => {
            let mut chain = Vec::with_capacity(args.fallbacks.len() + 1);
            chain.push(source);
            chain.extend(args.fallbacks.iter().copied());
            Ok(SourceStrategy::Priority(chain))
        }
    }
}

fn request(args: &WaitArgs, config: &EnvConfig) -> Result<AcquireRequest, CliError> {
    let timeout = args
        .timeout_ms
        .map(Duration::from_millis)
        .or(config.timeout)
        .unwrap_or(Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS));
    let budget = if args.shared_deadline {
        DeadlineBudget::Shared(timeout)
    } else {
        DeadlineBudget::PerSource(timeout)
    };

    let mut request = AcquireRequest::new(budget).with_lookback(
        args.lookback_secs
            .map(Duration::from_secs)
            .or(config.lookback)
            .unwrap_or(Duration::from_secs(DEFAULT_WAIT_LOOKBACK_SECS)),
    );
    if let Some(interval) = args
        .poll_interval_ms
        .map(Duration::from_millis)
        .or(config.poll_interval)
    {
        request = request.with_poll_interval(interval);
    }
    if let Some(limit) = args.limit {
        request = request.with_limit(limit);
    }
    if let Some(pattern) = &args.pattern {
        request = request.with_pattern(CodePattern::new(pattern)?);
    }
    match &args.sender_suffix {
        Some(suffix) => request = request.with_sender_filter(SenderFilter::suffix(suffix.as_str())?),
        None => {
            if let Some(filter) = config.sender_filter()? {
                request = request.with_sender_filter(filter);
            }
        }
    }
    Ok(request)
}

fn response(route: RouteSuccess) -> WaitResponseData {
    WaitResponseData {
        code: route.code.into_inner(),
        source: route.selected_source,
        message_id: route.message_id.to_string(),
        source_chain: route.source_chain,
        poll_cycles: route.poll_cycles,
        latency_ms: route.latency_ms,
        warnings: route.warnings,
        failures: route.failures.iter().map(FailureData::from).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Command};
    use clap::Parser;

    fn wait_args(argv: &[&str]) -> WaitArgs {
        let cli = Cli::parse_from(std::iter::once("otpwait").chain(argv.iter().copied()));
        match cli.command {
            Command::Wait(args) => args,
            other => panic!("expected wait, got {other:?}"),
        }
    }

    #[test]
    fn source_and_fallbacks_become_a_priority_chain() {
        let args = wait_args(&["wait", "--source", "messages-db", "--fallback", "twilio"]);

        assert_eq!(
            strategy(&args).expect("valid strategy"),
            SourceStrategy::Priority(vec![SourceId::MessagesDb, SourceId::Twilio])
        );
    }

    #[test]
    fn explicit_source_alone_is_strict() {
        let args = wait_args(&["wait", "--source", "twilio"]);
        assert_eq!(
            strategy(&args).expect("valid strategy"),
            SourceStrategy::Strict(SourceId::Twilio)
        );
    }

    #[test]
    fn fallback_without_source_is_rejected() {
        let args = wait_args(&["wait", "--fallback", "twilio"]);
        assert!(matches!(strategy(&args), Err(CliError::Command(_))));
    }

    #[test]
    fn flags_override_environment_and_listen_defaults_apply() {
        let args = wait_args(&["wait", "--shared-deadline", "--poll-interval-ms", "250"]);
        let config = EnvConfig {
            timeout: Some(Duration::from_secs(45)),
            poll_interval: Some(Duration::from_secs(2)),
            ..EnvConfig::default()
        };

        let request = request(&args, &config).expect("valid request");

        assert_eq!(request.budget, DeadlineBudget::Shared(Duration::from_secs(45)));
        assert_eq!(request.poll_interval, Duration::from_millis(250));
        assert_eq!(request.lookback, Duration::from_secs(DEFAULT_WAIT_LOOKBACK_SECS));
    }

    #[test]
    fn invalid_pattern_is_a_validation_error() {
        let args = wait_args(&["wait", "--pattern", "(\\d{6}"]);
        let error = request(&args, &EnvConfig::default()).expect_err("bad regex");
        assert_eq!(error.exit_code(), 2);
    }
}
