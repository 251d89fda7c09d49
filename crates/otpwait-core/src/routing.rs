use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use crate::adapters::{MessagesAppAdapter, MessagesDbAdapter, TwilioAdapter};
use crate::clock::{Clock, TokioClock};
use crate::command_runner::{CommandRunner, ProcessRunner};
use crate::config::EnvConfig;
use crate::data_source::{ListRequest, MessageSource, SourceError, DEFAULT_LOOKBACK};
use crate::extract::{CodePattern, SenderFilter};
use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::poller::{duration_ms, Attempt, PollConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use crate::{AcquireError, Message, MessageId, OtpCode, SourceId, ValidationError};

/// Source selection strategy for routing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceStrategy {
    /// Every registered source in default preference order.
    Auto,
    Priority(Vec<SourceId>),
    /// One source, no fallback.
    Strict(SourceId),
}

/// How the overall wait is split across a fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadlineBudget {
    /// Every source gets the full duration.
    PerSource(Duration),
    /// One total; each source receives `remaining / sources_left`.
    Shared(Duration),
}

impl DeadlineBudget {
    pub const fn total(self) -> Duration {
        match self {
            Self::PerSource(duration) | Self::Shared(duration) => duration,
        }
    }

    /// Timeout for the next source, or `None` when a shared budget is spent.
    fn timeout_for(self, elapsed: Duration, sources_left: usize) -> Option<Duration> {
        match self {
            Self::PerSource(duration) => Some(duration),
            Self::Shared(total) => {
                let remaining = total.saturating_sub(elapsed);
                let share = remaining / u32::try_from(sources_left.max(1)).unwrap_or(u32::MAX);
                (!share.is_zero()).then_some(share)
            }
        }
    }
}

impl Default for DeadlineBudget {
    fn default() -> Self {
        Self::PerSource(DEFAULT_TIMEOUT)
    }
}

/// Caller-supplied parameters for one acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct AcquireRequest {
    pub poll_interval: Duration,
    pub budget: DeadlineBudget,
    pub lookback: Duration,
    /// Per-read row/page limit; `None` uses each source's own default.
    pub limit: Option<usize>,
    pub pattern: CodePattern,
    pub sender_filter: Option<SenderFilter>,
}

impl Default for AcquireRequest {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            budget: DeadlineBudget::default(),
            lookback: DEFAULT_LOOKBACK,
            limit: None,
            pattern: CodePattern::default(),
            sender_filter: None,
        }
    }
}

impl AcquireRequest {
    pub fn new(budget: DeadlineBudget) -> Self {
        Self {
            budget,
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_lookback(mut self, lookback: Duration) -> Self {
        self.lookback = lookback;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_pattern(mut self, pattern: CodePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_sender_filter(mut self, filter: SenderFilter) -> Self {
        self.sender_filter = Some(filter);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.poll_interval.is_zero() {
            return Err(ValidationError::ZeroValue {
                field: "poll_interval",
            });
        }
        if self.budget.total().is_zero() {
            return Err(ValidationError::ZeroValue { field: "timeout" });
        }
        if self.lookback.is_zero() {
            return Err(ValidationError::ZeroValue { field: "lookback" });
        }
        if self.limit == Some(0) {
            return Err(ValidationError::ZeroValue { field: "limit" });
        }
        Ok(())
    }

    fn poll_config(&self, source: &dyn MessageSource, timeout: Duration) -> Result<PollConfig, SourceError> {
        let list = ListRequest::new(self.limit.unwrap_or(source.default_limit()), self.lookback)?;
        let config = PollConfig::new(self.poll_interval, timeout)
            .map_err(|error| SourceError::invalid_request(error.to_string()))?;
        Ok(config
            .with_list(list)
            .with_pattern(self.pattern.clone())
            .with_sender_filter(self.sender_filter.clone()))
    }
}

/// Successful routed acquisition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteSuccess {
    pub code: OtpCode,
    pub selected_source: SourceId,
    pub message_id: MessageId,
    pub source_chain: Vec<SourceId>,
    /// Failures of the sources tried before `selected_source`, in order.
    pub failures: Vec<AcquireError>,
    pub warnings: Vec<String>,
    pub poll_cycles: u32,
    pub latency_ms: u64,
}

/// Source registry and sequential fallback engine.
pub struct OtpRouter {
    sources: HashMap<SourceId, Arc<dyn MessageSource>>,
    clock: Arc<dyn Clock>,
}

impl OtpRouter {
    pub fn new(sources: Vec<Arc<dyn MessageSource>>) -> Self {
        let sources = sources
            .into_iter()
            .map(|source| (source.id(), source))
            .collect();
        Self {
            sources,
            clock: Arc::new(TokioClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Registered sources in default preference order.
    pub fn registered(&self) -> Vec<SourceId> {
        SourceId::ALL
            .into_iter()
            .filter(|id| self.sources.contains_key(id))
            .collect()
    }

    pub fn source_chain_for_strategy(&self, strategy: &SourceStrategy) -> Vec<SourceId> {
        match strategy {
            SourceStrategy::Auto => self.registered(),
            SourceStrategy::Priority(priority) => dedupe_chain(priority),
            SourceStrategy::Strict(source) => vec![*source],
        }
    }

    pub fn source(&self, source_id: SourceId) -> Option<&Arc<dyn MessageSource>> {
        self.sources.get(&source_id)
    }

    /// One read from one source, outside any attempt.
    pub async fn peek(&self, source_id: SourceId, req: ListRequest) -> Result<Vec<Message>, SourceError> {
        let source = self
            .sources
            .get(&source_id)
            .ok_or_else(|| SourceError::not_registered(source_id))?;
        source.list_recent(req).await
    }

    /// Runs the planned sources strictly in sequence until one yields a code.
    ///
    /// Each source gets a fresh attempt, so its baseline is taken when that
    /// source starts, not when the route started.
    pub async fn acquire(
        &self,
        request: &AcquireRequest,
        strategy: &SourceStrategy,
    ) -> Result<RouteSuccess, AcquireError> {
        request.validate().map_err(AcquireError::InvalidRequest)?;

        let started = self.clock.now();
        let plan = self.source_chain_for_strategy(strategy);
        if plan.is_empty() {
            return Err(AcquireError::NoSources);
        }

        let mut source_chain = Vec::with_capacity(plan.len());
        let mut failures = Vec::new();

        for (index, source_id) in plan.iter().copied().enumerate() {
            source_chain.push(source_id);
            if !failures.is_empty() {
                info!(
                    source = %source_id,
                    previous_failures = failures.len(),
                    "falling back to next source"
                );
            }

            let Some(source) = self.sources.get(&source_id) else {
                warn!(source = %source_id, "source is not registered");
                failures.push(AcquireError::SourceUnavailable {
                    source_id,
                    error: SourceError::not_registered(source_id),
                });
                continue;
            };

            let sources_left = plan[index..]
                .iter()
                .filter(|id| self.sources.contains_key(id))
                .count();
            let elapsed = self.clock.now().saturating_duration_since(started);
            let Some(timeout) = request.budget.timeout_for(elapsed, sources_left) else {
                info!(source = %source_id, "shared deadline spent before source could start");
                failures.push(AcquireError::Timeout {
                    source_id,
                    waited_ms: 0,
                    poll_cycles: 0,
                });
                continue;
            };

            let config = match request.poll_config(source.as_ref(), timeout) {
                Ok(config) => config,
                Err(error) => {
                    failures.push(AcquireError::SourceUnavailable { source_id, error });
                    continue;
                }
            };

            match Attempt::new(source.as_ref(), self.clock.as_ref(), &config)
                .run()
                .await
            {
                Ok(acquired) => {
                    let mut warnings = Vec::new();
                    if !failures.is_empty() {
                        warnings.push(format!(
                            "source fallback succeeded with '{}' after {} failed attempt(s)",
                            source_id.as_str(),
                            failures.len()
                        ));
                    }

                    return Ok(RouteSuccess {
                        code: acquired.code,
                        selected_source: source_id,
                        message_id: acquired.message_id,
                        source_chain,
                        failures,
                        warnings,
                        poll_cycles: acquired.poll_cycles,
                        latency_ms: elapsed_ms(self.clock.as_ref(), started),
                    });
                }
                Err(error) => failures.push(error),
            }
        }

        if failures.len() == 1 {
            return Err(failures.remove(0));
        }
        Err(AcquireError::AllSourcesExhausted { failures })
    }
}

/// Acquire a code from every registered source in default preference order.
///
/// This is the whole contract offered to automation callers: it only reads
/// message channels and returns a code or a terminal error.
pub async fn acquire_otp(router: &OtpRouter, request: &AcquireRequest) -> Result<OtpCode, AcquireError> {
    router
        .acquire(request, &SourceStrategy::Auto)
        .await
        .map(|success| success.code)
}

/// Builder for an [`OtpRouter`] with production adapters.
///
/// Sources are registered only when they can be constructed: the cloud source
/// needs all three credentials, the local store needs a database path (explicit
/// or `$HOME/Library/Messages/chat.db`). Local sources default to enabled only
/// on macOS.
///
/// # Example
///
/// ```rust,ignore
/// use otpwait_core::OtpRouterBuilder;
///
/// let router = OtpRouterBuilder::new().with_env()?.build()?;
/// ```
pub struct OtpRouterBuilder {
    twilio_account_sid: Option<String>,
    twilio_auth_token: Option<SecretString>,
    twilio_recipient: Option<String>,
    twilio_base_url: Option<String>,
    messages_db_path: Option<PathBuf>,
    enable_twilio: bool,
    enable_messages_db: bool,
    enable_messages_app: bool,
    http_client: Option<Arc<dyn HttpClient>>,
    command_runner: Option<Arc<dyn CommandRunner>>,
    clock: Option<Arc<dyn Clock>>,
}

impl Default for OtpRouterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OtpRouterBuilder {
    pub fn new() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_recipient: None,
            twilio_base_url: None,
            messages_db_path: None,
            enable_twilio: true,
            enable_messages_db: cfg!(target_os = "macos"),
            enable_messages_app: cfg!(target_os = "macos"),
            http_client: None,
            command_runner: None,
            clock: None,
        }
    }

    /// Reads credentials and paths through [`EnvConfig::load`].
    pub fn with_env(self) -> Result<Self, ValidationError> {
        Ok(self.with_config(&EnvConfig::load()?))
    }

    pub fn with_config(mut self, config: &EnvConfig) -> Self {
        if let (Some(sid), Some(token), Some(recipient)) = (
            &config.twilio_account_sid,
            &config.twilio_auth_token,
            &config.twilio_phone_number,
        ) {
            self = self.with_twilio(sid.clone(), token.expose_secret(), recipient.clone());
        }
        if let Some(path) = &config.messages_db_path {
            self = self.with_messages_db_path(path.clone());
        }
        self
    }

    pub fn with_twilio(
        mut self,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Self {
        self.twilio_account_sid = Some(account_sid.into());
        self.twilio_auth_token = Some(SecretString::from(auth_token.into()));
        self.twilio_recipient = Some(recipient.into());
        self
    }

    pub fn with_twilio_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.twilio_base_url = Some(base_url.into());
        self
    }

    /// Sets the database path and enables the local store source.
    pub fn with_messages_db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.messages_db_path = Some(path.into());
        self.enable_messages_db = true;
        self
    }

    pub fn with_twilio_enabled(mut self, enabled: bool) -> Self {
        self.enable_twilio = enabled;
        self
    }

    pub fn with_messages_db_enabled(mut self, enabled: bool) -> Self {
        self.enable_messages_db = enabled;
        self
    }

    pub fn with_messages_app_enabled(mut self, enabled: bool) -> Self {
        self.enable_messages_app = enabled;
        self
    }

    pub fn with_http_client(mut self, http_client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(http_client);
        self
    }

    pub fn with_command_runner(mut self, runner: Arc<dyn CommandRunner>) -> Self {
        self.command_runner = Some(runner);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<OtpRouter, ValidationError> {
        let mut sources: Vec<Arc<dyn MessageSource>> = Vec::new();
        let clock: Arc<dyn Clock> = match self.clock {
            Some(clock) => clock,
            None => Arc::new(TokioClock),
        };
        let runner: Arc<dyn CommandRunner> = match self.command_runner {
            Some(runner) => runner,
            None => Arc::new(ProcessRunner),
        };

        if self.enable_messages_db {
            if let Some(path) = self
                .messages_db_path
                .or_else(MessagesDbAdapter::default_db_path)
            {
                sources.push(Arc::new(MessagesDbAdapter::with_runner(runner.clone(), path)));
            }
        }

        if self.enable_messages_app {
            sources.push(Arc::new(MessagesAppAdapter::with_runner(runner)));
        }

        if self.enable_twilio {
            if let (Some(sid), Some(token), Some(recipient)) = (
                self.twilio_account_sid,
                self.twilio_auth_token,
                self.twilio_recipient,
            ) {
                let http_client: Arc<dyn HttpClient> = match self.http_client {
                    Some(http_client) => http_client,
                    None => Arc::new(ReqwestHttpClient::new()),
                };
                let mut adapter =
                    TwilioAdapter::with_http_client(http_client, sid, token.expose_secret(), recipient)?
                        .with_clock(clock.clone());
                if let Some(base_url) = self.twilio_base_url {
                    adapter = adapter.with_base_url(base_url);
                }
                sources.push(Arc::new(adapter));
            }
        }

        Ok(OtpRouter::new(sources).with_clock(clock))
    }
}

fn dedupe_chain(chain: &[SourceId]) -> Vec<SourceId> {
    let mut seen = HashSet::new();
    chain
        .iter()
        .copied()
        .filter(|source| seen.insert(*source))
        .collect()
}

fn elapsed_ms(clock: &dyn Clock, started: Instant) -> u64 {
    duration_ms(clock.now().saturating_duration_since(started))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::command_runner::CannedRunner;
    use crate::http_client::{CannedHttpClient, HttpResponse};

    #[test]
    fn shared_budget_splits_remaining_time() {
        let budget = DeadlineBudget::Shared(Duration::from_secs(60));

        assert_eq!(
            budget.timeout_for(Duration::ZERO, 2),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            budget.timeout_for(Duration::from_secs(10), 1),
            Some(Duration::from_secs(50))
        );
        assert_eq!(budget.timeout_for(Duration::from_secs(60), 1), None);
        assert_eq!(
            DeadlineBudget::PerSource(Duration::from_secs(5)).timeout_for(Duration::from_secs(99), 3),
            Some(Duration::from_secs(5))
        );
    }

    #[test]
    fn priority_chain_is_deduplicated_in_order() {
        let router = OtpRouter::new(Vec::new());
        let chain = router.source_chain_for_strategy(&SourceStrategy::Priority(vec![
            SourceId::Twilio,
            SourceId::MessagesDb,
            SourceId::Twilio,
        ]));

        assert_eq!(chain, vec![SourceId::Twilio, SourceId::MessagesDb]);
    }

    #[test]
    fn validate_rejects_zero_values() {
        assert!(AcquireRequest::default().validate().is_ok());
        assert_eq!(
            AcquireRequest::default()
                .with_poll_interval(Duration::ZERO)
                .validate(),
            Err(ValidationError::ZeroValue {
                field: "poll_interval"
            })
        );
        assert_eq!(
            AcquireRequest::new(DeadlineBudget::Shared(Duration::ZERO)).validate(),
            Err(ValidationError::ZeroValue { field: "timeout" })
        );
    }

    #[tokio::test]
    async fn empty_router_has_no_sources() {
        let router = OtpRouter::new(Vec::new());
        let error = router
            .acquire(&AcquireRequest::default(), &SourceStrategy::Auto)
            .await
            .expect_err("nothing registered");

        assert_eq!(error, AcquireError::NoSources);
    }

    #[tokio::test]
    async fn strict_unregistered_source_returns_its_error_unchanged() {
        let router = OtpRouter::new(Vec::new());
        let error = router
            .acquire(
                &AcquireRequest::default(),
                &SourceStrategy::Strict(SourceId::Twilio),
            )
            .await
            .expect_err("twilio is not registered");

        let AcquireError::SourceUnavailable { source_id, error } = error else {
            panic!("expected source unavailable, got {error:?}");
        };
        assert_eq!(source_id, SourceId::Twilio);
        assert_eq!(error.code(), "source.not_registered");
    }

    #[test]
    fn builder_registers_only_constructible_sources() {
        let router = OtpRouterBuilder::new()
            .with_messages_db_enabled(false)
            .with_messages_app_enabled(false)
            .build()
            .expect("builds");
        assert!(router.registered().is_empty());

        let router = OtpRouterBuilder::new()
            .with_twilio("AC123", "secret", "+15550001111")
            .with_messages_db_path("/tmp/chat.db")
            .with_messages_app_enabled(false)
            .with_http_client(Arc::new(CannedHttpClient::new()))
            .with_command_runner(Arc::new(CannedRunner::new()))
            .build()
            .expect("builds");
        assert_eq!(
            router.registered(),
            vec![SourceId::MessagesDb, SourceId::Twilio]
        );
    }

    #[test]
    fn builder_rejects_blank_recipient() {
        let result = OtpRouterBuilder::new()
            .with_twilio("AC123", "secret", "  ")
            .with_http_client(Arc::new(CannedHttpClient::new()))
            .build();

        assert!(matches!(result, Err(ValidationError::EmptyRecipient)));
    }

    #[tokio::test]
    async fn acquire_otp_returns_only_the_code() {
        let http = Arc::new(CannedHttpClient::new());
        http.push(Ok(HttpResponse::ok_json(r#"{"messages":[]}"#)))
            .push(Ok(HttpResponse::ok_json(
                r#"{"messages":[{"sid":"SM1","from":"+15550001234","body":"Your code is 482913","date_sent":null}]}"#,
            )));
        let router = OtpRouterBuilder::new()
            .with_twilio("AC123", "secret", "+15550001111")
            .with_messages_db_enabled(false)
            .with_messages_app_enabled(false)
            .with_http_client(http)
            .with_clock(Arc::new(ManualClock::new()))
            .build()
            .expect("builds");

        let code = acquire_otp(&router, &AcquireRequest::default())
            .await
            .expect("code arrives on first poll");

        assert_eq!(code, "482913");
    }
}
