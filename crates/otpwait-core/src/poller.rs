//! Deadline-bounded polling of one message source.
//!
//! An [`Attempt`] is an explicit state machine:
//!
//! ```text
//! Start ──baseline read──▶ Polling ──code found──▶ Succeeded
//!   │                        │  ▲
//!   │                        │  └── no code: sleep min(interval, remaining)
//!   │                        ├──deadline reached──▶ TimedOut
//!   └──read failed───────────┴──read failed───────▶ Failed
//! ```
//!
//! The baseline read only seeds the [`SeenSet`]; nothing it returns can match.
//! Every read is raced against the remaining time, so an attempt never
//! outlives its deadline by more than the time needed to notice it.

use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::data_source::{ListRequest, MessageSource, SourceError};
use crate::extract::{CodePattern, SenderFilter};
use crate::seen::SeenSet;
use crate::{AcquireError, Message, MessageId, OtpCode, SourceId, ValidationError};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1_000);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Parameters for one attempt against one source.
#[derive(Debug, Clone, PartialEq)]
pub struct PollConfig {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub list: ListRequest,
    pub pattern: CodePattern,
    pub sender_filter: Option<SenderFilter>,
}

impl PollConfig {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Result<Self, ValidationError> {
        if poll_interval.is_zero() {
            return Err(ValidationError::ZeroValue {
                field: "poll_interval",
            });
        }
        if timeout.is_zero() {
            return Err(ValidationError::ZeroValue { field: "timeout" });
        }
        Ok(Self {
            poll_interval,
            timeout,
            list: ListRequest::default(),
            pattern: CodePattern::default(),
            sender_filter: None,
        })
    }

    pub fn with_list(mut self, list: ListRequest) -> Self {
        self.list = list;
        self
    }

    pub fn with_pattern(mut self, pattern: CodePattern) -> Self {
        self.pattern = pattern;
        self
    }

    pub fn with_sender_filter(mut self, filter: Option<SenderFilter>) -> Self {
        self.sender_filter = filter;
        self
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            list: ListRequest::default(),
            pattern: CodePattern::default(),
            sender_filter: None,
        }
    }
}

/// Successful attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Acquired {
    pub code: OtpCode,
    pub source: SourceId,
    pub message_id: MessageId,
    /// Poll cycles run after the baseline read, including the matching one.
    pub poll_cycles: u32,
    pub elapsed: Duration,
}

impl Acquired {
    pub fn elapsed_ms(&self) -> u64 {
        duration_ms(self.elapsed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptState {
    Start,
    Polling,
    Succeeded(Acquired),
    TimedOut,
    Failed(SourceError),
}

impl AttemptState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded(_) | Self::TimedOut | Self::Failed(_)
        )
    }
}

/// A candidate that produced a code during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanMatch {
    pub code: OtpCode,
    pub message_id: MessageId,
}

/// One poll cycle's dedup/filter/extract step.
///
/// Every unseen message is marked seen before it is filtered or inspected;
/// the first extracted code returns immediately.
pub fn scan(
    seen: &mut SeenSet,
    messages: &[Message],
    filter: Option<&SenderFilter>,
    pattern: &CodePattern,
) -> Option<ScanMatch> {
    for message in messages {
        if !seen.insert(&message.id) {
            continue;
        }
        if filter.is_some_and(|filter| !filter.matches(message)) {
            continue;
        }
        if let Some(code) = pattern.extract(&message.body) {
            return Some(ScanMatch {
                code,
                message_id: message.id.clone(),
            });
        }
    }
    None
}

enum ReadOutcome {
    Messages(Vec<Message>),
    Failed(SourceError),
    DeadlineReached,
}

/// One bounded run of the poller against one source.
///
/// Owns its [`SeenSet`]; nothing survives the attempt.
pub struct Attempt<'a> {
    id: Uuid,
    source: &'a dyn MessageSource,
    clock: &'a dyn Clock,
    config: &'a PollConfig,
    seen: SeenSet,
    started: Instant,
    deadline: Instant,
    poll_cycles: u32,
    state: AttemptState,
}

impl<'a> Attempt<'a> {
    pub fn new(source: &'a dyn MessageSource, clock: &'a dyn Clock, config: &'a PollConfig) -> Self {
        let now = clock.now();
        Self {
            id: Uuid::new_v4(),
            source,
            clock,
            config,
            seen: SeenSet::new(),
            started: now,
            deadline: now + config.timeout,
            poll_cycles: 0,
            state: AttemptState::Start,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> &AttemptState {
        &self.state
    }

    pub fn seen(&self) -> &SeenSet {
        &self.seen
    }

    pub fn poll_cycles(&self) -> u32 {
        self.poll_cycles
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(self.clock.now())
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.started)
    }

    /// Advances the state machine by one transition. Terminal states are final.
    pub async fn step(&mut self) -> &AttemptState {
        match self.state {
            AttemptState::Start => self.start().await,
            AttemptState::Polling => self.poll_once().await,
            AttemptState::Succeeded(_) | AttemptState::TimedOut | AttemptState::Failed(_) => {}
        }
        &self.state
    }

    /// Drives the attempt to a terminal state.
    pub async fn run(mut self) -> Result<Acquired, AcquireError> {
        let span = info_span!("otp_attempt", attempt_id = %self.id, source = %self.source.id());
        async move {
            while !self.state.is_terminal() {
                self.step().await;
            }
            self.finish()
        }
        .instrument(span)
        .await
    }

    async fn start(&mut self) {
        self.started = self.clock.now();
        self.deadline = self.started + self.config.timeout;

        self.state = match self.read().await {
            ReadOutcome::Messages(messages) => {
                self.seen.seed(&messages);
                debug!(baseline = messages.len(), "seeded seen-set from baseline read");
                AttemptState::Polling
            }
            ReadOutcome::Failed(error) => {
                warn!(error = %error, "baseline read failed; attempt aborted");
                AttemptState::Failed(error)
            }
            ReadOutcome::DeadlineReached => {
                info!("deadline reached during baseline read");
                AttemptState::TimedOut
            }
        };
    }

    async fn poll_once(&mut self) {
        if self.remaining().is_zero() {
            info!(poll_cycles = self.poll_cycles, "deadline reached without a code");
            self.state = AttemptState::TimedOut;
            return;
        }

        self.poll_cycles += 1;
        let messages = match self.read().await {
            ReadOutcome::Messages(messages) => messages,
            ReadOutcome::Failed(error) => {
                warn!(error = %error, cycle = self.poll_cycles, "source read failed; attempt aborted");
                self.state = AttemptState::Failed(error);
                return;
            }
            ReadOutcome::DeadlineReached => {
                info!(poll_cycles = self.poll_cycles, "deadline reached during read");
                self.state = AttemptState::TimedOut;
                return;
            }
        };

        let seen_before = self.seen.len();
        let found = scan(
            &mut self.seen,
            &messages,
            self.config.sender_filter.as_ref(),
            &self.config.pattern,
        );

        if let Some(found) = found {
            let acquired = Acquired {
                code: found.code,
                source: self.source.id(),
                message_id: found.message_id,
                poll_cycles: self.poll_cycles,
                elapsed: self.elapsed(),
            };
            info!(
                message_id = %acquired.message_id,
                poll_cycles = acquired.poll_cycles,
                elapsed_ms = acquired.elapsed_ms(),
                "code acquired"
            );
            self.state = AttemptState::Succeeded(acquired);
            return;
        }

        debug!(
            cycle = self.poll_cycles,
            new_messages = self.seen.len() - seen_before,
            "no code this cycle"
        );

        let remaining = self.remaining();
        if remaining.is_zero() {
            info!(poll_cycles = self.poll_cycles, "deadline reached without a code");
            self.state = AttemptState::TimedOut;
            return;
        }
        self.clock
            .sleep(self.config.poll_interval.min(remaining))
            .await;
    }

    async fn read(&self) -> ReadOutcome {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return ReadOutcome::DeadlineReached;
        }

        tokio::select! {
            biased;
            result = self.source.list_recent(self.config.list) => match result {
                Ok(messages) => ReadOutcome::Messages(messages),
                Err(error) => ReadOutcome::Failed(error),
            },
            () = self.clock.sleep(remaining) => ReadOutcome::DeadlineReached,
        }
    }

    fn finish(self) -> Result<Acquired, AcquireError> {
        let source_id = self.source.id();
        match self.state {
            AttemptState::Succeeded(acquired) => Ok(acquired),
            AttemptState::Failed(error) => Err(AcquireError::SourceUnavailable { source_id, error }),
            AttemptState::TimedOut | AttemptState::Start | AttemptState::Polling => {
                Err(AcquireError::Timeout {
                    source_id,
                    waited_ms: duration_ms(self.clock.now().saturating_duration_since(self.started)),
                    poll_cycles: self.poll_cycles,
                })
            }
        }
    }
}

/// Runs one complete attempt of `config` against `source`.
pub async fn poll_for_code(
    source: &dyn MessageSource,
    clock: &dyn Clock,
    config: &PollConfig,
) -> Result<Acquired, AcquireError> {
    Attempt::new(source, clock, config).run().await
}

pub(crate) fn duration_ms(duration: Duration) -> u64 {
    duration.as_millis().min(u128::from(u64::MAX)) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::data_source::ListFuture;
    use std::sync::Mutex;

    struct Scripted {
        reads: Mutex<Vec<Result<Vec<Message>, SourceError>>>,
    }

    impl Scripted {
        fn new(mut reads: Vec<Result<Vec<Message>, SourceError>>) -> Self {
            reads.reverse();
            Self {
                reads: Mutex::new(reads),
            }
        }
    }

    impl MessageSource for Scripted {
        fn id(&self) -> SourceId {
            SourceId::MessagesDb
        }

        fn list_recent<'a>(&'a self, _req: ListRequest) -> ListFuture<'a> {
            let next = self
                .reads
                .lock()
                .expect("script lock")
                .pop()
                .unwrap_or_else(|| Ok(Vec::new()));
            Box::pin(async move { next })
        }
    }

    fn msg(id: &str, body: &str) -> Message {
        Message::new(MessageId::new(id), body)
    }

    #[test]
    fn scan_marks_filtered_messages_seen_without_extracting() {
        let mut seen = SeenSet::new();
        let filter = SenderFilter::suffix("1234").expect("valid filter");
        let messages = vec![
            msg("other", "999999").with_sender("+15550009999"),
            msg("mine", "123456").with_sender("+15550001234"),
        ];

        let found = scan(&mut seen, &messages, Some(&filter), &CodePattern::default())
            .expect("matching sender yields a code");

        assert_eq!(found.code, "123456");
        assert!(seen.contains(&MessageId::new("other")));
    }

    #[test]
    fn scan_skips_seen_ids() {
        let mut seen = SeenSet::new();
        seen.seed(&[msg("m1", "482913")]);

        assert_eq!(
            scan(&mut seen, &[msg("m1", "482913")], None, &CodePattern::default()),
            None
        );
    }

    #[tokio::test]
    async fn step_walks_start_polling_succeeded() {
        let source = Scripted::new(vec![
            Ok(Vec::new()),
            Ok(vec![msg("m1", "Your code is 482913")]),
        ]);
        let clock = ManualClock::new();
        let config = PollConfig::default();
        let mut attempt = Attempt::new(&source, &clock, &config);

        assert_eq!(attempt.state(), &AttemptState::Start);
        assert_eq!(attempt.step().await, &AttemptState::Polling);
        let state = attempt.step().await.clone();

        let AttemptState::Succeeded(acquired) = state else {
            panic!("expected success, got {state:?}");
        };
        assert_eq!(acquired.code, "482913");
        assert_eq!(acquired.poll_cycles, 1);
        assert!(attempt.step().await.is_terminal());
    }

    #[tokio::test]
    async fn sleeps_are_clamped_to_remaining_time() {
        let source = Scripted::new(Vec::new());
        let clock = ManualClock::new();
        let config = PollConfig::new(Duration::from_millis(1_000), Duration::from_millis(2_500))
            .expect("valid config");

        let error = poll_for_code(&source, &clock, &config)
            .await
            .expect_err("nothing ever arrives");

        assert_eq!(
            error,
            AcquireError::Timeout {
                source_id: SourceId::MessagesDb,
                waited_ms: 2_500,
                poll_cycles: 3,
            }
        );
        assert_eq!(clock.elapsed(), Duration::from_millis(2_500));
    }

    #[test]
    fn zero_interval_or_timeout_is_rejected() {
        assert!(PollConfig::new(Duration::ZERO, DEFAULT_TIMEOUT).is_err());
        assert!(PollConfig::new(DEFAULT_POLL_INTERVAL, Duration::ZERO).is_err());
    }
}
