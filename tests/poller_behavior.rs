//! Behavior tests for a single acquisition attempt.
//!
//! Every test runs in virtual time: sleeps advance a `ManualClock` instead of
//! waiting, so deadlines and cycle counts are exact.

mod support;

use std::time::Duration;

use otpwait_core::{
    poll_for_code, AcquireError, Attempt, AttemptState, MessageId, PollConfig, SenderFilter,
    SourceError, SourceErrorKind, SourceId,
};

use support::{manual_clock, msg, msg_from, ScriptedSource, Step};

fn config(interval_ms: u64, timeout_ms: u64) -> PollConfig {
    PollConfig::new(
        Duration::from_millis(interval_ms),
        Duration::from_millis(timeout_ms),
    )
    .expect("valid poll config")
}

// =============================================================================
// Baseline seeding
// =============================================================================

#[tokio::test]
async fn code_present_before_the_attempt_is_never_returned() {
    // Given: the inbox already holds a message with a code, and nothing new arrives
    let source = ScriptedSource::new(SourceId::MessagesDb).idle_with(vec![msg("m1", "482913")]);
    let clock = manual_clock();

    // When: an attempt runs to its deadline
    let result = poll_for_code(&source, clock.as_ref(), &config(1_000, 5_000)).await;

    // Then: the stale code is ignored and the attempt times out
    let error = result.expect_err("baseline messages must not match");
    assert!(error.is_timeout(), "expected timeout, got {error:?}");
}

#[tokio::test]
async fn code_arriving_after_baseline_is_returned() {
    // Given: an empty inbox at baseline, then a message with a code
    let source = ScriptedSource::new(SourceId::Twilio)
        .then_messages(Vec::new())
        .idle_with(vec![msg("m1", "Your code is 482913")]);
    let clock = manual_clock();

    // When
    let acquired = poll_for_code(&source, clock.as_ref(), &config(1_000, 5_000))
        .await
        .expect("new code should be acquired");

    // Then
    assert_eq!(acquired.code, "482913");
    assert_eq!(acquired.message_id, MessageId::new("m1"));
    assert_eq!(acquired.source, SourceId::Twilio);
    assert_eq!(acquired.poll_cycles, 1);
}

// =============================================================================
// Deadline handling
// =============================================================================

#[tokio::test]
async fn empty_source_times_out_after_five_cycles() {
    // Given: 1000 ms interval, 5000 ms timeout, and a source that is always empty
    let source = ScriptedSource::new(SourceId::Twilio);
    let clock = manual_clock();

    // When
    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 5_000))
        .await
        .expect_err("nothing ever arrives");

    // Then: timeout (not source unavailable) after five poll cycles
    assert_eq!(
        error,
        AcquireError::Timeout {
            source_id: SourceId::Twilio,
            waited_ms: 5_000,
            poll_cycles: 5,
        }
    );
    // One baseline read plus five poll reads.
    assert_eq!(source.read_count(), 6);
    assert_eq!(clock.elapsed(), Duration::from_millis(5_000));
}

#[tokio::test]
async fn hanging_read_is_cut_off_at_the_deadline() {
    // Given: a read that never completes on the first poll cycle
    let source = ScriptedSource::new(SourceId::MessagesDb)
        .then_messages(Vec::new())
        .then(Step::Hang);
    let clock = manual_clock();

    // When
    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 3_000))
        .await
        .expect_err("hung read must time out");

    // Then: the attempt ends exactly at its deadline
    assert_eq!(
        error,
        AcquireError::Timeout {
            source_id: SourceId::MessagesDb,
            waited_ms: 3_000,
            poll_cycles: 1,
        }
    );
    assert_eq!(clock.elapsed(), Duration::from_millis(3_000));
}

#[tokio::test]
async fn hanging_baseline_read_is_a_timeout_with_no_cycles() {
    let source = ScriptedSource::new(SourceId::MessagesApp).then(Step::Hang);
    let clock = manual_clock();

    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 2_000))
        .await
        .expect_err("hung baseline must time out");

    assert_eq!(
        error,
        AcquireError::Timeout {
            source_id: SourceId::MessagesApp,
            waited_ms: 2_000,
            poll_cycles: 0,
        }
    );
}

// =============================================================================
// Read failures
// =============================================================================

#[tokio::test]
async fn read_failure_aborts_without_another_sleep() {
    // Given: the store becomes locked on the second poll cycle
    let source = ScriptedSource::new(SourceId::MessagesDb)
        .then_messages(Vec::new())
        .then_messages(Vec::new())
        .then_fail(SourceError::query_failed("database is locked"));
    let clock = manual_clock();

    // When
    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 30_000))
        .await
        .expect_err("locked store must fail the attempt");

    // Then: the failure surfaces at once, after only the one sleep between cycles
    let AcquireError::SourceUnavailable { source_id, error } = error else {
        panic!("expected source unavailable, got {error:?}");
    };
    assert_eq!(source_id, SourceId::MessagesDb);
    assert_eq!(error.kind(), SourceErrorKind::QueryFailed);
    assert_eq!(clock.elapsed(), Duration::from_millis(1_000));
    assert_eq!(source.read_count(), 3);
}

#[tokio::test]
async fn baseline_failure_is_source_unavailable() {
    let source = ScriptedSource::new(SourceId::MessagesDb)
        .then_fail(SourceError::tool_missing("'sqlite3' is not installed or not on PATH"));
    let clock = manual_clock();

    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 30_000))
        .await
        .expect_err("missing tool must fail the attempt");

    assert_eq!(error.code(), "acquire.source_unavailable");
    assert_eq!(source.read_count(), 1);
    assert_eq!(clock.elapsed(), Duration::ZERO);
}

// =============================================================================
// Dedup, ordering and filtering
// =============================================================================

#[tokio::test]
async fn identity_seen_once_is_never_evaluated_again() {
    // Given: m1 first arrives without a code, then reappears (same identity) with one
    let source = ScriptedSource::new(SourceId::Twilio)
        .then_messages(Vec::new())
        .then_messages(vec![msg("m1", "hello there")])
        .idle_with(vec![msg("m1", "482913")]);
    let clock = manual_clock();

    // When
    let error = poll_for_code(&source, clock.as_ref(), &config(1_000, 4_000))
        .await
        .expect_err("m1 was already evaluated");

    // Then
    assert!(error.is_timeout());
}

#[tokio::test]
async fn first_match_in_source_order_wins_within_a_cycle() {
    let source = ScriptedSource::new(SourceId::Twilio)
        .then_messages(Vec::new())
        .then_messages(vec![msg("m2", "code 111111"), msg("m1", "code 222222")]);
    let clock = manual_clock();

    let acquired = poll_for_code(&source, clock.as_ref(), &config(1_000, 5_000))
        .await
        .expect("code in first cycle");

    assert_eq!(acquired.code, "111111");
    assert_eq!(acquired.message_id, MessageId::new("m2"));
}

#[tokio::test]
async fn earliest_cycle_with_a_match_wins() {
    // Given: cycle 1 has only chatter, cycle 2 adds a code while chatter repeats
    let source = ScriptedSource::new(SourceId::MessagesDb)
        .then_messages(Vec::new())
        .then_messages(vec![msg("chatter", "see you at 5")])
        .then_messages(vec![msg("otp", "333333 is your code"), msg("chatter", "see you at 5")])
        .idle_with(vec![msg("later", "444444")]);
    let clock = manual_clock();

    // When
    let acquired = poll_for_code(&source, clock.as_ref(), &config(1_000, 10_000))
        .await
        .expect("code in second cycle");

    // Then
    assert_eq!(acquired.code, "333333");
    assert_eq!(acquired.poll_cycles, 2);
    assert_eq!(acquired.elapsed, Duration::from_millis(1_000));
}

#[tokio::test]
async fn filtered_sender_is_marked_seen_and_never_matched() {
    // Given: a code from the wrong sender, repeated on every read
    let wrong_sender = msg_from("m1", "+15550009999", "482913");
    let source = ScriptedSource::new(SourceId::Twilio)
        .then_messages(Vec::new())
        .idle_with(vec![wrong_sender]);
    let clock = manual_clock();
    let config = config(1_000, 3_000)
        .with_sender_filter(Some(SenderFilter::suffix("1234").expect("valid filter")));
    let mut attempt = Attempt::new(&source, clock.as_ref(), &config);

    // When: baseline plus one poll cycle
    assert_eq!(attempt.step().await, &AttemptState::Polling);
    assert_eq!(attempt.step().await, &AttemptState::Polling);

    // Then: the message is recorded as seen without producing a code
    assert!(attempt.seen().contains(&MessageId::new("m1")));
    assert_eq!(attempt.poll_cycles(), 1);

    // And: the attempt ends in a timeout
    let error = attempt.run().await.expect_err("filtered message never matches");
    assert!(error.is_timeout());
}

#[tokio::test]
async fn matching_sender_passes_the_filter() {
    let source = ScriptedSource::new(SourceId::Twilio)
        .then_messages(Vec::new())
        .idle_with(vec![
            msg_from("m2", "+15550009999", "111111"),
            msg_from("m1", "+15550001234", "Your code is 482913"),
        ]);
    let clock = manual_clock();
    let config = config(1_000, 3_000)
        .with_sender_filter(Some(SenderFilter::suffix("1234").expect("valid filter")));

    let acquired = poll_for_code(&source, clock.as_ref(), &config)
        .await
        .expect("code from the expected sender");

    assert_eq!(acquired.code, "482913");
}

// =============================================================================
// Attempt identity
// =============================================================================

#[tokio::test]
async fn every_attempt_has_its_own_id_and_seen_set() {
    let source = ScriptedSource::new(SourceId::Twilio).idle_with(vec![msg("m1", "482913")]);
    let clock = manual_clock();
    let config = config(1_000, 2_000);

    let mut first = Attempt::new(&source, clock.as_ref(), &config);
    first.step().await;
    let second = Attempt::new(&source, clock.as_ref(), &config);

    assert_ne!(first.id(), second.id());
    assert_eq!(first.seen().len(), 1);
    assert!(second.seen().is_empty());
    assert_eq!(second.state(), &AttemptState::Start);
}
