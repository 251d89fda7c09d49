//! Shared fakes for the behavior tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use otpwait_core::{
    Clock, ListFuture, ListRequest, ManualClock, Message, MessageId, MessageSource, SourceError,
    SourceId,
};

/// One scripted answer to `list_recent`.
pub enum Step {
    Messages(Vec<Message>),
    Fail(SourceError),
    /// Never completes; only the deadline can end the read.
    Hang,
}

/// Message source that replays a script and records when it was read.
///
/// Once the script runs out every read returns the idle messages.
pub struct ScriptedSource {
    id: SourceId,
    script: Mutex<VecDeque<Step>>,
    idle: Vec<Message>,
    clock: Option<Arc<ManualClock>>,
    reads: Mutex<Vec<Duration>>,
}

impl ScriptedSource {
    pub fn new(id: SourceId) -> Self {
        Self {
            id,
            script: Mutex::new(VecDeque::new()),
            idle: Vec::new(),
            clock: None,
            reads: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, step: Step) -> Self {
        self.script.lock().expect("script lock").push_back(step);
        self
    }

    pub fn then_messages(self, messages: Vec<Message>) -> Self {
        self.then(Step::Messages(messages))
    }

    pub fn then_fail(self, error: SourceError) -> Self {
        self.then(Step::Fail(error))
    }

    pub fn idle_with(mut self, messages: Vec<Message>) -> Self {
        self.idle = messages;
        self
    }

    /// Records the virtual time of every read.
    pub fn observed_by(mut self, clock: Arc<ManualClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn read_count(&self) -> usize {
        self.reads.lock().expect("reads lock").len()
    }

    /// Virtual time of each read, when observed by a clock.
    pub fn read_times(&self) -> Vec<Duration> {
        self.reads.lock().expect("reads lock").clone()
    }
}

impl MessageSource for ScriptedSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn list_recent<'a>(&'a self, _req: ListRequest) -> ListFuture<'a> {
        let at = self
            .clock
            .as_ref()
            .map_or(Duration::ZERO, |clock| clock.elapsed());
        self.reads.lock().expect("reads lock").push(at);

        let step = self.script.lock().expect("script lock").pop_front();
        let idle = self.idle.clone();
        Box::pin(async move {
            match step {
                Some(Step::Messages(messages)) => Ok(messages),
                Some(Step::Fail(error)) => Err(error),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(idle),
            }
        })
    }
}

pub fn msg(id: &str, body: &str) -> Message {
    Message::new(MessageId::new(id), body)
}

pub fn msg_from(id: &str, sender: &str, body: &str) -> Message {
    msg(id, body).with_sender(sender)
}

pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new())
}

/// Coerces a concrete clock handle for APIs taking `Arc<dyn Clock>`.
pub fn as_clock(clock: &Arc<ManualClock>) -> Arc<dyn Clock> {
    clock.clone()
}

pub fn shared(source: &Arc<ScriptedSource>) -> Arc<dyn MessageSource> {
    source.clone()
}
