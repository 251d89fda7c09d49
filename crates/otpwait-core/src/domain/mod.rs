//! # Domain Models
//!
//! Canonical types shared by every message source and by the poller.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | One inbound text message as observed on a channel |
//! | [`MessageId`] | Stable per-channel identity used for de-duplication |
//! | [`OtpCode`] | The extracted one-time passcode |
//! | [`UtcDateTime`] | UTC timestamp |
//!
//! A [`Message`] is immutable once read. Two messages with the same
//! [`MessageId`] are the same observed event, whatever their position in a
//! later read.

mod code;
mod message;
mod timestamp;

pub use code::OtpCode;
pub use message::{Message, MessageId};
pub use timestamp::UtcDateTime;
