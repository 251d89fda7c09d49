//! Code extraction and sender filtering applied to candidate messages.

use std::fmt::{Debug, Formatter};

use regex::Regex;

use crate::{Message, OtpCode, ValidationError};

/// First run of exactly six digits.
pub const DEFAULT_CODE_PATTERN: &str = r"(?:^|\D)(\d{6})(?:\D|$)";

/// Compiled extraction pattern: first match wins, capture group 1 is the code.
///
/// Patterns without a capture group yield the whole match.
#[derive(Clone)]
pub struct CodePattern {
    regex: Regex,
}

impl CodePattern {
    pub fn new(pattern: &str) -> Result<Self, ValidationError> {
        let regex = Regex::new(pattern).map_err(|error| ValidationError::InvalidPattern {
            pattern: pattern.to_owned(),
            reason: error.to_string(),
        })?;
        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    pub fn extract(&self, body: &str) -> Option<OtpCode> {
        let captures = self.regex.captures(body)?;
        captures
            .get(1)
            .or_else(|| captures.get(0))
            .map(|found| OtpCode::new(found.as_str()))
    }
}

impl Default for CodePattern {
    fn default() -> Self {
        Self::new(DEFAULT_CODE_PATTERN).expect("default code pattern compiles")
    }
}

impl Debug for CodePattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("CodePattern").field(&self.as_str()).finish()
    }
}

impl PartialEq for CodePattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Restricts candidates to messages whose sender ends with a suffix,
/// typically the trailing digits of the expected phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderFilter {
    suffix: String,
}

impl SenderFilter {
    pub fn suffix(suffix: impl Into<String>) -> Result<Self, ValidationError> {
        let suffix = suffix.into().trim().to_owned();
        if suffix.is_empty() {
            return Err(ValidationError::EmptySenderFilter);
        }
        Ok(Self { suffix })
    }

    pub fn as_str(&self) -> &str {
        &self.suffix
    }

    /// A message without a sender never matches.
    pub fn matches(&self, message: &Message) -> bool {
        message
            .sender
            .as_deref()
            .is_some_and(|sender| sender.trim().ends_with(&self.suffix))
    }
}
