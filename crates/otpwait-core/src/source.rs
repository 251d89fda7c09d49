use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Canonical identifiers for the channels an OTP can arrive on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    /// Cloud SMS provider message log.
    Twilio,
    /// Local Messages database queried through `sqlite3`.
    MessagesDb,
    /// Messages application queried through AppleScript.
    MessagesApp,
}

impl SourceId {
    pub const ALL: [Self; 3] = [Self::MessagesDb, Self::MessagesApp, Self::Twilio];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Twilio => "twilio",
            Self::MessagesDb => "messages-db",
            Self::MessagesApp => "messages-app",
        }
    }

    /// Whether the channel lives on this machine rather than behind an API.
    pub const fn is_local(self) -> bool {
        matches!(self, Self::MessagesDb | Self::MessagesApp)
    }
}

impl Display for SourceId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "twilio" => Ok(Self::Twilio),
            "messages-db" | "sqlite" => Ok(Self::MessagesDb),
            "messages-app" | "osascript" => Ok(Self::MessagesApp),
            other => Err(ValidationError::InvalidSource {
                value: other.to_owned(),
            }),
        }
    }
}
