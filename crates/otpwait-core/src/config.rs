//! Environment-backed configuration.
//!
//! The library never reads the environment on its own. Binaries call
//! [`EnvConfig::load`] once and hand the values to [`crate::OtpRouterBuilder`]
//! and [`crate::AcquireRequest`].
//!
//! # Environment Variables
//!
//! | Setting | Primary Env Var | Fallback Env Var |
//! |---------|-----------------|------------------|
//! | Twilio account SID | `OTPWAIT_TWILIO_ACCOUNT_SID` | `TWILIO_ACCOUNT_SID` |
//! | Twilio auth token | `OTPWAIT_TWILIO_AUTH_TOKEN` | `TWILIO_AUTH_TOKEN` |
//! | Recipient number | `OTPWAIT_TWILIO_PHONE_NUMBER` | `TWILIO_PHONE_NUMBER` |
//! | Sender suffix | `OTPWAIT_USER_PHONE_LAST4` | `USER_PHONE_LAST4` |
//! | Messages database | `OTPWAIT_MESSAGES_DB_PATH` | `MESSAGES_DB_PATH` |
//! | Poll interval (ms) | `OTPWAIT_POLL_INTERVAL_MS` | `POLL_INTERVAL_MS` |
//! | Timeout (ms) | `OTPWAIT_TIMEOUT_MS` | `TIMEOUT_MS` |
//! | Lookback (s) | `OTPWAIT_LOOKBACK_SECS` | `LOOKBACK_SECS` |

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::extract::SenderFilter;
use crate::ValidationError;

pub const ENV_PREFIX: &str = "OTPWAIT_";

#[derive(Debug, Default)]
pub struct EnvConfig {
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<SecretString>,
    pub twilio_phone_number: Option<String>,
    pub user_phone_last4: Option<String>,
    pub messages_db_path: Option<PathBuf>,
    pub poll_interval: Option<Duration>,
    pub timeout: Option<Duration>,
    pub lookback: Option<Duration>,
}

impl EnvConfig {
    /// Loads `.env` when present, then reads the process environment.
    pub fn load() -> Result<Self, ValidationError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}"))
                .filter(|value| !value.trim().is_empty())
                .or_else(|| lookup(name).filter(|value| !value.trim().is_empty()))
                .map(|value| value.trim().to_owned())
        };

        Ok(Self {
            twilio_account_sid: read("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: read("TWILIO_AUTH_TOKEN").map(SecretString::from),
            twilio_phone_number: read("TWILIO_PHONE_NUMBER"),
            user_phone_last4: read("USER_PHONE_LAST4"),
            messages_db_path: read("MESSAGES_DB_PATH").map(PathBuf::from),
            poll_interval: parse_positive(&read, "POLL_INTERVAL_MS")?.map(Duration::from_millis),
            timeout: parse_positive(&read, "TIMEOUT_MS")?.map(Duration::from_millis),
            lookback: parse_positive(&read, "LOOKBACK_SECS")?.map(Duration::from_secs),
        })
    }

    /// True when every value the cloud source needs is present.
    pub fn has_twilio(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_phone_number.is_some()
    }

    pub fn sender_filter(&self) -> Result<Option<SenderFilter>, ValidationError> {
        self.user_phone_last4
            .as_deref()
            .map(SenderFilter::suffix)
            .transpose()
    }
}

fn parse_positive<F>(read: &F, name: &'static str) -> Result<Option<u64>, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = read(name) else {
        return Ok(None);
    };
    let value = raw
        .parse::<u64>()
        .map_err(|_| ValidationError::InvalidNumber {
            name: name.to_owned(),
            value: raw.clone(),
        })?;
    if value == 0 {
        return Err(ValidationError::ZeroValue { field: name });
    }
    Ok(Some(value))
}
