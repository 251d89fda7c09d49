use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::clock::{Clock, TokioClock};
use crate::data_source::{ListFuture, ListRequest, MessageSource, SourceError};
use crate::http_client::{HttpClient, HttpRequest, ReqwestHttpClient};
use crate::{Message, MessageId, SourceId, UtcDateTime, ValidationError};

pub const TWILIO_API_BASE: &str = "https://api.twilio.com";

/// Page size used by the provider message list when the caller has none.
pub const TWILIO_PAGE_SIZE: usize = 10;

/// Cloud SMS log adapter backed by the Twilio Messages list API.
///
/// Lists messages addressed to `recipient` and sent within the request's
/// lookback window. The window start is recomputed from the adapter's clock
/// on every call.
pub struct TwilioAdapter {
    http_client: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    account_sid: String,
    auth_token: SecretString,
    recipient: String,
    base_url: String,
    timeout_ms: u64,
}

impl TwilioAdapter {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        Self::with_http_client(
            Arc::new(ReqwestHttpClient::new()),
            account_sid,
            auth_token,
            recipient,
        )
    }

    pub fn with_http_client(
        http_client: Arc<dyn HttpClient>,
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        recipient: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let recipient = recipient.into();
        if recipient.trim().is_empty() {
            return Err(ValidationError::EmptyRecipient);
        }

        Ok(Self {
            http_client,
            clock: Arc::new(TokioClock),
            account_sid: account_sid.into(),
            auth_token: SecretString::from(auth_token.into()),
            recipient: recipient.trim().to_owned(),
            base_url: String::from(TWILIO_API_BASE),
            timeout_ms: 5_000,
        })
    }

    /// Point the adapter at a different API host (test servers, regional edges).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        self.base_url = base_url.trim_end_matches('/').to_owned();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    fn list_url(&self, req: ListRequest, now: UtcDateTime) -> String {
        let since = now.minus(req.lookback).format_rfc3339();
        format!(
            "{base}/2010-04-01/Accounts/{sid}/Messages.json?To={to}&DateSent%3E={since}&PageSize={limit}",
            base = self.base_url,
            sid = urlencoding::encode(&self.account_sid),
            to = urlencoding::encode(&self.recipient),
            since = urlencoding::encode(&since),
            limit = req.limit,
        )
    }

    async fn fetch(&self, req: ListRequest) -> Result<Vec<Message>, SourceError> {
        let request = HttpRequest::get(self.list_url(req, self.clock.wall_now()))
            .with_header("accept", "application/json")
            .with_basic_auth(&self.account_sid, self.auth_token.expose_secret())
            .with_timeout_ms(self.timeout_ms);

        let response = self
            .http_client
            .execute(request)
            .await
            .map_err(|error| SourceError::network(format!("twilio transport error: {error}")))?;

        if !response.is_success() {
            return Err(match response.status {
                401 | 403 => SourceError::access_denied(format!(
                    "twilio rejected credentials (status {})",
                    response.status
                )),
                status => SourceError::upstream(format!("twilio upstream returned status {status}")),
            });
        }

        let page: TwilioMessagePage = serde_json::from_str(&response.body).map_err(|error| {
            SourceError::malformed(format!("twilio response could not be decoded: {error}"))
        })?;

        Ok(page.messages.into_iter().map(normalize_message).collect())
    }
}

impl MessageSource for TwilioAdapter {
    fn id(&self) -> SourceId {
        SourceId::Twilio
    }

    fn default_limit(&self) -> usize {
        TWILIO_PAGE_SIZE
    }

    fn list_recent<'a>(&'a self, req: ListRequest) -> ListFuture<'a> {
        Box::pin(self.fetch(req))
    }
}

#[derive(Debug, Clone, Deserialize)]
struct TwilioMessagePage {
    #[serde(default)]
    messages: Vec<TwilioMessagePayload>,
}

#[derive(Debug, Clone, Deserialize)]
struct TwilioMessagePayload {
    sid: String,
    #[serde(default)]
    from: Option<String>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    date_sent: Option<String>,
}

fn normalize_message(payload: TwilioMessagePayload) -> Message {
    let mut message = Message::new(MessageId::new(payload.sid), payload.body.unwrap_or_default());
    if let Some(from) = payload.from {
        message = message.with_sender(from);
    }
    // An unparseable date is dropped rather than failing the whole page.
    if let Some(ts) = payload
        .date_sent
        .as_deref()
        .and_then(|raw| UtcDateTime::parse_rfc2822(raw).ok())
    {
        message = message.with_timestamp(ts);
    }
    message
}
