use std::time::Duration;

use serde::Serialize;

use otpwait_core::{
    EnvConfig, ListRequest, Message, OtpRouter, SourceError, SourceId, DEFAULT_LOOKBACK,
};

use crate::cli::PeekArgs;
use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct PeekResponseData {
    source: SourceId,
    messages: Vec<Message>,
}

pub async fn run(args: &PeekArgs, config: &EnvConfig, router: &OtpRouter) -> Result<CommandOutput, CliError> {
    let source = router
        .source(args.source)
        .ok_or_else(|| SourceError::not_registered(args.source))?;
    let limit = args.limit.unwrap_or_else(|| source.default_limit());
    let lookback = args
        .lookback_secs
        .map(Duration::from_secs)
        .or(config.lookback)
        .unwrap_or(DEFAULT_LOOKBACK);
    let request = ListRequest::new(limit, lookback)?;

    let messages = router.peek(args.source, request).await?;

    let text = messages
        .iter()
        .map(|message| {
            format!(
                "{}\t{}\t{}",
                message.id,
                message.sender.as_deref().unwrap_or("-"),
                message.body.replace('\n', " ")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    let data = serde_json::to_value(PeekResponseData {
        source: args.source,
        messages,
    })?;
    Ok(CommandOutput::new(data, text))
}
