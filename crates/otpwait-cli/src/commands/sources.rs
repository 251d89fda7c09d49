use serde::Serialize;

use otpwait_core::{EnvConfig, OtpRouter, SourceId};

use crate::error::CliError;

use super::CommandOutput;

#[derive(Debug, Serialize)]
struct SourceStatus {
    id: SourceId,
    configured: bool,
    local: bool,
    requires: &'static str,
}

#[derive(Debug, Serialize)]
struct SourcesResponseData {
    sources: Vec<SourceStatus>,
    sender_filter: Option<String>,
}

pub fn run(config: &EnvConfig, router: &OtpRouter) -> Result<CommandOutput, CliError> {
    let registered = router.registered();
    let sources = SourceId::ALL
        .into_iter()
        .map(|id| SourceStatus {
            id,
            configured: registered.contains(&id),
            local: id.is_local(),
            requires: requirement(id),
        })
        .collect::<Vec<_>>();

    let text = sources
        .iter()
        .map(|status| {
            let state = if status.configured { "configured" } else { "missing" };
            format!("{}\t{state}\t{}", status.id, status.requires)
        })
        .collect::<Vec<_>>()
        .join("\n");

    let data = serde_json::to_value(SourcesResponseData {
        sources,
        sender_filter: config.user_phone_last4.clone(),
    })?;
    Ok(CommandOutput::new(data, text))
}

fn requirement(id: SourceId) -> &'static str {
    match id {
        SourceId::Twilio => "TWILIO_ACCOUNT_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER",
        SourceId::MessagesDb => "sqlite3 and Full Disk Access (MESSAGES_DB_PATH optional)",
        SourceId::MessagesApp => "osascript and Automation access to Messages",
    }
}
