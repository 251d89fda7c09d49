mod peek;
mod sources;
mod wait;

use otpwait_core::{EnvConfig, OtpRouter, OtpRouterBuilder};
use serde_json::Value;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// Rendered result of one command: the JSON document and its plain-text form.
pub struct CommandOutput {
    pub data: Value,
    pub text: String,
}

impl CommandOutput {
    pub fn new(data: Value, text: impl Into<String>) -> Self {
        Self {
            data,
            text: text.into(),
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let config = EnvConfig::load()?;
    let router = build_router(&config)?;

    match &cli.command {
        Command::Wait(args) => wait::run(args, &config, &router).await,
        Command::Peek(args) => peek::run(args, &config, &router).await,
        Command::Sources => sources::run(&config, &router),
    }
}

fn build_router(config: &EnvConfig) -> Result<OtpRouter, CliError> {
    Ok(OtpRouterBuilder::new().with_config(config).build()?)
}
