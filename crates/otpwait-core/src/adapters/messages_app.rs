use std::sync::Arc;

use crate::command_runner::{CommandError, CommandRunner, ProcessRunner};
use crate::data_source::{ListFuture, ListRequest, MessageSource, SourceError};
use crate::{Message, MessageId, SourceId};

/// Prints the newest message of every chat as `<date> <time>|<text>`, one per line.
const LAST_MESSAGE_PER_CHAT_SCRIPT: &str = r#"
set report to ""
try
  tell application "Messages"
    repeat with thread in chats
      try
        set latest to last item of (messages of thread)
        set content to text of latest
        if content is not missing value then
          set sentAt to time sent of latest
          set report to report & (date string of sentAt) & " " & (time string of sentAt) & "|" & content & linefeed
        end if
      end try
    end repeat
  end tell
on error errMsg
  return "ERROR:" & errMsg
end try
return report
"#;

/// Messages application adapter driven through `osascript`.
///
/// Only the newest message of each chat is visible, and the date comes back
/// as a localized string, so the raw output line is the message identity and
/// no timestamp is attached.
pub struct MessagesAppAdapter {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl Default for MessagesAppAdapter {
    fn default() -> Self {
        Self::with_runner(Arc::new(ProcessRunner))
    }
}

impl MessagesAppAdapter {
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            program: String::from("osascript"),
        }
    }

    async fn fetch(&self, req: ListRequest) -> Result<Vec<Message>, SourceError> {
        let args = vec![
            String::from("-e"),
            LAST_MESSAGE_PER_CHAT_SCRIPT.to_owned(),
        ];
        let stdout = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|error| match error {
                CommandError::NotFound { program } => SourceError::tool_missing(format!(
                    "'{program}' is not available (Messages scripting requires macOS)"
                )),
                CommandError::PermissionDenied { program } => {
                    SourceError::access_denied(format!("permission denied running '{program}'"))
                }
                other => SourceError::query_failed(other.to_string()),
            })?;

        if let Some(reason) = stdout.trim_start().strip_prefix("ERROR:") {
            return Err(SourceError::access_denied(format!(
                "Messages scripting failed (allow Automation access for this terminal): {}",
                reason.trim()
            )));
        }

        Ok(parse_lines(&stdout, req.limit))
    }
}

impl MessageSource for MessagesAppAdapter {
    fn id(&self) -> SourceId {
        SourceId::MessagesApp
    }

    fn list_recent<'a>(&'a self, req: ListRequest) -> ListFuture<'a> {
        Box::pin(self.fetch(req))
    }
}

fn parse_lines(stdout: &str, limit: usize) -> Vec<Message> {
    stdout
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .take(limit)
        .map(|line| {
            let body = line.split_once('|').map_or(line, |(_, text)| text);
            Message::new(MessageId::new(line), body)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::CannedRunner;
    use crate::data_source::SourceErrorKind;

    #[test]
    fn body_is_text_after_first_separator() {
        let messages = parse_lines(
            "Monday, 1 May 2024 08:00:05|Your code is 482913|ok\nno separator here\n",
            10,
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "Your code is 482913|ok");
        assert_eq!(
            messages[0].id.as_str(),
            "Monday, 1 May 2024 08:00:05|Your code is 482913|ok"
        );
        assert_eq!(messages[1].body, "no separator here");
    }

    #[tokio::test]
    async fn script_error_output_is_access_denied() {
        let runner = Arc::new(CannedRunner::new());
        runner.push(
            "osascript",
            Ok(String::from("ERROR:Not authorized to send Apple events to Messages.")),
        );
        let adapter = MessagesAppAdapter::with_runner(runner);

        let error = adapter
            .list_recent(ListRequest::default())
            .await
            .expect_err("script error must fail the read");
        assert_eq!(error.kind(), SourceErrorKind::AccessDenied);
    }

    #[tokio::test]
    async fn missing_osascript_is_tool_missing() {
        let adapter = MessagesAppAdapter::with_runner(Arc::new(CannedRunner::new()));

        let error = adapter
            .list_recent(ListRequest::default())
            .await
            .expect_err("no osascript");
        assert_eq!(error.kind(), SourceErrorKind::ToolMissing);
    }
}
