use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::command_runner::{CommandError, CommandRunner, ProcessRunner};
use crate::data_source::{ListFuture, ListRequest, MessageSource, SourceError};
use crate::{Message, MessageId, SourceId, UtcDateTime};

pub const MESSAGES_DB_ROW_LIMIT: usize = 50;

const FIELD_SEPARATOR: char = '\u{1f}';
const RECORD_SEPARATOR: char = '\u{1e}';

/// Seconds between the Unix epoch and the Apple reference date (2001-01-01).
const APPLE_EPOCH_OFFSET: i64 = 978_307_200;

/// Local message store adapter that reads the Messages `chat.db` through the
/// `sqlite3` command-line tool, opened read-only.
///
/// Rows carry no native id on this query path, so identity is derived from
/// `(timestamp, body)`.
pub struct MessagesDbAdapter {
    runner: Arc<dyn CommandRunner>,
    program: String,
    db_path: PathBuf,
}

impl MessagesDbAdapter {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self::with_runner(Arc::new(ProcessRunner), db_path)
    }

    pub fn with_runner(runner: Arc<dyn CommandRunner>, db_path: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            program: String::from("sqlite3"),
            db_path: db_path.into(),
        }
    }

    /// Use a different query tool binary (absolute path or alternate name).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// `$HOME/Library/Messages/chat.db`, when `HOME` is set.
    pub fn default_db_path() -> Option<PathBuf> {
        std::env::var_os("HOME").map(|home| {
            PathBuf::from(home)
                .join("Library")
                .join("Messages")
                .join("chat.db")
        })
    }

    fn query_args(&self, limit: usize) -> Vec<String> {
        vec![
            String::from("-readonly"),
            String::from("-noheader"),
            String::from("-separator"),
            FIELD_SEPARATOR.to_string(),
            String::from("-newline"),
            RECORD_SEPARATOR.to_string(),
            self.db_path.to_string_lossy().into_owned(),
            recent_messages_sql(limit),
        ]
    }

    async fn fetch(&self, req: ListRequest) -> Result<Vec<Message>, SourceError> {
        let args = self.query_args(req.limit);
        let stdout = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(classify_command_error)?;
        parse_rows(&stdout)
    }
}

impl MessageSource for MessagesDbAdapter {
    fn id(&self) -> SourceId {
        SourceId::MessagesDb
    }

    fn default_limit(&self) -> usize {
        MESSAGES_DB_ROW_LIMIT
    }

    fn list_recent<'a>(&'a self, req: ListRequest) -> ListFuture<'a> {
        Box::pin(self.fetch(req))
    }
}

fn recent_messages_sql(limit: usize) -> String {
    format!(
        "SELECT \
           strftime('%Y-%m-%dT%H:%M:%SZ', (message.date / 1000000000) + {APPLE_EPOCH_OFFSET}, 'unixepoch'), \
           coalesce(handle.id, ''), \
           message.text \
         FROM message \
         LEFT JOIN handle ON handle.ROWID = message.handle_id \
         WHERE message.text IS NOT NULL AND length(message.text) > 0 \
         ORDER BY message.date DESC \
         LIMIT {limit};"
    )
}

fn parse_rows(stdout: &str) -> Result<Vec<Message>, SourceError> {
    stdout
        .split(RECORD_SEPARATOR)
        .map(|record| record.trim_start_matches(|c: char| c == '\r' || c == '\n'))
        .filter(|record| !record.trim().is_empty())
        .map(parse_row)
        .collect()
}

fn parse_row(record: &str) -> Result<Message, SourceError> {
    let mut fields = record.splitn(3, FIELD_SEPARATOR);
    let (Some(sent_at), Some(sender), Some(body)) = (fields.next(), fields.next(), fields.next())
    else {
        return Err(SourceError::malformed(format!(
            "messages store row has fewer than 3 fields: {record:?}"
        )));
    };

    let mut message =
        Message::new(MessageId::from_timestamp_and_body(sent_at, body), body).with_sender(sender);
    if let Ok(ts) = UtcDateTime::parse(sent_at) {
        message = message.with_timestamp(ts);
    }
    Ok(message)
}

fn classify_command_error(error: CommandError) -> SourceError {
    match error {
        CommandError::NotFound { program } => {
            SourceError::tool_missing(format!("'{program}' is not installed or not on PATH"))
        }
        CommandError::PermissionDenied { program } => {
            SourceError::access_denied(format!("permission denied running '{program}'"))
        }
        CommandError::Failed { stderr, .. } => {
            let lowered = stderr.to_ascii_lowercase();
            if lowered.contains("unable to open")
                || lowered.contains("authorization denied")
                || lowered.contains("not authorized")
                || lowered.contains("permission denied")
            {
                SourceError::access_denied(format!(
                    "messages database not readable (grant Full Disk Access to this terminal): {stderr}"
                ))
            } else if lowered.contains("locked") {
                SourceError::query_failed(format!("messages database is locked: {stderr}"))
            } else {
                SourceError::query_failed(format!("messages database query failed: {stderr}"))
            }
        }
        CommandError::Io { message, .. } => {
            SourceError::query_failed(format!("messages database query failed: {message}"))
        }
    }
}
