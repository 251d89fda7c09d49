mod messages_app;
mod messages_db;
mod twilio;

pub use messages_app::MessagesAppAdapter;
pub use messages_db::{MessagesDbAdapter, MESSAGES_DB_ROW_LIMIT};
pub use twilio::{TwilioAdapter, TWILIO_API_BASE, TWILIO_PAGE_SIZE};
