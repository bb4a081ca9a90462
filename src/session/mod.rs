mod cleanup;
mod manager;
mod persistence;
mod types;

pub use cleanup::{CLEANUP_INTERVAL_SECS, Cleanup, CleanupResult, SESSION_TTL_DAYS};
pub use manager::{PERSISTENCE_INTERVAL_SECS, SessionManager};
pub use persistence::Persistence;
pub use types::{session_key, MAX_MESSAGES, Message, Session, ToolCall};
