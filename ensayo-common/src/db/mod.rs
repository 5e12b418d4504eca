//! Database models, schema creation, migrations and lock retry

pub mod init;
pub mod migrations;
pub mod models;
pub mod retry;

pub use init::*;
pub use migrations::*;
pub use models::*;
pub use retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};
