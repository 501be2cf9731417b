//! Command handlers for the relnotes CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod chat;
pub mod contact;
pub mod index;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use contact::ContactCommand;
pub use index::IndexCommand;

/// A fresh conversation id for commands run without `--session`.
pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
