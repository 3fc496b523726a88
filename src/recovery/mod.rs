//! Session Recovery Log
//!
//! Client-side crash protection for interactive input. While the user types the fields of
//! a command, each accepted value is appended to a small file and synced to disk. If the
//! client dies before the server accepts the command, the next start offers to resume:
//! the recorded values are replayed and only the missing ones are asked for.
//!
//! The log holds at most one command and is removed once that command completes.

pub mod log;

pub use log::{PendingSession, RecoveryError, RecoveryLog};
