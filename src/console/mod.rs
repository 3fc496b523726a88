//! Client Console
//!
//! Everything the terminal client does between the keyboard and the wire.
//!
//! ## Submodules
//! - **`command`**: parses prompt lines (`update 5`) and script lines
//!   (`add,name,10,,25,...`) into commands and payloads.
//! - **`form`**: asks for record fields one by one, validates them and mirrors every
//!   accepted value into the recovery log. Replayed and live input are mixed through
//!   `MixedSource` when an interrupted command is resumed.
//! - **`router`**: prints console segments and appends file segments to the transcript.
//! - **`session`**: the `Console` driver: login, resume, the read loop and scripts.

pub mod command;
pub mod form;
pub mod router;
pub mod session;

pub use command::{CommandLineError, ScriptStep, UserCommand, parse_line, parse_script_line};
pub use form::{FieldSource, InputOutcome, LineSource, MixedSource, RecordForm, ReplaySource};
pub use router::OutputRouter;
pub use session::{Console, Exchange, Flow, Session};

#[cfg(test)]
mod tests;
