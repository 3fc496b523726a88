//! Command Dispatcher
//!
//! Turns a decoded `Request` into a `Response`.
//!
//! ## Flow
//! 1. **Authenticate**: every command except `help` and `register` carries credentials that
//!    are checked against the repository before anything runs.
//! 2. **Lookup**: the `CommandRegistry` maps each `CommandId` to an async handler.
//! 3. **Execute**: the handler receives a `HandlerContext`, takes the lock for its
//!    operation class and works on the shared `CollectionStore`.
//!
//! Handler failures never escape `Dispatcher::dispatch`; they are logged and turned into a
//! failed response.

pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod registry;

pub use context::{AuthContext, HandlerContext};
pub use dispatcher::{DispatchError, Dispatcher};
pub use registry::{CommandHandlerFn, CommandRegistry};
