//! Study Group Registry Library
//!
//! Core of a client/server record service over UDP. Clients add, update, remove and query
//! study groups in a shared collection; every record belongs to the user who created it.
//! The server binary (`main.rs`) and the terminal client (`client/`) are thin wrappers
//! around these modules.
//!
//! ## Server side
//! - **`protocol`**: Request/response envelopes, the `bincode` codec and the fragment
//!   frame used for responses larger than one datagram.
//! - **`transport`**: UDP send path, fragment reassembly and the client's timed exchange.
//! - **`collection`**: The ordered in-memory store with owner rules and per-command locks.
//! - **`dispatcher`**: Authenticates requests and routes them to command handlers.
//! - **`listener`**: The acceptor task and the bounded worker pool.
//! - **`auth`**: Credential hashing and the gate in front of the user table.
//! - **`persistence`**: The repository contract with in-memory and JSON-file backends.
//!
//! ## Client side
//! - **`console`**: Command parsing, record forms, output routing and scripts.
//! - **`recovery`**: The crash-recovery log for half-entered commands.
//!
//! ## Shared
//! - **`model`**: Record types and field validation.
//! - **`config`**: Server and client settings from defaults, environment and arguments.

pub mod auth;
pub mod collection;
pub mod config;
pub mod console;
pub mod dispatcher;
pub mod listener;
pub mod model;
pub mod persistence;
pub mod protocol;
pub mod recovery;
pub mod transport;
