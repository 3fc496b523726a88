//! Authentication Gate
//!
//! Credentials are hashed on the client and only the digest travels with a request.
//! The gate never sees or stores a clear-text password: it hands the digest to the
//! persistent store, which owns the user table.

pub mod gate;

pub use gate::{AuthGate, Hasher, Sha256Hasher};
