//! Record Model
//!
//! Defines the managed entity (`StudyGroup`) together with its embedded value types
//! and the validation layer that turns raw user tokens into typed fields.
//!
//! ## Submodules
//! - **`types`**: The record, its draft form (what a client submits) and the closed enumerations.
//! - **`validation`**: Per-field parsing rules shared by interactive input, script files and
//!   the recovery log replay.

pub mod types;
pub mod validation;

pub use types::{Coordinates, FormOfEducation, Person, Semester, StudyGroup, StudyGroupDraft};
pub use validation::{Field, ValidationError};

#[cfg(test)]
pub(crate) mod fixtures;
