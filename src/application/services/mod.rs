//! Application services
//!
//! Services orchestrate domain logic with infrastructure dependencies.

pub mod document;

pub use document::{DocumentService, ScriptOutcome};
