//! Application layer: edit scripts and the document service
//!
//! Drives the domain model from outside input. I/O goes through the
//! infrastructure traits.

pub mod error;
pub mod script;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use script::{Command, EditScript, ScriptRunner, Statement, Target};
pub use services::document::{DocumentService, ScriptOutcome};
