//! Infrastructure layer: I/O implementations and DI container
//!
//! Real filesystem access and the service container used by the binary.

pub mod di;
pub mod error;
pub mod traits;

pub use error::{InfraError, InfraResult};
