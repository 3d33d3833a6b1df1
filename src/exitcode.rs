//! Standard exit codes (BSD sysexits.h compatible)

/// Edit rejected by the document (containment, missing node, ...)
pub const REJECTED: i32 = 1;

/// Command line usage error
pub const USAGE: i32 = 64;

/// Data format error (unparseable edit script)
pub const DATAERR: i32 = 65;

/// Cannot open input
pub const NOINPUT: i32 = 66;

/// Input/output error
pub const IOERR: i32 = 74;

/// Configuration error
pub const CONFIG: i32 = 78;
