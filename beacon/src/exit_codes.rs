//! Stable exit codes for beacon CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// A manifest, config file or argument was invalid.
pub const INVALID: i32 = 1;
/// An extension command failed or printed output beacon could not use.
pub const FAILURE: i32 = 2;
