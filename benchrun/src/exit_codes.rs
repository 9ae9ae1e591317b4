//! Stable exit codes for `benchrun` commands.

/// Command succeeded; for `status`, every job found is complete.
pub const OK: i32 = 0;
/// Invalid config, unwritable output root or any other error.
pub const INVALID: i32 = 1;
/// `benchrun status` found claimed-but-incomplete markers.
pub const INCOMPLETE: i32 = 2;
