//! Process exit codes. Part of the CLI contract.

pub const SUCCESS: i32 = 0;
/// Bad config, unreadable or malformed input, or a setup failure.
pub const CONFIG_ERROR: i32 = 2;
