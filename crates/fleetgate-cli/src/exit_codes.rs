//! Exit codes of the `fleetgate` binary.
//! Scripts depend on these; keep them stable.

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1; // Unexpected error
pub const CONFIG_ERROR: i32 = 2; // Configuration missing, unparsable or invalid
pub const DENIED: i32 = 3; // At least one operation denied by the ACL
