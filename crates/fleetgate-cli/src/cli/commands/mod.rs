use super::args::*;

pub mod check;
mod dispatch;
pub mod route;
pub mod validate;

pub use dispatch::dispatch;

use fleetgate_policy::GateConfig;

/// Load configuration; on failure the error is printed and the exit code
/// returned.
pub(crate) fn load_config(arg: &ConfigArg) -> Result<GateConfig, i32> {
    GateConfig::from_file(&arg.config).map_err(|e| {
        let err = fleetgate_core::Error::from(e);
        eprintln!("error: {err}");
        tracing::debug!(path = %arg.config.display(), "configuration rejected");
        err.exit_code()
    })
}
