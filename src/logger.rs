// Logging setup for the binary. Library code logs through `tracing` macros;
// this installs a stderr subscriber once, honouring RUST_LOG when it is set.

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

// --debug raises the default filter from info to debug.
pub fn init(debug: bool) {
    INIT.call_once(|| {
        let default = if debug { "csvdiff=debug" } else { "csvdiff=info" };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
        let _ = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    });
}
