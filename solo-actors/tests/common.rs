use std::sync::OnceLock;

use solo_common::observability::{init_logging, LogConfig};

static INIT: OnceLock<()> = OnceLock::new();

/// Route actor events to stderr once per test binary; `RUST_LOG` overrides the filter.
pub fn init_test_tracing() {
    INIT.get_or_init(|| {
        let config = LogConfig {
            app_name: "solo-tests",
            to_file: false,
            emit_stderr: true,
            default_filter: "solo_actors=debug".to_string(),
            ..LogConfig::default()
        };
        // A subscriber may already be installed; tests log best effort.
        let _ = init_logging(config);
    });
}
