//! CLI smoke entry point.
//!
//! Starts file logging, then prints core linkage, version and the sync mode
//! the current environment would start in. Performs no network calls and
//! touches no data.

use keepsake_core::{default_log_level, init_logging, logging_status, SyncConfig};
use log::info;
use std::path::PathBuf;

const LOG_DIR_VAR: &str = "KEEPSAKE_LOG_DIR";
const LOG_LEVEL_VAR: &str = "KEEPSAKE_LOG_LEVEL";

fn main() {
    let log_dir = std::env::var_os(LOG_DIR_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("keepsake-logs"));
    let level = std::env::var(LOG_LEVEL_VAR).unwrap_or_else(|_| default_log_level().to_string());

    match init_logging(&level, &log_dir.to_string_lossy()) {
        Ok(()) => {
            if let Some((level, dir)) = logging_status() {
                println!("keepsake_core logging=on level={level} dir={}", dir.display());
            }
        }
        Err(err) => println!("keepsake_core logging=off error={err}"),
    }

    let sync = SyncConfig::from_env();
    let mode = if sync.is_remote_configured() {
        "remote"
    } else {
        "local_only"
    };

    println!("keepsake_core ping={}", keepsake_core::ping());
    println!("keepsake_core version={}", keepsake_core::core_version());
    println!("keepsake_core sync_mode={mode} namespace={}", sync.namespace);
    info!(
        "event=cli_start module=cli status=ok version={} sync_mode={mode}",
        keepsake_core::core_version()
    );
    // The logger handle lives in a static and is never dropped.
    log::logger().flush();
}
