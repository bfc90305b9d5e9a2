use wgsweep_core::{ConfigError, ExportError};

// Exit codes for scripted sweeps
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_GENERIC_FAIL: i32 = 1;
pub const EXIT_CONFIG_FAIL: i32 = 2;
pub const EXIT_EXPORT_FAIL: i32 = 3;

/// Map a command error to its exit code by the typed error in its chain.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.chain().any(|e| e.is::<ConfigError>()) {
        EXIT_CONFIG_FAIL
    } else if err.chain().any(|e| e.is::<ExportError>()) {
        EXIT_EXPORT_FAIL
    } else {
        EXIT_GENERIC_FAIL
    }
}
