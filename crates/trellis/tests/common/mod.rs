//! Common test utilities shared across integration tests.

use std::path::Path;
use std::process::{Command, Output};

/// Run the trellis binary in the specified directory.
///
/// Colors are disabled so assertions can match plain text.
pub fn run_trellis_in_dir(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_trellis"))
        .args(args)
        .current_dir(dir)
        .env("NO_COLOR", "1")
        .env("TRELLIS_ASCII", "1")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute trellis binary")
}

/// Run a command that must succeed and return its stdout.
#[allow(dead_code)]
pub fn stdout_of(dir: &Path, args: &[&str]) -> String {
    let output = run_trellis_in_dir(dir, args);
    assert!(
        output.status.success(),
        "trellis {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}
