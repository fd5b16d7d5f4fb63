//! Common test utilities for t2r integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch
//! the user's real `~/.config/things2reclaim/` or data directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with isolated settings directories.
///
/// The `t2r()` method returns a `Command` that sets `T2R_CONFIG_DIR` and
/// `T2R_DATA_DIR` per-invocation and clears the token variables, making
/// tests parallel-safe and independent of the caller's environment.
pub struct TestEnv {
    pub config_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the t2r binary with isolated settings.
    pub fn t2r(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_t2r"));
        cmd.env("T2R_CONFIG_DIR", self.config_dir.path());
        cmd.env("T2R_DATA_DIR", self.data_dir.path());
        for var in [
            "T2R_RECLAIM_TOKEN",
            "T2R_TOGGL_TOKEN",
            "T2R_THINGS_TOKEN",
            "T2R_DB_PATH",
            "T2R_LOG",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    pub fn config_file(&self) -> std::path::PathBuf {
        self.config_dir.path().join("config.kdl")
    }

    pub fn state_file(&self) -> std::path::PathBuf {
        self.data_dir.path().join("state.kdl")
    }

    pub fn write_config(&self, content: &str) {
        std::fs::write(self.config_file(), content).unwrap();
    }

    pub fn write_state(&self, content: &str) {
        std::fs::write(self.state_file(), content).unwrap();
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
