//! Shared test utilities for integration tests
//!
//! Centralizes environment isolation and a recording surface so tests can
//! count exactly what reached a tab.

use parking_lot::Mutex;
use std::sync::Arc;
use tabrelay::channel::{ControlMessage, MessageHandler, Reply};
use tempfile::TempDir;

/// Global mutex to serialize environment variable access across all tests
static ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Environment variable state to restore after test
struct EnvState {
    home: Option<String>,
    xdg_config_home: Option<String>,
}

impl EnvState {
    fn capture() -> Self {
        Self {
            home: std::env::var("HOME").ok(),
            xdg_config_home: std::env::var("XDG_CONFIG_HOME").ok(),
        }
    }

    fn restore(self) {
        if let Some(orig) = self.home {
            std::env::set_var("HOME", orig);
        } else {
            std::env::remove_var("HOME");
        }

        if let Some(orig) = self.xdg_config_home {
            std::env::set_var("XDG_CONFIG_HOME", orig);
        } else {
            std::env::remove_var("XDG_CONFIG_HOME");
        }
    }
}

/// Run `f` with HOME and XDG_CONFIG_HOME pointed into `test_dir`.
///
/// Also serializes every other environment mutation in the test binary, so
/// `f` may set `TABRELAY__*` variables as long as it removes them again.
pub fn with_xdg_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let env_state = EnvState::capture();

    let test_home = test_dir.path().join("home");
    std::fs::create_dir_all(&test_home).unwrap();

    std::env::set_var("HOME", test_home.to_str().unwrap());
    std::env::set_var("XDG_CONFIG_HOME", test_dir.path().to_str().unwrap());

    let result = f();

    env_state.restore();

    result
}

/// Surface that acknowledges everything and records what it saw
#[derive(Default)]
pub struct RecordingSurface {
    seen: Mutex<Vec<ControlMessage>>,
}

impl RecordingSurface {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seen(&self) -> Vec<ControlMessage> {
        self.seen.lock().clone()
    }
}

impl MessageHandler for RecordingSurface {
    fn on_message(&self, message: ControlMessage) -> Reply {
        self.seen.lock().push(message);
        Reply::ack()
    }
}
