//! Shared test utilities.
//!
//! Tests that touch environment variables hold `env_lock()` for their whole
//! body; `TempHome` does that on its own.

use std::path::Path;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tempfile::TempDir;

/// Global lock for tests that modify environment variables.
pub fn env_lock() -> MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// Restores an environment variable on drop.
pub struct EnvGuard {
    key: String,
    old: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let guard = Self::capture(key);
        unsafe {
            std::env::set_var(key, value);
        }
        guard
    }

    pub fn unset(key: &str) -> Self {
        let guard = Self::capture(key);
        unsafe {
            std::env::remove_var(key);
        }
        guard
    }

    fn capture(key: &str) -> Self {
        Self {
            key: key.to_string(),
            old: std::env::var(key).ok(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        match &self.old {
            Some(val) => unsafe { std::env::set_var(&self.key, val) },
            None => unsafe { std::env::remove_var(&self.key) },
        }
    }
}

/// A throwaway CHATARCHIVE_HOME with passkey overrides cleared.
pub struct TempHome {
    // Field order matters: guards restore the environment before the lock is released.
    _guards: Vec<EnvGuard>,
    _lock: MutexGuard<'static, ()>,
    dir: TempDir,
}

impl TempHome {
    pub fn new() -> Self {
        let lock = env_lock();
        let dir = TempDir::new().expect("create temp home");
        let home = dir.path().to_str().expect("utf-8 temp path").to_string();
        let guards = vec![
            EnvGuard::set("CHATARCHIVE_HOME", &home),
            EnvGuard::unset("ADMIN_PASSKEY_HASH"),
            EnvGuard::unset("CLUB_PASSKEY_HASH"),
        ];
        Self {
            _guards: guards,
            _lock: lock,
            dir,
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}
