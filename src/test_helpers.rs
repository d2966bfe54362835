//! Shared test utilities for serialising environment mutation.

use std::env;

use tokio::sync::{Mutex, MutexGuard};

pub static ENV_LOCK: Mutex<()> = Mutex::const_new(());

/// Guard that holds the env mutex and cleans up variables on drop.
pub struct EnvGuard {
    keys: Vec<String>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets an environment variable while holding a global mutex.
    pub async fn set_var(key: &str, value: &str) -> Self {
        Self::set_vars(&[(key, value)]).await
    }

    /// Sets several variables under a single lock acquisition.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        let guard = ENV_LOCK.lock().await;
        let mut keys = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            unsafe { env::set_var(key, value) };
            keys.push((*key).to_owned());
        }
        Self {
            keys,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for key in &self.keys {
            unsafe { env::remove_var(key) };
        }
    }
}
