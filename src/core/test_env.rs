//! Serialized access to process-wide environment variables in tests.

use std::ffi::{OsStr, OsString};
use std::sync::{Mutex, MutexGuard};

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Holds the environment lock and puts every touched variable back to its
/// previous value (or unsets it) on drop.
pub struct EnvGuard {
    saved: Vec<(&'static str, Option<OsString>)>,
    _lock: MutexGuard<'static, ()>,
}

impl EnvGuard {
    pub fn lock() -> Self {
        Self {
            saved: Vec::new(),
            _lock: ENV_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner()),
        }
    }

    pub fn set(&mut self, var: &'static str, value: impl AsRef<OsStr>) {
        self.save(var);
        std::env::set_var(var, value);
    }

    pub fn remove(&mut self, var: &'static str) {
        self.save(var);
        std::env::remove_var(var);
    }

    fn save(&mut self, var: &'static str) {
        if !self.saved.iter().any(|(v, _)| *v == var) {
            self.saved.push((var, std::env::var_os(var)));
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (var, value) in self.saved.drain(..).rev() {
            match value {
                Some(value) => std::env::set_var(var, value),
                None => std::env::remove_var(var),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn restores_previous_value() {
        const VAR: &str = "OAIUSAGE_TEST_ENV_GUARD_PRIOR";
        std::env::set_var(VAR, "before");
        {
            let mut guard = EnvGuard::lock();
            guard.set(VAR, "during");
            guard.set(VAR, "again");
            assert_eq!(std::env::var(VAR).as_deref(), Ok("again"));
        }
        assert_eq!(std::env::var(VAR).as_deref(), Ok("before"));
        std::env::remove_var(VAR);
    }

    #[test]
    fn unsets_variable_that_was_absent() {
        const VAR: &str = "OAIUSAGE_TEST_ENV_GUARD_ABSENT";
        {
            let mut guard = EnvGuard::lock();
            guard.set(VAR, "temporary");
            assert!(std::env::var_os(VAR).is_some());
        }
        assert!(std::env::var_os(VAR).is_none());
    }
}
