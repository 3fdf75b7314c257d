//! util: общие мелкие хелперы.
//!
//! Содержит:
//! - env_flag()/env_trimmed(): разбор ENV в одном месте (1|true|yes|on).
//! - lock()/read()/write(): захват std-локов с превращением poison в anyhow::Error.

use anyhow::{anyhow, Result};
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// "1|true|yes|on" (без учёта регистра) → true.
#[inline]
pub fn parse_flag(s: &str) -> bool {
    let s = s.trim().to_ascii_lowercase();
    s == "1" || s == "true" || s == "yes" || s == "on"
}

/// Непустое (после trim) значение переменной окружения.
pub fn env_trimmed(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_flag(name: &str) -> Option<bool> {
    env_trimmed(name).map(|v| parse_flag(&v))
}

pub fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    m.lock().map_err(|_| anyhow!("mutex poisoned"))
}

pub fn read<T>(l: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    l.read().map_err(|_| anyhow!("rwlock poisoned"))
}

pub fn write<T>(l: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    l.write().map_err(|_| anyhow!("rwlock poisoned"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_flag_accepts_common_spellings() {
        for s in ["1", "true", "YES", " on "] {
            assert!(parse_flag(s), "{s} must be truthy");
        }
        for s in ["0", "false", "off", "", "nope"] {
            assert!(!parse_flag(s), "{s} must be falsy");
        }
    }

    #[test]
    fn lock_helpers_work_on_healthy_locks() {
        let m = Mutex::new(1u32);
        *lock(&m).unwrap() += 1;
        assert_eq!(*lock(&m).unwrap(), 2);

        let l = RwLock::new(vec![1]);
        write(&l).unwrap().push(2);
        assert_eq!(read(&l).unwrap().len(), 2);
    }
}
