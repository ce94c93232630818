//! Synchronization utilities for robust lock handling
//!
//! Two flavours are provided. The `handle_*` functions convert a poisoned lock
//! into an application error for call sites that already return a `Result`
//! (registration, configuration). The `*_or_recover` functions are used on the
//! hot paths of the framework (queue, dispatch, extension broadcast) which must
//! never fail: module code always runs outside of these locks and behind a
//! panic boundary, so a poisoned guard still protects consistent data and is
//! recovered with a warning.

use std::sync::{
    LockResult, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

/// Handle poisoned RwLock read operations with consistent error handling
///
/// # Arguments
/// * `result` - The result from an RwLock read() operation
/// * `error_constructor` - Function to create the appropriate error type
pub fn handle_rwlock_read<T, E>(
    result: LockResult<RwLockReadGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockReadGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (RwLock read poisoned). This indicates a panic occurred while holding a write lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Handle poisoned RwLock write operations with consistent error handling
///
/// # Arguments
/// * `result` - The result from an RwLock write() operation
/// * `error_constructor` - Function to create the appropriate error type
pub fn handle_rwlock_write<T, E>(
    result: LockResult<RwLockWriteGuard<T>>,
    error_constructor: impl FnOnce(String) -> E,
) -> Result<RwLockWriteGuard<T>, E> {
    result.map_err(|poison_err| {
        error_constructor(format!(
            "Internal synchronisation error (RwLock write poisoned). This indicates a panic occurred while holding the lock. PoisonError: {:?}",
            poison_err
        ))
    })
}

/// Lock a mutex, recovering the guard if a previous holder panicked
pub fn lock_or_recover<'a, T>(mutex: &'a Mutex<T>, context: &str) -> MutexGuard<'a, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned mutex ({})", context);
        PoisonError::into_inner(poisoned)
    })
}

/// Acquire a read guard, recovering it if a previous writer panicked
pub fn read_or_recover<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockReadGuard<'a, T> {
    lock.read().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned RwLock read ({})", context);
        PoisonError::into_inner(poisoned)
    })
}

/// Acquire a write guard, recovering it if a previous holder panicked
pub fn write_or_recover<'a, T>(lock: &'a RwLock<T>, context: &str) -> RwLockWriteGuard<'a, T> {
    lock.write().unwrap_or_else(|poisoned| {
        log::warn!("Recovering poisoned RwLock write ({})", context);
        PoisonError::into_inner(poisoned)
    })
}
