use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::OwnedMutexGuard;

// ============================================================================
// Keyed Lock Table
// ============================================================================
//
// One async mutex per key, created lazily and shared by every caller that
// asks for the same key. `acquire_all` takes a whole set of keys in sorted
// order so two batches can never wait on each other in a cycle.
//
// ============================================================================

type KeyLock = Arc<tokio::sync::Mutex<()>>;

pub struct LockTable<K> {
    locks: Mutex<HashMap<K, KeyLock>>,
}

/// Guards for one batch of keys; dropping it releases every key.
pub struct HeldLocks<K> {
    keys: Vec<K>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl<K> HeldLocks<K> {
    pub fn keys(&self) -> &[K] {
        &self.keys
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Timed out after {waited:?} waiting for {pending} of {total} locks")]
pub struct LockTimedOut {
    pub waited: Duration,
    pub pending: usize,
    pub total: usize,
}

impl<K: Ord + Hash + Clone> Default for LockTable<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Ord + Hash + Clone> LockTable<K> {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn lock_for(&self, key: &K) -> KeyLock {
        // The map is only touched for lookups, never held across an await.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Lock every distinct key in `keys`, in ascending order, within `timeout`.
    ///
    /// On timeout the guards taken so far are dropped before returning.
    pub async fn acquire_all(
        &self,
        keys: impl IntoIterator<Item = K>,
        timeout: Duration,
    ) -> Result<HeldLocks<K>, LockTimedOut> {
        let mut keys: Vec<K> = keys.into_iter().collect();
        keys.sort();
        keys.dedup();

        let total = keys.len();
        let mut guards = Vec::with_capacity(total);

        let acquired = tokio::time::timeout(timeout, async {
            for key in &keys {
                guards.push(self.lock_for(key).lock_owned().await);
            }
        })
        .await;

        match acquired {
            Ok(()) => Ok(HeldLocks {
                keys,
                _guards: guards,
            }),
            Err(_) => Err(LockTimedOut {
                waited: timeout,
                pending: total - guards.len(),
                total,
            }),
        }
    }

    /// Drop table entries nobody holds or waits on.
    pub fn prune(&self) -> usize {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        let before = locks.len();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        before - locks.len()
    }

    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
