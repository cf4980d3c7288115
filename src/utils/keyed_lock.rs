use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex as SyncMutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex, OwnedMutexGuard};

// ============================================================================
// Keyed Locks - one async mutex per key
// ============================================================================
//
// Serializes work on the same key (an order, an inventory item) while work on
// different keys runs in parallel. An entry is removed when its last guard
// drops and nobody is waiting on it, so the map only tracks keys in use.
//
// ============================================================================

type Slots<K> = HashMap<K, Arc<Mutex<()>>>;

pub struct KeyedLocks<K> {
    // Held only for map lookups, never across an await.
    locks: SyncMutex<Slots<K>>,
}

/// Exclusive access to one key. Dropping it frees the key.
pub struct KeyedGuard<'a, K: Eq + Hash> {
    owner: &'a KeyedLocks<K>,
    key: Option<K>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub fn new() -> Self {
        Self {
            locks: SyncMutex::new(HashMap::new()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, Slots<K>> {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for exclusive access to `key`. Access ends when the guard drops.
    pub async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
        let slot = self.slots().entry(key.clone()).or_default().clone();
        let guard = slot.lock_owned().await;
        KeyedGuard {
            owner: self,
            key: Some(key.clone()),
            guard: Some(guard),
        }
    }

    pub fn tracked_keys(&self) -> usize {
        self.slots().len()
    }
}

impl<K: Eq + Hash + Clone> Default for KeyedLocks<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        // Unlock first so the slot's count reflects only the map and waiters.
        self.guard.take();
        if let Some(key) = self.key.take() {
            let mut slots = self
                .owner
                .locks
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let idle = slots
                .get(&key)
                .is_some_and(|slot| Arc::strong_count(slot) == 1);
            if idle {
                slots.remove(&key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let locks = Arc::new(KeyedLocks::<String>::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = locks.lock(&"sku-1".to_string()).await;

        let task = {
            let locks = locks.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&"sku-1".to_string()).await;
                log.lock().await.push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.lock().await.push("first");
        drop(first);
        task.await.unwrap();

        assert_eq!(*log.lock().await, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let locks = KeyedLocks::<u32>::new();
        let _a = locks.lock(&1).await;
        let b = tokio::time::timeout(Duration::from_millis(50), locks.lock(&2)).await;
        assert!(b.is_ok());
    }

    #[tokio::test]
    async fn test_idle_entries_are_pruned() {
        let locks = KeyedLocks::<u32>::new();
        for key in 0..10 {
            let _guard = locks.lock(&key).await;
        }
        assert_eq!(locks.tracked_keys(), 0);

        let _guard = locks.lock(&99).await;
        assert_eq!(locks.tracked_keys(), 1);
    }

    #[tokio::test]
    async fn test_entry_survives_while_a_waiter_is_queued() {
        let locks = Arc::new(KeyedLocks::<u32>::new());
        let first = locks.lock(&7).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&7).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(locks.tracked_keys(), 1);

        waiter.await.unwrap();
        assert_eq!(locks.tracked_keys(), 0);
    }

    #[tokio::test]
    async fn test_many_keys_do_not_accumulate() {
        let locks = KeyedLocks::<u32>::new();
        for key in 0..1_000 {
            let _guard = locks.lock(&key).await;
            assert_eq!(locks.tracked_keys(), 1);
        }
        assert_eq!(locks.tracked_keys(), 0);
    }
}
