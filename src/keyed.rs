use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tokio::sync::Mutex;

/// In-memory map whose entries are locked individually.
///
/// Updates for the same key are serialized; updates for different keys
/// never wait on each other beyond the brief slot lookup. An entry holding
/// `V::default()` is equivalent to an absent one and is dropped once no
/// other task is waiting on it.
pub struct KeyedStore<K, V> {
    slots: Mutex<HashMap<K, Arc<Mutex<V>>>>,
}

impl<K, V> KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Default + PartialEq + Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Run `f` with exclusive access to the value for `key`.
    pub async fn update<R>(&self, key: &K, f: impl FnOnce(&mut V) -> R) -> R {
        let slot = {
            let mut slots = self.slots.lock().await;
            Arc::clone(slots.entry(key.clone()).or_default())
        };

        let mut value = slot.lock().await;
        let result = f(&mut value);

        if *value == V::default() {
            // Still holding the value: a queued writer keeps its Arc until it
            // has run. Nobody waits on a slot while holding the map lock.
            let mut slots = self.slots.lock().await;
            // Only the map and this task hold the slot: nobody is queued on it.
            if Arc::strong_count(&slot) == 2 {
                slots.remove(key);
            }
        }
        drop(value);

        result
    }

    /// Snapshot of the current value (`V::default()` when absent).
    pub async fn get(&self, key: &K) -> V {
        self.update(key, |value| value.clone()).await
    }

    /// Replace the value with the default and return what was there.
    pub async fn take(&self, key: &K) -> V {
        self.update(key, std::mem::take).await
    }

    /// Number of non-vacant entries currently tracked.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }
}

impl<K, V> Default for KeyedStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Default + PartialEq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_absent_key_reads_default() {
        let store: KeyedStore<i64, u32> = KeyedStore::new();
        assert_eq!(store.get(&7).await, 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_default_values_are_dropped() {
        let store: KeyedStore<i64, u32> = KeyedStore::new();
        store.update(&1, |v| *v = 5).await;
        assert_eq!(store.len().await, 1);

        assert_eq!(store.take(&1).await, 5);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_same_key_updates_are_not_lost() {
        let store: Arc<KeyedStore<i64, u32>> = Arc::new(KeyedStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.update(&1, |v| *v += 1).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(store.get(&1).await, 50);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let store: Arc<KeyedStore<i64, u32>> = Arc::new(KeyedStore::new());
        let slot = {
            let mut slots = store.slots.lock().await;
            Arc::clone(slots.entry(1).or_default())
        };
        // Hold key 1 for the whole test.
        let _held = slot.lock().await;

        let other = tokio::time::timeout(Duration::from_secs(1), store.update(&2, |v| *v = 9))
            .await;
        assert!(other.is_ok());
        assert_eq!(store.get(&2).await, 9);
    }

    #[tokio::test]
    async fn test_write_queued_behind_reset_survives() {
        let store: Arc<KeyedStore<i64, u32>> = Arc::new(KeyedStore::new());
        store.update(&1, |v| *v = 3).await;

        let slot = {
            let slots = store.slots.lock().await;
            Arc::clone(&slots[&1])
        };
        let held = slot.lock().await;

        let reset = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.update(&1, |v| *v = 0).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let write = {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.update(&1, |v| *v = 5).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Keep the map busy while the reset runs and the write is queued.
        let slots = store.slots.lock().await;
        drop(held);
        drop(slot);
        tokio::time::sleep(Duration::from_millis(20)).await;
        drop(slots);

        reset.await.unwrap();
        write.await.unwrap();
        assert_eq!(store.get(&1).await, 5);
        assert_eq!(store.len().await, 1);
    }
}
