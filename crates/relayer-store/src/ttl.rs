// Copyright 2022 Webb Technologies Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// A key-value map whose entries expire.
///
/// Every operation is a single synchronous step, so callers never hold a
/// suspension point between a read and the write that depends on it.
pub trait TtlStore<K, V>: Send + Sync {
    /// Returns the value when present and not expired. Expired entries are
    /// evicted on lookup.
    fn get(&self, key: &K) -> Option<V>;
    /// Inserts or replaces `key`, expiring after `ttl`.
    fn set_with_expiry(&self, key: K, value: V, ttl: Duration);
    /// Removes `key`, returning whether it was present.
    fn delete(&self, key: &K) -> bool;
    /// Removes and returns the value if present and not expired.
    fn take(&self, key: &K) -> Option<V>;
    /// Drops every expired entry, returning how many were removed.
    fn sweep_expired(&self) -> usize;
    /// Time left before `key` expires.
    fn remaining(&self, key: &K) -> Option<Duration>;
}

/// In-process [`TtlStore`].
pub struct MemTtlStore<K, V> {
    entries: Mutex<HashMap<K, (V, Instant)>>,
}

impl<K, V> Default for MemTtlStore<K, V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> std::fmt::Debug for MemTtlStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTtlStore")
            .field("len", &self.entries.lock().len())
            .finish()
    }
}

impl<K, V> MemTtlStore<K, V> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<K, V> TtlStore<K, V> for MemTtlStore<K, V>
where
    K: Eq + Hash + Send,
    V: Clone + Send,
{
    fn get(&self, key: &K) -> Option<V> {
        let mut guard = self.entries.lock();
        match guard.get(key) {
            Some((_, expires_at)) if *expires_at <= Instant::now() => {
                guard.remove(key);
                None
            }
            Some((value, _)) => Some(value.clone()),
            None => None,
        }
    }

    fn set_with_expiry(&self, key: K, value: V, ttl: Duration) {
        self.entries
            .lock()
            .insert(key, (value, Instant::now() + ttl));
    }

    fn delete(&self, key: &K) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    fn take(&self, key: &K) -> Option<V> {
        let (value, expires_at) = self.entries.lock().remove(key)?;
        (expires_at > Instant::now()).then_some(value)
    }

    fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut guard = self.entries.lock();
        let before = guard.len();
        guard.retain(|_, (_, expires_at)| *expires_at > now);
        before - guard.len()
    }

    fn remaining(&self, key: &K) -> Option<Duration> {
        let guard = self.entries.lock();
        let (_, expires_at) = guard.get(key)?;
        let left = expires_at.checked_duration_since(Instant::now())?;
        (!left.is_zero()).then_some(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let store = MemTtlStore::new();
        store.set_with_expiry("a", 1, Duration::from_secs(10));
        store.set_with_expiry("b", 2, Duration::from_secs(60));
        assert_eq!(store.get(&"a"), Some(1));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get(&"a"), None);
        assert_eq!(store.get(&"b"), Some(2));
        assert_eq!(
            store.remaining(&"b"),
            Some(Duration::from_secs(49))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_expired() {
        let store = MemTtlStore::new();
        store.set_with_expiry(1, "x", Duration::from_secs(1));
        store.set_with_expiry(2, "y", Duration::from_secs(1));
        store.set_with_expiry(3, "z", Duration::from_secs(100));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.sweep_expired(), 2);
        assert_eq!(store.get(&3), Some("z"));
    }

    #[tokio::test(start_paused = true)]
    async fn take_is_one_shot_and_respects_expiry() {
        let store = MemTtlStore::new();
        store.set_with_expiry("k", 7, Duration::from_secs(5));
        assert_eq!(store.take(&"k"), Some(7));
        assert_eq!(store.take(&"k"), None);

        store.set_with_expiry("k", 8, Duration::from_secs(5));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(store.take(&"k"), None);
        assert!(!store.delete(&"k"));
    }
}
