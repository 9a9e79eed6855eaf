//! Generic TTL-bounded concurrent cache used for idempotency replies and
//! consumed nonces.

use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// A concurrent key-value store where every entry carries an absolute
/// expiry. Reads lazily evict expired entries; a background sweeper evicts
/// entries that are never read again so memory does not grow unbounded.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: Arc<DashMap<K, (V, Instant)>>,
    default_ttl: Duration,
    sweeper: CancellationToken,
    sweeper_handle: JoinHandle<()>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache whose entries expire after `default_ttl` unless a
    /// call to [`Self::set_with_ttl`] overrides it, and spawns the
    /// background sweeper.
    #[must_use]
    pub fn new(default_ttl: Duration) -> Self {
        let entries: Arc<DashMap<K, (V, Instant)>> = Arc::new(DashMap::new());
        let sweeper = CancellationToken::new();

        let sweep_entries = Arc::clone(&entries);
        let sweep_token = sweeper.clone();
        let sweeper_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    () = sweep_token.cancelled() => break,
                    _ = interval.tick() => {
                        let now = Instant::now();
                        sweep_entries.retain(|_, (_, expires_at)| *expires_at > now);
                    }
                }
            }
        });

        Self {
            entries,
            default_ttl,
            sweeper,
            sweeper_handle,
        }
    }

    /// Inserts `value` under `key`, expiring after this cache's default TTL.
    pub fn set(&self, key: K, value: V) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Inserts `value` under `key`, expiring after `ttl`.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.entries.insert(key, (value, Instant::now() + ttl));
    }

    /// Returns a clone of the value stored under `key`, or `None` if absent
    /// or expired. An expired entry is removed as a side effect.
    pub fn get(&self, key: &K) -> Option<V> {
        match self.entries.entry(key.clone()) {
            Entry::Occupied(entry) => {
                if entry.get().1 > Instant::now() {
                    Some(entry.get().0.clone())
                } else {
                    entry.remove();
                    None
                }
            }
            Entry::Vacant(_) => None,
        }
    }

    /// Returns `true` if `key` maps to a live, unexpired entry.
    #[must_use]
    pub fn has(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Removes any entry stored under `key`.
    pub fn delete(&self, key: &K) {
        self.entries.remove(key);
    }

    /// Atomically inserts `value` under `key` only if no live entry already
    /// exists there, returning `true` if the insert happened.
    ///
    /// This is the linearizable "check-then-insert" the replay guard relies
    /// on: two concurrent callers racing on the same key must see exactly
    /// one `true` and one `false`.
    pub fn insert_if_absent(&self, key: K, value: V) -> bool {
        self.insert_if_absent_with_ttl(key, value, self.default_ttl)
    }

    /// Like [`Self::insert_if_absent`] but with an explicit TTL.
    pub fn insert_if_absent_with_ttl(&self, key: K, value: V, ttl: Duration) -> bool {
        match self.entries.entry(key) {
            Entry::Occupied(mut entry) => {
                if entry.get().1 > Instant::now() {
                    false
                } else {
                    entry.insert((value, Instant::now() + ttl));
                    true
                }
            }
            Entry::Vacant(entry) => {
                entry.insert((value, Instant::now() + ttl));
                true
            }
        }
    }

    /// Number of live entries, after first sweeping expired ones.
    pub fn size(&self) -> usize {
        self.sweep();
        self.entries.len()
    }

    /// Removes every currently-expired entry.
    pub fn sweep(&self) {
        let now = Instant::now();
        self.entries.retain(|_, (_, expires_at)| *expires_at > now);
    }

    /// Removes every entry regardless of expiry.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Stops the background sweeper. Safe to call more than once; does not
    /// block on the sweeper task's completion.
    pub fn destroy(&self) {
        self.sweeper.cancel();
    }
}

impl<K, V> Drop for TtlCache<K, V> {
    fn drop(&mut self) {
        self.sweeper.cancel();
        self.sweeper_handle.abort();
    }
}
