use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Per-node exclusive locks for the review read-modify-write.
///
/// Entries are held weakly so a node's lock disappears once no review of it
/// is in flight; the map only ever holds nodes currently being reviewed.
#[derive(Debug, Default)]
pub struct NodeLocks {
    inner: Mutex<HashMap<String, Weak<AsyncMutex<()>>>>,
}

pub struct NodeLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl NodeLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, node_id: &str) -> NodeLockGuard {
        let lock = {
            let mut map = self.inner.lock();
            map.retain(|_, weak| weak.strong_count() > 0);
            match map.get(node_id).and_then(Weak::upgrade) {
                Some(existing) => existing,
                None => {
                    let fresh = Arc::new(AsyncMutex::new(()));
                    map.insert(node_id.to_string(), Arc::downgrade(&fresh));
                    fresh
                }
            }
        };
        NodeLockGuard {
            _guard: lock.lock_owned().await,
        }
    }

    pub fn tracked(&self) -> usize {
        self.inner
            .lock()
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }
}
