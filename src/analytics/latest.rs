use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

struct Issued {
    token: u64,
    at: Instant,
}

/// Monotonic per-key request tokens. A result may only be delivered if no newer
/// request for the same key was issued while it was being computed.
#[derive(Clone)]
pub struct LatestRequestGuard<K> {
    issued: Arc<RwLock<HashMap<K, Issued>>>,
    // Shared across keys so a pruned key never hands out an old token again
    next_token: Arc<AtomicU64>,
}

impl<K> Default for LatestRequestGuard<K> {
    fn default() -> Self {
        Self {
            issued: Arc::new(RwLock::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<K> LatestRequestGuard<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn issue(&self, key: &K) -> u64 {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        self.issued.write().await.insert(
            key.clone(),
            Issued {
                token,
                at: Instant::now(),
            },
        );
        token
    }

    pub async fn is_latest(&self, key: &K, token: u64) -> bool {
        let issued = self.issued.read().await;
        issued.get(key).map(|i| i.token) == Some(token)
    }

    /// Forgets keys whose latest request is older than `max_age`. Returns how many remain.
    pub async fn prune(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let mut issued = self.issued.write().await;
        issued.retain(|_, i| now.duration_since(i.at) < max_age);
        issued.len()
    }
}
