//! Per-hash serialization of registrations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OwnedMutexGuard;

/// Hands out one async lock per content hash. Concurrent registrations of the
/// same bytes queue behind each other, so the second sees the first's
/// fingerprint instead of racing it into the store.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    // Sync mutex: only held to clone or drop an entry, never across an await.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Holds the lock for one hash; the map entry goes away with the last holder.
pub(crate) struct InFlightGuard<'a> {
    owner: &'a InFlight,
    hash: String,
    guard: OwnedMutexGuard<()>,
}

impl InFlight {
    pub(crate) async fn acquire(&self, hash: &str) -> InFlightGuard<'_> {
        let slot = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(hash.to_string()).or_default())
        };
        let guard = slot.lock_owned().await;
        InFlightGuard { owner: self, hash: hash.to_string(), guard }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut locks = self.owner.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one in our guard; anything more is a waiter.
        if Arc::strong_count(OwnedMutexGuard::mutex(&self.guard)) == 2 {
            locks.remove(&self.hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_entry_removed_after_last_holder() {
        let in_flight = InFlight::default();
        {
            let _guard = in_flight.acquire("abc").await;
            assert_eq!(in_flight.len(), 1);
        }
        assert_eq!(in_flight.len(), 0);
    }

    #[tokio::test]
    async fn test_same_hash_is_serialized() {
        let in_flight = Arc::new(InFlight::default());
        let first = in_flight.acquire("abc").await;
        let waiter = {
            let in_flight = Arc::clone(&in_flight);
            tokio::spawn(async move {
                let _guard = in_flight.acquire("abc").await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        // A different hash is not blocked.
        drop(in_flight.acquire("def").await);
        drop(first);
        waiter.await.unwrap();
        assert_eq!(in_flight.len(), 0);
    }
}
