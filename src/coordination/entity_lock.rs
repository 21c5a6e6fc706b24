//! # Entity Lock Manager
//!
//! Keyed mutex map serializing mutating operations per entity id. Locks are created on
//! first use and dropped from the map once nobody holds or waits on them.
//!
//! Waiters on one id are served in acquisition order (`tokio::sync::Mutex` is FIFO).
//! Acquisition is bounded by the configured timeout and fails with
//! [`OrchestratorError::LockTimeout`]. Locks are not re-entrant: acquiring an id that the
//! current call chain already holds waits out the timeout.

use crate::config::LockingConfig;
use crate::error::{OrchestratorError, Result};
use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug)]
pub struct EntityLockManager {
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
    timeout: Duration,
}

/// Held lock on one entity; released on drop
#[derive(Debug)]
pub struct EntityLockGuard<'a> {
    manager: &'a EntityLockManager,
    entity_id: Uuid,
    guard: Option<OwnedMutexGuard<()>>,
}

impl EntityLockGuard<'_> {
    pub fn entity_id(&self) -> Uuid {
        self.entity_id
    }
}

impl Drop for EntityLockGuard<'_> {
    fn drop(&mut self) {
        // release before the cleanup check so our own guard does not count as a holder
        drop(self.guard.take());
        self.manager.release_if_idle(self.entity_id);
    }
}

impl EntityLockManager {
    pub fn new(config: &LockingConfig) -> Self {
        Self::with_timeout(config.timeout())
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            locks: DashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Wait (bounded) for exclusive access to `entity_id`
    pub async fn acquire(&self, entity_id: Uuid) -> Result<EntityLockGuard<'_>> {
        let lock = self
            .locks
            .entry(entity_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => {
                debug!(entity_id = %entity_id, "Entity lock contended, waiting");
                let started = Instant::now();
                // `lock` moves into the wait so a timed-out waiter no longer counts as a holder
                let waited = tokio::time::timeout(self.timeout, lock.lock_owned()).await;
                match waited {
                    Ok(guard) => {
                        debug!(
                            entity_id = %entity_id,
                            waited_ms = started.elapsed().as_millis() as u64,
                            "Entity lock acquired after wait"
                        );
                        guard
                    }
                    Err(_) => {
                        warn!(
                            entity_id = %entity_id,
                            timeout_ms = self.timeout.as_millis() as u64,
                            "Timed out waiting for entity lock"
                        );
                        self.release_if_idle(entity_id);
                        return Err(OrchestratorError::LockTimeout {
                            entity_id,
                            waited: self.timeout,
                        });
                    }
                }
            }
        };

        Ok(EntityLockGuard {
            manager: self,
            entity_id,
            guard: Some(guard),
        })
    }

    /// Run `operation` while holding the lock for `entity_id`
    ///
    /// The lock is released when `operation` completes, fails, or the returned future is
    /// dropped.
    pub async fn with_lock<F, Fut, T>(&self, entity_id: Uuid, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let _guard = self.acquire(entity_id).await?;
        operation().await
    }

    pub fn is_locked(&self, entity_id: Uuid) -> bool {
        self.locks
            .get(&entity_id)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    /// Number of ids currently held or waited on
    pub fn tracked_entities(&self) -> usize {
        self.locks.len()
    }

    fn release_if_idle(&self, entity_id: Uuid) {
        self.locks
            .remove_if(&entity_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}
