//! Per-game critical sections.
//!
//! Joins for the same game run their read-decide-write sequence one at a
//! time; joins for different games never wait on each other. Entries are
//! created on demand and removed when the last holder or waiter lets go, so
//! the table only holds games with a join in flight.

use common::types::GameId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Lock for one game plus the number of holders and waiters using it.
#[derive(Default)]
struct Entry {
    lock: Arc<AsyncMutex<()>>,
    users: usize,
}

type LockTable = HashMap<GameId, Entry>;

/// Table of per-game async mutexes.
#[derive(Default)]
pub struct SessionLocks {
    // Never held across an await.
    table: Arc<Mutex<LockTable>>,
}

/// Exclusive access to one game. Released on drop.
pub struct SessionLockGuard {
    // Field order matters: unlock before deregistering.
    _guard: OwnedMutexGuard<()>,
    _registration: Registration,
}

/// One registered user of a table entry; deregisters exactly once on drop,
/// whether the lock was obtained or the wait was abandoned.
struct Registration {
    id: GameId,
    table: Arc<Mutex<LockTable>>,
}

impl SessionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `id`.
    ///
    /// Dropping the returned future before it completes (e.g. on timeout)
    /// deregisters the waiter.
    pub async fn acquire(&self, id: GameId) -> SessionLockGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = table.entry(id).or_default();
            entry.users += 1;
            Arc::clone(&entry.lock)
        };
        let registration = Registration {
            id,
            table: Arc::clone(&self.table),
        };

        let guard = lock.lock_owned().await;

        SessionLockGuard {
            _guard: guard,
            _registration: registration,
        }
    }

    /// Number of games with a holder or waiter.
    pub fn active(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = table.get_mut(&self.id) {
            entry.users = entry.users.saturating_sub(1);
            if entry.users == 0 {
                table.remove(&self.id);
            }
        }
    }
}
