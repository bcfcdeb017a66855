//! Write-lock directories: the exclusive-access gate to each identity's
//! private store. Any read-modify-write of a private store that spans a
//! suspension point goes through a lock acquired here.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::LockError;
use crate::store::{SharedRootStore, SharedUserStore};

/// Brokers exclusive write access to private stores addressed by path
/// segments (conventionally `["users", <identifier>]`).
#[async_trait]
pub trait LockDirectory: Send + Sync {
    /// Attempts to acquire the write lock for the store at `path`.
    ///
    /// Fails with [`LockError::NoSuchStore`] when no private store backs the
    /// path, and with [`LockError::AlreadyAcquired`] when the path is held.
    /// Contention policy is fail-fast: a concurrent acquirer loses
    /// immediately rather than queueing.
    async fn acquire(&self, path: &[&str]) -> Result<WriteLock, LockError>;
}

/// An exclusive handle over one identity's private store. Held until
/// [`WriteLock::release`] (explicit, not idempotent) or drop.
#[derive(Debug)]
pub struct WriteLock {
    store: SharedUserStore,
    path: String,
    held: Arc<Mutex<HashSet<String>>>,
    released: bool,
}

impl WriteLock {
    pub fn store(&self) -> &SharedUserStore {
        &self.store
    }

    /// Flushes the locked store back to long-term storage. The in-memory
    /// backend has nothing to flush, so this acknowledges immediately; a
    /// durable backend would suspend here.
    pub async fn write(&self) -> Result<(), LockError> {
        Ok(())
    }

    /// Releases the lock. Deliberately not idempotent: a second release
    /// fails with [`LockError::AlreadyReleased`], flagging a double-free
    /// style bug in the calling code.
    pub async fn release(&mut self) -> Result<(), LockError> {
        if self.released {
            return Err(LockError::AlreadyReleased);
        }
        self.released = true;
        self.held.lock().remove(&self.path);
        debug!(target: "portcullis::directory", "released lock path={}", self.path);
        Ok(())
    }
}

impl Drop for WriteLock {
    fn drop(&mut self) {
        // An abandoned lock (error propagation past the release call) must
        // not wedge the identity forever.
        if !self.released {
            self.held.lock().remove(&self.path);
        }
    }
}

/// Single-process directory backed by the root store, suitable for one
/// server. Held paths live in one set shared with the locks it hands out.
pub struct LocalLockDirectory {
    root: SharedRootStore,
    held: Arc<Mutex<HashSet<String>>>,
}

impl LocalLockDirectory {
    pub fn new(root: SharedRootStore) -> Arc<Self> {
        Arc::new(LocalLockDirectory { root, held: Arc::new(Mutex::new(HashSet::new())) })
    }

    fn resolve(&self, path: &[&str]) -> Option<SharedUserStore> {
        match path {
            ["users", identifier] => {
                let identity = crate::auth::identity::Identity::new(*identifier);
                self.root.read().user_store(&identity)
            }
            _ => None,
        }
    }
}

#[async_trait]
impl LockDirectory for LocalLockDirectory {
    async fn acquire(&self, path: &[&str]) -> Result<WriteLock, LockError> {
        let store = self.resolve(path).ok_or(LockError::NoSuchStore)?;
        let key = path.join("/");
        {
            // membership check and insert under one guard, so two racing
            // acquirers cannot both win
            let mut held = self.held.lock();
            if held.contains(&key) {
                return Err(LockError::AlreadyAcquired);
            }
            held.insert(key.clone());
        }
        debug!(target: "portcullis::directory", "acquired lock path={}", key);
        Ok(WriteLock { store, path: key, held: self.held.clone(), released: false })
    }
}
