use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};

use super::WishlistStore;
use crate::error::{ApniListError, Result};
use crate::models::{ProductId, Scope, UserId, WishlistEntry};
use crate::retry::RetryPolicy;

/// Persistence behind the remote wishlist, keyed by `(user_id, product_id)`.
///
/// Implementations must be insert-or-ignore on `add`: an existing entry keeps
/// its original `added_at`. Transient failures should be reported as
/// [`ApniListError::StoreUnavailable`] (or another error for which
/// [`ApniListError::is_transient`] holds) so callers can retry them.
pub trait RemoteBackend: Send + Sync {
    /// Insert the entry unless present. Returns `true` if a row was written.
    fn add(&self, user: &UserId, entry: &WishlistEntry) -> Result<bool>;

    fn remove(&self, user: &UserId, product_id: &ProductId) -> Result<()>;

    fn contains(&self, user: &UserId, product_id: &ProductId) -> Result<bool>;

    fn list(&self, user: &UserId) -> Result<Vec<WishlistEntry>>;
}

// ---------------------------------------------------------------------------
// InMemoryRemote
// ---------------------------------------------------------------------------

/// Process-local [`RemoteBackend`], for tests and single-process embedding.
#[derive(Default)]
pub struct InMemoryRemote {
    users: Mutex<HashMap<UserId, BTreeMap<ProductId, WishlistEntry>>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RemoteBackend for InMemoryRemote {
    fn add(&self, user: &UserId, entry: &WishlistEntry) -> Result<bool> {
        let mut users = self.users.lock();
        let entries = users.entry(user.clone()).or_default();
        if entries.contains_key(&entry.product_id) {
            return Ok(false);
        }
        entries.insert(entry.product_id.clone(), entry.clone());
        Ok(true)
    }

    fn remove(&self, user: &UserId, product_id: &ProductId) -> Result<()> {
        if let Some(entries) = self.users.lock().get_mut(user) {
            entries.remove(product_id);
        }
        Ok(())
    }

    fn contains(&self, user: &UserId, product_id: &ProductId) -> Result<bool> {
        Ok(self
            .users
            .lock()
            .get(user)
            .is_some_and(|entries| entries.contains_key(product_id)))
    }

    fn list(&self, user: &UserId) -> Result<Vec<WishlistEntry>> {
        Ok(self
            .users
            .lock()
            .get(user)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// RemoteWishlist
// ---------------------------------------------------------------------------

/// Account-scoped wishlist. Usable only while a user is bound.
pub struct RemoteWishlist {
    backend: Arc<dyn RemoteBackend>,
    user: RwLock<Option<UserId>>,
    retry: RetryPolicy,
}

impl RemoteWishlist {
    pub fn new(backend: Arc<dyn RemoteBackend>, retry: RetryPolicy) -> Self {
        Self {
            backend,
            user: RwLock::new(None),
            retry,
        }
    }

    pub fn bind(&self, user: UserId) {
        tracing::debug!(user = %user, "remote wishlist bound");
        *self.user.write() = Some(user);
    }

    pub fn unbind(&self) {
        if let Some(user) = self.user.write().take() {
            tracing::debug!(user = %user, "remote wishlist unbound");
        }
    }

    pub fn user(&self) -> Option<UserId> {
        self.user.read().clone()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Entries with their original `added_at`, ordered by product id.
    pub fn entries(&self) -> Result<Vec<WishlistEntry>> {
        let user = self.require_user()?;
        let mut entries = self
            .retry
            .run("remote.list", || self.backend.list(&user))?;
        entries.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        Ok(entries)
    }

    /// Single add attempt for `user`, without retrying.
    ///
    /// Reconciliation drives its own retry loop so it can stop between
    /// attempts when the session ends.
    pub(crate) fn add_once(&self, user: &UserId, product_id: &ProductId) -> Result<bool> {
        self.backend.add(user, &new_entry(product_id))
    }

    pub(crate) fn list_for(&self, user: &UserId) -> Result<BTreeSet<ProductId>> {
        let entries = self
            .retry
            .run("remote.list", || self.backend.list(user))?;
        Ok(entries.into_iter().map(|e| e.product_id).collect())
    }

    fn require_user(&self) -> Result<UserId> {
        self.user().ok_or(ApniListError::Unauthenticated)
    }
}

impl WishlistStore for RemoteWishlist {
    fn scope(&self) -> Scope {
        Scope::Remote
    }

    fn add(&self, product_id: &ProductId) -> Result<()> {
        let user = self.require_user()?;
        let entry = new_entry(product_id);
        self.retry
            .run("remote.add", || self.backend.add(&user, &entry))?;
        Ok(())
    }

    fn remove(&self, product_id: &ProductId) -> Result<()> {
        let user = self.require_user()?;
        self.retry
            .run("remote.remove", || self.backend.remove(&user, product_id))
    }

    fn contains(&self, product_id: &ProductId) -> Result<bool> {
        let user = self.require_user()?;
        self.retry
            .run("remote.contains", || self.backend.contains(&user, product_id))
    }

    fn list(&self) -> Result<BTreeSet<ProductId>> {
        let user = self.require_user()?;
        self.list_for(&user)
    }
}

fn new_entry(product_id: &ProductId) -> WishlistEntry {
    WishlistEntry {
        product_id: product_id.clone(),
        added_at: Utc::now(),
        scope: Scope::Remote,
    }
}
