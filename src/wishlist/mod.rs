//! Wishlist stores: an identity-free local store and an account-scoped remote
//! store, both behind the same [`WishlistStore`] contract.
//!
//! Every mutation is durable before it returns, and both `add` and `remove`
//! are idempotent.

mod local;
mod remote;

use std::collections::BTreeSet;

pub use local::LocalWishlist;
pub use remote::{InMemoryRemote, RemoteBackend, RemoteWishlist};

use crate::error::Result;
use crate::models::{ProductId, Scope};

pub trait WishlistStore: Send + Sync {
    fn scope(&self) -> Scope;

    /// Add a product. Adding one that is already present is a no-op.
    fn add(&self, product_id: &ProductId) -> Result<()>;

    /// Remove a product. Removing one that is absent is a no-op.
    fn remove(&self, product_id: &ProductId) -> Result<()>;

    fn contains(&self, product_id: &ProductId) -> Result<bool>;

    fn list(&self) -> Result<BTreeSet<ProductId>>;

    /// Flip membership, returning `true` if the product is now wishlisted.
    fn toggle(&self, product_id: &ProductId) -> Result<bool> {
        if self.contains(product_id)? {
            self.remove(product_id)?;
            Ok(false)
        } else {
            self.add(product_id)?;
            Ok(true)
        }
    }
}
