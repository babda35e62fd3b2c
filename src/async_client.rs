//! Async wrapper around [`ApniList`] for use in async runtimes (Tokio, etc.).
//!
//! Runs all SDK operations on a blocking thread pool via
//! [`tokio::task::spawn_blocking`], keeping the async event loop free.
//! Reconciliation may sleep between retries and catalog loads do blocking
//! HTTP, so neither should run on an async worker thread directly.
//!
//! # Example
//!
//! ```no_run
//! use apnilist_sdk::{AsyncApniList, IdentityEvent, UserId};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let sdk = AsyncApniList::builder().build().await.unwrap();
//!
//!     let user = UserId::new("user-42").unwrap();
//!     let outcome = sdk.handle_identity(IdentityEvent::SignedIn(user)).await.unwrap();
//!     println!("{:?}", outcome);
//! }
//! ```

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{ApniListError, Result};
use crate::models::{IdentityEvent, ProductId};
use crate::reconcile::ReconcileOutcome;
use crate::recommend::Recommendation;
use crate::ApniList;

// ---------------------------------------------------------------------------
// AsyncApniListBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`AsyncApniList`] instance.
#[derive(Default)]
pub struct AsyncApniListBuilder {
    data_dir: Option<PathBuf>,
    ephemeral: bool,
    offline: bool,
}

impl AsyncApniListBuilder {
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Build the async SDK on the blocking thread pool.
    pub async fn build(self) -> Result<AsyncApniList> {
        tokio::task::spawn_blocking(move || {
            let mut builder = ApniList::builder();
            if let Some(dir) = self.data_dir {
                builder = builder.data_dir(dir);
            }
            let sdk = builder
                .ephemeral(self.ephemeral)
                .offline(self.offline)
                .build()?;
            Ok(AsyncApniList::from_sdk(sdk))
        })
        .await
        .map_err(|e| ApniListError::InvalidArgument(format!("Task join error: {e}")))?
    }
}

// ---------------------------------------------------------------------------
// AsyncApniList
// ---------------------------------------------------------------------------

/// Async wrapper around [`ApniList`].
///
/// [`ApniList`] is `Sync`, so the wrapper only needs an `Arc`; every call is
/// dispatched to the blocking pool.
#[derive(Clone)]
pub struct AsyncApniList {
    inner: Arc<ApniList>,
}

impl AsyncApniList {
    pub fn builder() -> AsyncApniListBuilder {
        AsyncApniListBuilder::default()
    }

    /// Wrap an already configured SDK.
    pub fn from_sdk(sdk: ApniList) -> Self {
        Self {
            inner: Arc::new(sdk),
        }
    }

    /// Run a sync SDK operation on the blocking thread pool.
    pub async fn run<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ApniList) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sdk = self.inner.clone();
        tokio::task::spawn_blocking(move || f(&sdk))
            .await
            .map_err(|e| ApniListError::InvalidArgument(format!("Task join error: {e}")))?
    }

    pub async fn handle_identity(&self, event: IdentityEvent) -> Result<Option<ReconcileOutcome>> {
        self.run(move |s| s.handle_identity(event)).await
    }

    pub async fn recommendation(&self, product_id: ProductId) -> Result<Recommendation> {
        self.run(move |s| Ok(s.recommendation(&product_id))).await
    }

    pub async fn wishlist_toggle(&self, product_id: ProductId) -> Result<bool> {
        self.run(move |s| s.wishlist_toggle(&product_id)).await
    }

    pub async fn wishlist(&self) -> Result<BTreeSet<ProductId>> {
        self.run(|s| s.wishlist()).await
    }

    pub async fn load_categories(&self) -> Result<usize> {
        self.run(|s| s.load_categories()).await
    }
}
