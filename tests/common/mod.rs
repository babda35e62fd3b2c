//! Shared test fixtures for the ApniList SDK integration tests.
//!
//! Provides an ephemeral SDK builder, sample categories and products, and a
//! few [`RemoteBackend`] doubles that fail or block on demand.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;

use apnilist_sdk::{
    ApniList, ApniListError, Category, InMemoryRemote, ProductId, RemoteBackend, Result,
    RetryPolicy, UserId, WishlistEntry,
};
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;

/// An SDK with in-memory stores, a temp data dir and no retry delays.
///
/// Returns `(ApniList, tempfile::TempDir)`. The caller must keep the `TempDir`
/// alive for the duration of the test.
pub fn ephemeral_sdk() -> (ApniList, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let sdk = ApniList::builder()
        .data_dir(tmp_dir.path())
        .ephemeral(true)
        .offline(true)
        .retry_policy(RetryPolicy::immediate(3))
        .build()
        .unwrap();
    (sdk, tmp_dir)
}

/// Like [`ephemeral_sdk`] but with the given remote backend.
pub fn sdk_with_remote(backend: Arc<dyn RemoteBackend>) -> (ApniList, tempfile::TempDir) {
    let tmp_dir = tempfile::tempdir().unwrap();
    let sdk = ApniList::builder()
        .data_dir(tmp_dir.path())
        .ephemeral(true)
        .offline(true)
        .retry_policy(RetryPolicy::immediate(3))
        .remote_backend(backend)
        .build()
        .unwrap();
    (sdk, tmp_dir)
}

pub fn pid(id: &str) -> ProductId {
    ProductId::new(id).unwrap()
}

pub fn uid(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// Noon UTC on the given day of October 2024.
pub fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 10, d, 12, 0, 0).unwrap()
}

pub fn sample_categories() -> Vec<Category> {
    vec![
        Category::new("c1", "Electronics", "electronics").unwrap(),
        Category::new("c2", "TVs & Audio", "tvs-audio").unwrap(),
        Category::new("c3", "Kitchen", "kitchen").unwrap(),
        Category::new("c4", "Kitchen Chimneys", "kitchen-chimneys").unwrap(),
        Category::new("c5", "Smart Watches", "smart-watches").unwrap(),
    ]
}

pub fn sample_categories_json() -> serde_json::Value {
    serde_json::json!([
        {"id": "c1", "name": "Electronics", "slug": "electronics"},
        {"id": "c2", "name": "TVs & Audio", "slug": "tvs-audio"},
        {"id": "c3", "name": "Kitchen", "slug": "kitchen"}
    ])
}

pub fn sample_products_json() -> serde_json::Value {
    serde_json::json!([
        {
            "id": "elica-60cm-chimney",
            "name": "Elica 60cm Chimney",
            "retailerPrices": {"amazon": 8999.0, "flipkart": 9499.0},
            "purchaseUrls": {"amazon": "https://amazon.in/dp/elica60"}
        },
        {
            "id": "boat-airdopes-141",
            "name": "boAt Airdopes 141",
            "retailerPrices": {"flipkart": 1299.0}
        }
    ])
}

// ---------------------------------------------------------------------------
// Remote backend doubles
// ---------------------------------------------------------------------------

/// Fails the first `failures` calls to `add` for each product listed in
/// `flaky`, then delegates to an in-memory store.
pub struct FlakyRemote {
    pub inner: InMemoryRemote,
    flaky: Mutex<Vec<(ProductId, usize)>>,
    pub add_calls: AtomicUsize,
}

impl FlakyRemote {
    pub fn new(flaky: &[(&str, usize)]) -> Self {
        Self {
            inner: InMemoryRemote::new(),
            flaky: Mutex::new(flaky.iter().map(|(id, n)| (pid(id), *n)).collect()),
            add_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_calls(&self) -> usize {
        self.add_calls.load(Ordering::SeqCst)
    }
}

impl RemoteBackend for FlakyRemote {
    fn add(&self, user: &UserId, entry: &WishlistEntry) -> Result<bool> {
        self.add_calls.fetch_add(1, Ordering::SeqCst);
        {
            let mut flaky = self.flaky.lock();
            if let Some((_, remaining)) = flaky
                .iter_mut()
                .find(|(id, remaining)| *id == entry.product_id && *remaining > 0)
            {
                *remaining -= 1;
                return Err(ApniListError::StoreUnavailable("connection reset".into()));
            }
        }
        self.inner.add(user, entry)
    }

    fn remove(&self, user: &UserId, product_id: &ProductId) -> Result<()> {
        self.inner.remove(user, product_id)
    }

    fn contains(&self, user: &UserId, product_id: &ProductId) -> Result<bool> {
        self.inner.contains(user, product_id)
    }

    fn list(&self, user: &UserId) -> Result<Vec<WishlistEntry>> {
        self.inner.list(user)
    }
}

/// Announces each `add` on `entered` and then blocks until the test sends
/// on the matching release channel.
pub struct GatedRemote {
    pub inner: InMemoryRemote,
    entered: Mutex<Sender<ProductId>>,
    release: Mutex<Receiver<()>>,
}

impl GatedRemote {
    pub fn new() -> (Self, Receiver<ProductId>, Sender<()>) {
        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (release_tx, release_rx) = std::sync::mpsc::channel();
        let remote = Self {
            inner: InMemoryRemote::new(),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        };
        (remote, entered_rx, release_tx)
    }
}

impl RemoteBackend for GatedRemote {
    fn add(&self, user: &UserId, entry: &WishlistEntry) -> Result<bool> {
        let _ = self.entered.lock().send(entry.product_id.clone());
        let _ = self.release.lock().recv();
        self.inner.add(user, entry)
    }

    fn remove(&self, user: &UserId, product_id: &ProductId) -> Result<()> {
        self.inner.remove(user, product_id)
    }

    fn contains(&self, user: &UserId, product_id: &ProductId) -> Result<bool> {
        self.inner.contains(user, product_id)
    }

    fn list(&self, user: &UserId) -> Result<Vec<WishlistEntry>> {
        self.inner.list(user)
    }
}
