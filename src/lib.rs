//! ApniList SDK for Rust.
//!
//! Tracks product prices across retailers, derives the lowest-ever price and
//! a buy-now / wait signal from it, and keeps a user's wishlist consistent
//! between an anonymous device-local store and their account once they sign
//! in.
//!
//! # Quick start
//!
//! ```no_run
//! use apnilist_sdk::{ApniList, IdentityEvent, ProductId, Retailer, UserId};
//! use chrono::Utc;
//!
//! let sdk = ApniList::builder().build().unwrap();
//! let chimney = ProductId::new("elica-60cm-chimney").unwrap();
//!
//! sdk.record_price(&chimney, Retailer::Amazon, 8999.0, Utc::now()).unwrap();
//! println!("{}", sdk.recommendation(&chimney));
//!
//! // Anonymous wishlist, migrated into the account on sign-in.
//! sdk.wishlist_add(&chimney).unwrap();
//! sdk.handle_identity(IdentityEvent::SignedIn(UserId::new("user-42").unwrap()))
//!     .unwrap();
//! ```

#[cfg(feature = "async")]
pub mod async_client;
pub mod catalog;
pub mod config;
pub mod error;
pub mod history;
pub mod models;
pub mod recommend;
pub mod reconcile;
pub mod retry;
pub mod storage;
pub mod suggest;
pub mod wishlist;

#[cfg(feature = "async")]
pub use async_client::AsyncApniList;
pub use catalog::CatalogClient;
pub use error::{ApniListError, Result};
pub use history::{PriceHistory, PriceSeries};
pub use models::{
    Category, IdentityEvent, LowestPrice, PricePoint, PriceTrend, Product, ProductId, Retailer,
    Scope, UserId, WishlistEntry,
};
pub use recommend::{recommend, Recommendation, RecommendationEngine};
pub use reconcile::{ReconcileOutcome, ReconcileReport, ReconcileState, Reconciler};
pub use retry::RetryPolicy;
pub use storage::{DuckDbStore, PriceArchive};
pub use suggest::{SuggestionIndex, Suggestions};
pub use wishlist::{InMemoryRemote, LocalWishlist, RemoteBackend, RemoteWishlist, WishlistStore};

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

// ---------------------------------------------------------------------------
// ApniListBuilder
// ---------------------------------------------------------------------------

/// Builder for configuring and constructing an [`ApniList`] instance.
///
/// Use [`ApniList::builder()`] to obtain a builder, chain configuration
/// methods, and call [`build()`](ApniListBuilder::build) to create the SDK.
pub struct ApniListBuilder {
    data_dir: Option<PathBuf>,
    ephemeral: bool,
    offline: bool,
    timeout: Duration,
    catalog_url: String,
    buy_threshold_percent: f64,
    retry: RetryPolicy,
    remote_backend: Option<Arc<dyn RemoteBackend>>,
    price_archive: Option<Arc<dyn PriceArchive>>,
}

impl Default for ApniListBuilder {
    fn default() -> Self {
        Self {
            data_dir: None,
            ephemeral: false,
            offline: false,
            timeout: Duration::from_secs(30),
            catalog_url: config::CATALOG_BASE.to_string(),
            buy_threshold_percent: config::DEFAULT_BUY_THRESHOLD_PERCENT,
            retry: RetryPolicy::default(),
            remote_backend: None,
            price_archive: None,
        }
    }
}

impl ApniListBuilder {
    /// Set the directory holding the local wishlist, the DuckDB store and the
    /// catalog cache.
    ///
    /// If not set, the platform-appropriate local data directory is used
    /// (e.g. `~/.local/share/apnilist-sdk` on Linux).
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.data_dir = Some(path.as_ref().to_path_buf());
        self
    }

    /// Keep the local wishlist and default stores in memory only.
    ///
    /// Nothing survives the process unless an explicit remote backend or
    /// price archive is supplied. The catalog cache still uses the data
    /// directory, created on first catalog access.
    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.ephemeral = ephemeral;
        self
    }

    /// Never download catalog files; only previously cached ones are used.
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// HTTP timeout for catalog downloads. Defaults to 30 seconds.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn catalog_url(mut self, url: impl Into<String>) -> Self {
        self.catalog_url = url.into();
        self
    }

    /// Percent above the lowest-ever price still considered a buy. Defaults to 5.
    pub fn buy_threshold_percent(mut self, percent: f64) -> Self {
        self.buy_threshold_percent = percent;
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a custom remote wishlist backend instead of the default store.
    pub fn remote_backend(mut self, backend: Arc<dyn RemoteBackend>) -> Self {
        self.remote_backend = Some(backend);
        self
    }

    /// Use a custom price archive instead of the default store.
    pub fn price_archive(mut self, archive: Arc<dyn PriceArchive>) -> Self {
        self.price_archive = Some(archive);
        self
    }

    /// Build the SDK.
    ///
    /// Opens the local wishlist and, unless ephemeral, the DuckDB store in the
    /// data directory, then replays the price archive into memory. Catalog
    /// files are not fetched here; they are loaded on demand.
    pub fn build(self) -> Result<ApniList> {
        let engine = RecommendationEngine::new(self.buy_threshold_percent)?;
        let data_dir = self.data_dir.unwrap_or_else(config::default_data_dir);

        let local = if self.ephemeral {
            LocalWishlist::in_memory()
        } else {
            std::fs::create_dir_all(&data_dir)?;
            LocalWishlist::open(data_dir.join(config::LOCAL_WISHLIST_FILE))?
        };

        let needs_default_store = self.remote_backend.is_none() || self.price_archive.is_none();
        let default_store = if needs_default_store && !self.ephemeral {
            Some(Arc::new(DuckDbStore::open(data_dir.join(config::STORE_DB_FILE))?))
        } else {
            None
        };

        let remote_backend: Arc<dyn RemoteBackend> = match (self.remote_backend, &default_store) {
            (Some(backend), _) => backend,
            (None, Some(store)) => store.clone() as Arc<dyn RemoteBackend>,
            (None, None) => Arc::new(InMemoryRemote::new()),
        };
        let archive: Option<Arc<dyn PriceArchive>> = match (self.price_archive, &default_store) {
            (Some(archive), _) => Some(archive),
            (None, Some(store)) => Some(store.clone() as Arc<dyn PriceArchive>),
            (None, None) => None,
        };

        let history = PriceHistory::new();
        if let Some(archive) = &archive {
            history.restore(archive.load_all()?)?;
        }

        let local = Arc::new(local);
        let remote = Arc::new(RemoteWishlist::new(remote_backend, self.retry));
        let reconciler = Reconciler::new(local.clone(), remote.clone(), self.retry);

        Ok(ApniList {
            history,
            engine,
            local,
            remote,
            reconciler,
            archive,
            retry: self.retry,
            catalog: Mutex::new(None),
            catalog_url: self.catalog_url,
            offline: self.offline,
            timeout: self.timeout,
            suggestions: RwLock::new(SuggestionIndex::default()),
            data_dir,
        })
    }
}

// ---------------------------------------------------------------------------
// ApniList
// ---------------------------------------------------------------------------

/// The main entry point for the ApniList SDK.
///
/// Owns the price history, both wishlist stores and the reconciliation
/// engine. All methods take `&self`; the instance can be shared across
/// threads.
pub struct ApniList {
    history: PriceHistory,
    engine: RecommendationEngine,
    local: Arc<LocalWishlist>,
    remote: Arc<RemoteWishlist>,
    reconciler: Reconciler,
    archive: Option<Arc<dyn PriceArchive>>,
    retry: RetryPolicy,
    catalog: Mutex<Option<CatalogClient>>,
    catalog_url: String,
    offline: bool,
    timeout: Duration,
    suggestions: RwLock<SuggestionIndex>,
    data_dir: PathBuf,
}

impl ApniList {
    /// Create a new builder for configuring the SDK.
    pub fn builder() -> ApniListBuilder {
        ApniListBuilder::default()
    }

    // -- Prices --------------------------------------------------------------

    /// Record an observed price, archiving it first when an archive is set.
    pub fn record_price(
        &self,
        product_id: &ProductId,
        retailer: Retailer,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<PricePoint> {
        let point = PricePoint::new(product_id.clone(), retailer, price, observed_at)?;
        if let Some(archive) = &self.archive {
            self.retry
                .run("archive.append", || archive.append(&point))?;
        }
        self.history.record(product_id, retailer, price, observed_at)
    }

    /// Record the current retailer prices carried by a catalog product.
    pub fn ingest_product(&self, product: &Product, observed_at: DateTime<Utc>) -> Result<Vec<PricePoint>> {
        product
            .retailer_prices
            .iter()
            .map(|(&retailer, &price)| self.record_price(&product.id, retailer, price, observed_at))
            .collect()
    }

    pub fn latest(&self, product_id: &ProductId, retailer: Retailer) -> Option<PricePoint> {
        self.history.latest(product_id, retailer)
    }

    pub fn lowest_ever(&self, product_id: &ProductId, retailer: Retailer) -> Option<LowestPrice> {
        self.history.lowest_ever(product_id, retailer)
    }

    pub fn history(
        &self,
        product_id: &ProductId,
        retailer: Retailer,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<PricePoint> {
        self.history.history(product_id, retailer, from, to)
    }

    pub fn trend(&self, product_id: &ProductId, retailer: Retailer) -> Option<PriceTrend> {
        self.history.trend(product_id, retailer)
    }

    pub fn current_prices(&self, product_id: &ProductId) -> BTreeMap<Retailer, f64> {
        self.history.current_prices(product_id)
    }

    /// Buy-now / wait signal from the latest price at each retailer against
    /// the lowest price ever seen at any of them.
    pub fn recommendation(&self, product_id: &ProductId) -> Recommendation {
        let current = self.history.current_prices(product_id);
        let lowest = self
            .history
            .product_lowest(product_id)
            .map(|(_, lowest)| lowest.price);
        self.engine.recommend(&current, lowest)
    }

    pub fn price_history(&self) -> &PriceHistory {
        &self.history
    }

    pub fn engine(&self) -> RecommendationEngine {
        self.engine
    }

    // -- Wishlist ------------------------------------------------------------

    /// The store wishlist operations currently go to: remote while signed in,
    /// local otherwise.
    pub fn active_wishlist(&self) -> &dyn WishlistStore {
        if self.remote.user().is_some() {
            &*self.remote as &dyn WishlistStore
        } else {
            &*self.local
        }
    }

    pub fn wishlist_add(&self, product_id: &ProductId) -> Result<()> {
        self.active_wishlist().add(product_id)
    }

    pub fn wishlist_remove(&self, product_id: &ProductId) -> Result<()> {
        self.active_wishlist().remove(product_id)
    }

    pub fn wishlist_contains(&self, product_id: &ProductId) -> Result<bool> {
        self.active_wishlist().contains(product_id)
    }

    pub fn wishlist(&self) -> Result<BTreeSet<ProductId>> {
        self.active_wishlist().list()
    }

    /// Flip membership, returning `true` if the product is now wishlisted.
    pub fn wishlist_toggle(&self, product_id: &ProductId) -> Result<bool> {
        self.active_wishlist().toggle(product_id)
    }

    pub fn local_wishlist(&self) -> &LocalWishlist {
        &self.local
    }

    pub fn remote_wishlist(&self) -> &RemoteWishlist {
        &self.remote
    }

    // -- Identity ------------------------------------------------------------

    /// Feed a session event from the identity provider.
    ///
    /// `SignedIn` runs (or skips, if already handled) reconciliation and
    /// returns its outcome; `SignedOut` returns `None`.
    pub fn handle_identity(&self, event: IdentityEvent) -> Result<Option<ReconcileOutcome>> {
        self.reconciler.handle(event)
    }

    pub fn reconcile_state(&self) -> ReconcileState {
        self.reconciler.state()
    }

    pub fn signed_in_user(&self) -> Option<UserId> {
        self.remote.user()
    }

    // -- Catalog & suggestions -----------------------------------------------

    /// Run `f` against the catalog client, creating it on first use.
    pub fn with_catalog<T>(&self, f: impl FnOnce(&mut CatalogClient) -> Result<T>) -> Result<T> {
        let mut guard = self.catalog.lock();
        if guard.is_none() {
            *guard = Some(CatalogClient::new(
                self.data_dir.join(config::CATALOG_DIR),
                self.catalog_url.clone(),
                self.offline,
                self.timeout,
            )?);
        }
        match guard.as_mut() {
            Some(client) => f(client),
            None => Err(ApniListError::NotFound("catalog client".into())),
        }
    }

    /// Fetch categories from the content service and rebuild the suggestion index.
    pub fn load_categories(&self) -> Result<usize> {
        let categories = self.with_catalog(|c| c.categories())?;
        let count = categories.len();
        self.set_categories(categories);
        Ok(count)
    }

    /// Replace the suggestion index with the given categories, in order.
    pub fn set_categories(&self, categories: Vec<Category>) {
        *self.suggestions.write() = SuggestionIndex::new(categories);
    }

    /// Fetch the product catalog and record every listed price.
    pub fn ingest_catalog(&self, observed_at: DateTime<Utc>) -> Result<usize> {
        let products = self.with_catalog(|c| c.products())?;
        let mut recorded = 0;
        for product in &products {
            recorded += self.ingest_product(product, observed_at)?.len();
        }
        tracing::info!(products = products.len(), recorded, "ingested catalog prices");
        Ok(recorded)
    }

    /// Clear cached catalog files so the next load re-downloads them.
    pub fn refresh_catalog(&self) -> Result<()> {
        self.with_catalog(|c| c.clear())
    }

    /// Category suggestions for search-as-you-type input, at most `limit`
    /// of them ([`config::DEFAULT_SUGGESTION_LIMIT`] when `None`).
    pub fn suggestions(&self, text: &str, limit: Option<usize>) -> Vec<Category> {
        self.suggestions
            .read()
            .query(text, limit.unwrap_or(config::DEFAULT_SUGGESTION_LIMIT))
            .cloned()
            .collect()
    }

    pub fn category_by_name(&self, name: &str) -> Option<Category> {
        self.suggestions.read().by_name(name).cloned()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for ApniList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ApniList(data_dir={}, series={}, local_wishlist={}, user={}, reconcile={:?})",
            self.data_dir.display(),
            self.history.tracked().len(),
            self.local.len(),
            self.remote
                .user()
                .map(|u| u.to_string())
                .unwrap_or_else(|| "anonymous".to_string()),
            self.reconciler.state()
        )
    }
}
