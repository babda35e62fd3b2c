//! Append-only price history per (product, retailer) with a running minimum.
//!
//! Each series lives behind its own mutex so concurrent ingestion for
//! unrelated products or retailers never contends. The outer map is only
//! write-locked the first time a series is seen.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::models::{validate_price, LowestPrice, PricePoint, PriceTrend, ProductId, Retailer};

type SeriesKey = (ProductId, Retailer);

// ---------------------------------------------------------------------------
// PriceSeries
// ---------------------------------------------------------------------------

/// Chronologically ordered observations for one product at one retailer.
#[derive(Debug, Clone)]
pub struct PriceSeries {
    product_id: ProductId,
    retailer: Retailer,
    points: Vec<PricePoint>,
    lowest: Option<LowestPrice>,
}

impl PriceSeries {
    pub fn new(product_id: ProductId, retailer: Retailer) -> Self {
        Self {
            product_id,
            retailer,
            points: Vec::new(),
            lowest: None,
        }
    }

    pub fn product_id(&self) -> &ProductId {
        &self.product_id
    }

    pub fn retailer(&self) -> Retailer {
        self.retailer
    }

    /// Append an observation, keeping the series sorted by `observed_at`.
    ///
    /// Late points are inserted at their chronological position, after any
    /// existing points with the same timestamp. The running minimum is updated
    /// in the same step; a late point that is cheaper (or equally cheap and
    /// earlier) than the current minimum replaces it.
    pub fn push(&mut self, price: f64, observed_at: DateTime<Utc>) -> Result<PricePoint> {
        let point = PricePoint::new(self.product_id.clone(), self.retailer, price, observed_at)?;

        let pos = self
            .points
            .partition_point(|p| p.observed_at <= observed_at);
        self.points.insert(pos, point.clone());

        let replaces_lowest = match self.lowest {
            None => true,
            Some(lowest) => {
                price < lowest.price
                    || (price == lowest.price && observed_at < lowest.observed_at)
            }
        };
        if replaces_lowest {
            self.lowest = Some(LowestPrice { price, observed_at });
        }

        Ok(point)
    }

    /// The most recent observation (ties go to the most recently inserted).
    pub fn latest(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn lowest_ever(&self) -> Option<LowestPrice> {
        self.lowest
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// Points observed within `[from, to]`; either bound may be open.
    pub fn range(&self, from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Vec<PricePoint> {
        let start = match from {
            Some(from) => self.points.partition_point(|p| p.observed_at < from),
            None => 0,
        };
        let end = match to {
            Some(to) => self.points.partition_point(|p| p.observed_at <= to),
            None => self.points.len(),
        };
        if start >= end {
            return Vec::new();
        }
        self.points[start..end].to_vec()
    }

    pub fn trend(&self) -> Option<PriceTrend> {
        let first = self.points.first()?;
        let last = self.points.last()?;
        let lowest = self.lowest?;

        let max_price = self
            .points
            .iter()
            .map(|p| p.price)
            .fold(f64::MIN, f64::max);
        let total: f64 = self.points.iter().map(|p| p.price).sum();

        Some(PriceTrend {
            min_price: lowest.price,
            max_price,
            avg_price: total / self.points.len() as f64,
            first_observed: first.observed_at,
            last_observed: last.observed_at,
            data_points: self.points.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ---------------------------------------------------------------------------
// PriceHistory
// ---------------------------------------------------------------------------

/// Concurrent collection of [`PriceSeries`], keyed by product and retailer.
///
/// Querying a pair that has never been recorded yields `None`: a freshly
/// listed product simply has no history yet.
#[derive(Default)]
pub struct PriceHistory {
    series: RwLock<HashMap<SeriesKey, Arc<Mutex<PriceSeries>>>>,
}

impl PriceHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observed price.
    ///
    /// Fails with [`ApniListError::InvalidPrice`](crate::ApniListError::InvalidPrice)
    /// for negative or non-finite prices; nothing is stored in that case.
    pub fn record(
        &self,
        product_id: &ProductId,
        retailer: Retailer,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<PricePoint> {
        validate_price(price)?;
        let series = self.series_or_create(product_id, retailer);
        let point = series.lock().push(price, observed_at)?;
        tracing::debug!(
            product = %product_id,
            %retailer,
            price,
            %observed_at,
            "recorded price"
        );
        Ok(point)
    }

    pub fn latest(&self, product_id: &ProductId, retailer: Retailer) -> Option<PricePoint> {
        self.with_series(product_id, retailer, |s| s.latest().cloned())
            .flatten()
    }

    pub fn lowest_ever(&self, product_id: &ProductId, retailer: Retailer) -> Option<LowestPrice> {
        self.with_series(product_id, retailer, |s| s.lowest_ever())
            .flatten()
    }

    /// Chronological history for one series, optionally bounded (inclusive).
    pub fn history(
        &self,
        product_id: &ProductId,
        retailer: Retailer,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Vec<PricePoint> {
        self.with_series(product_id, retailer, |s| s.range(from, to))
            .unwrap_or_default()
    }

    pub fn trend(&self, product_id: &ProductId, retailer: Retailer) -> Option<PriceTrend> {
        self.with_series(product_id, retailer, |s| s.trend())
            .flatten()
    }

    /// Latest known price at every retailer that has history for the product.
    pub fn current_prices(&self, product_id: &ProductId) -> BTreeMap<Retailer, f64> {
        Retailer::ALL
            .iter()
            .filter_map(|&r| self.latest(product_id, r).map(|p| (r, p.price)))
            .collect()
    }

    /// Lowest price ever seen for the product across all retailers.
    pub fn product_lowest(&self, product_id: &ProductId) -> Option<(Retailer, LowestPrice)> {
        Retailer::ALL
            .iter()
            .filter_map(|&r| self.lowest_ever(product_id, r).map(|l| (r, l)))
            .min_by(|(_, a), (_, b)| {
                a.price
                    .total_cmp(&b.price)
                    .then(a.observed_at.cmp(&b.observed_at))
            })
    }

    /// Replay archived points in their original insertion order.
    pub fn restore<I>(&self, points: I) -> Result<usize>
    where
        I: IntoIterator<Item = PricePoint>,
    {
        let mut count = 0;
        for point in points {
            let series = self.series_or_create(&point.product_id, point.retailer);
            series.lock().push(point.price, point.observed_at)?;
            count += 1;
        }
        tracing::info!(points = count, "restored price history");
        Ok(count)
    }

    /// Every (product, retailer) pair with at least one observation, sorted.
    pub fn tracked(&self) -> Vec<(ProductId, Retailer)> {
        let mut keys: Vec<SeriesKey> = self.series.read().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn with_series<T>(
        &self,
        product_id: &ProductId,
        retailer: Retailer,
        f: impl FnOnce(&PriceSeries) -> T,
    ) -> Option<T> {
        let series = self
            .series
            .read()
            .get(&(product_id.clone(), retailer))
            .cloned()?;
        let guard = series.lock();
        Some(f(&guard))
    }

    fn series_or_create(&self, product_id: &ProductId, retailer: Retailer) -> Arc<Mutex<PriceSeries>> {
        let key = (product_id.clone(), retailer);
        if let Some(series) = self.series.read().get(&key) {
            return series.clone();
        }
        self.series
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(PriceSeries::new(product_id.clone(), retailer))))
            .clone()
    }
}
