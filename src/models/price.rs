use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::ProductId;
use crate::error::{ApniListError, Result};

// ---------------------------------------------------------------------------
// Retailer: the marketplaces prices are tracked on
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retailer {
    Amazon,
    Flipkart,
}

impl Retailer {
    pub const ALL: [Retailer; 2] = [Retailer::Amazon, Retailer::Flipkart];

    pub fn as_str(&self) -> &'static str {
        match self {
            Retailer::Amazon => "amazon",
            Retailer::Flipkart => "flipkart",
        }
    }
}

impl FromStr for Retailer {
    type Err = ApniListError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "amazon" => Ok(Retailer::Amazon),
            "flipkart" => Ok(Retailer::Flipkart),
            other => Err(ApniListError::InvalidArgument(format!(
                "Unknown retailer: {}",
                other
            ))),
        }
    }
}

impl fmt::Display for Retailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject negative, NaN and infinite prices.
pub fn validate_price(price: f64) -> Result<f64> {
    if price.is_finite() && price >= 0.0 {
        Ok(price)
    } else {
        Err(ApniListError::InvalidPrice(price))
    }
}

// ---------------------------------------------------------------------------
// PricePoint: Single observed price
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub product_id: ProductId,
    pub retailer: Retailer,
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

impl PricePoint {
    /// Build a point, rejecting invalid prices with [`ApniListError::InvalidPrice`].
    pub fn new(
        product_id: ProductId,
        retailer: Retailer,
        price: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<Self> {
        Ok(Self {
            product_id,
            retailer,
            price: validate_price(price)?,
            observed_at,
        })
    }
}

// ---------------------------------------------------------------------------
// LowestPrice: Running minimum of a series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LowestPrice {
    pub price: f64,
    pub observed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// PriceTrend: Aggregated statistics over one series
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTrend {
    pub min_price: f64,
    pub max_price: f64,
    pub avg_price: f64,
    pub first_observed: DateTime<Utc>,
    pub last_observed: DateTime<Utc>,
    pub data_points: usize,
}
