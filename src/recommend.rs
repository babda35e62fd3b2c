//! Buy-now / wait signal derived from current prices and the historical minimum.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config;
use crate::error::{ApniListError, Result};
use crate::models::Retailer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "signal", rename_all = "snake_case")]
pub enum Recommendation {
    BuyNow,
    /// Best current price is above the buy threshold; carries how far above
    /// the lowest-ever price it is, rounded to a whole percent.
    Wait { percent_above: i64 },
    Unknown,
}

impl Recommendation {
    pub fn is_buy_now(&self) -> bool {
        matches!(self, Recommendation::BuyNow)
    }
}

impl fmt::Display for Recommendation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Recommendation::BuyNow => f.write_str("Best Price!"),
            Recommendation::Wait { percent_above } => write!(f, "{}% higher", percent_above),
            Recommendation::Unknown => f.write_str("Price history unavailable"),
        }
    }
}

/// Stateless threshold rule; cheap to copy and safe to share across threads.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecommendationEngine {
    threshold_percent: f64,
}

impl Default for RecommendationEngine {
    fn default() -> Self {
        Self {
            threshold_percent: config::DEFAULT_BUY_THRESHOLD_PERCENT,
        }
    }
}

impl RecommendationEngine {
    pub fn new(threshold_percent: f64) -> Result<Self> {
        if !threshold_percent.is_finite() || threshold_percent < 0.0 {
            return Err(ApniListError::InvalidArgument(format!(
                "buy threshold must be a non-negative percentage, got {}",
                threshold_percent
            )));
        }
        Ok(Self { threshold_percent })
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    /// Compare the best current price against the lowest-ever price.
    ///
    /// A missing or zero historical minimum yields [`Recommendation::Unknown`]:
    /// a zero minimum is treated as corrupt data rather than a division error.
    /// No current prices also yields `Unknown`.
    pub fn recommend(
        &self,
        current_prices: &BTreeMap<Retailer, f64>,
        lowest_ever: Option<f64>,
    ) -> Recommendation {
        let lowest = match lowest_ever {
            Some(lowest) if lowest > 0.0 && lowest.is_finite() => lowest,
            _ => return Recommendation::Unknown,
        };
        let best_current = match current_prices
            .values()
            .copied()
            .filter(|p| p.is_finite())
            .min_by(f64::total_cmp)
        {
            Some(best) => best,
            None => return Recommendation::Unknown,
        };

        let percent_above = (best_current - lowest) / lowest * 100.0;
        if percent_above <= self.threshold_percent {
            Recommendation::BuyNow
        } else {
            Recommendation::Wait {
                percent_above: percent_above.round() as i64,
            }
        }
    }
}

/// [`RecommendationEngine::recommend`] with the default 5% threshold.
pub fn recommend(current_prices: &BTreeMap<Retailer, f64>, lowest_ever: Option<f64>) -> Recommendation {
    RecommendationEngine::default().recommend(current_prices, lowest_ever)
}
