use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::ids::ProductId;
use super::price::{validate_price, Retailer};
use crate::error::{ApniListError, Result};

// ---------------------------------------------------------------------------
// Category: Static reference data behind search suggestions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub slug: String,
}

impl Category {
    pub fn new(id: &str, name: &str, slug: &str) -> Result<Self> {
        let category = Self {
            id: id.trim().to_string(),
            name: name.trim().to_string(),
            slug: slug.trim().to_string(),
        };
        category.validate()?;
        Ok(category)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [("id", &self.id), ("name", &self.name), ("slug", &self.slug)] {
            if value.trim().is_empty() {
                return Err(ApniListError::InvalidArgument(format!(
                    "category {} must not be empty (category id '{}')",
                    field, self.id
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Product: Catalog record with the current price at each retailer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub retailer_prices: BTreeMap<Retailer, f64>,
    /// Affiliate purchase links, passed through untouched.
    #[serde(default)]
    pub purchase_urls: BTreeMap<Retailer, String>,
}

/// Wire shape of a product as served by the content service.
///
/// Retailer keys arrive as free-form strings and are only accepted once they
/// parse into a known [`Retailer`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProduct {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub retailer_prices: BTreeMap<String, f64>,
    #[serde(default)]
    pub purchase_urls: BTreeMap<String, String>,
}

impl TryFrom<RawProduct> for Product {
    type Error = ApniListError;

    fn try_from(raw: RawProduct) -> Result<Self> {
        let id = ProductId::new(raw.id)?;

        let mut retailer_prices = BTreeMap::new();
        for (retailer, price) in raw.retailer_prices {
            let retailer: Retailer = retailer.parse()?;
            retailer_prices.insert(retailer, validate_price(price)?);
        }

        let mut purchase_urls = BTreeMap::new();
        for (retailer, url) in raw.purchase_urls {
            purchase_urls.insert(retailer.parse::<Retailer>()?, url);
        }

        Ok(Product {
            id,
            name: raw.name.trim().to_string(),
            retailer_prices,
            purchase_urls,
        })
    }
}
