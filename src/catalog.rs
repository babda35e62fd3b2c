//! Category and product reference data from the content service.
//!
//! Files are downloaded on first access and cached under the data directory.
//! Everything is validated on the way in: a record with a missing field, an
//! unknown retailer or an invalid price rejects the whole load instead of
//! leaking half-typed data downstream.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use flate2::read::GzDecoder;
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;

use crate::config;
use crate::error::{ApniListError, Result};
use crate::models::{Category, Product, RawProduct};

/// Downloads and caches catalog files from the content service.
pub struct CatalogClient {
    /// Directory where cached catalog files are stored.
    pub cache_dir: PathBuf,
    /// If true, never download (use cached files only).
    pub offline: bool,
    base_url: String,
    timeout: Duration,
    client: Option<Client>,
}

impl CatalogClient {
    /// Create a catalog client caching into `cache_dir`, creating it if needed.
    pub fn new(
        cache_dir: PathBuf,
        base_url: impl Into<String>,
        offline: bool,
        timeout: Duration,
    ) -> Result<Self> {
        fs::create_dir_all(&cache_dir)?;
        Ok(Self {
            cache_dir,
            offline,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            client: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lazy HTTP client, created on first use.
    fn client(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            self.client = Some(
                Client::builder()
                    .timeout(self.timeout)
                    .redirect(reqwest::redirect::Policy::limited(10))
                    .build()?,
            );
        }
        self.client
            .as_ref()
            .ok_or_else(|| ApniListError::InvalidArgument("HTTP client unavailable".into()))
    }

    /// All categories, in the order the content service lists them.
    pub fn categories(&mut self) -> Result<Vec<Category>> {
        let categories: Vec<Category> = self.load("categories")?;
        for category in &categories {
            category.validate()?;
        }
        tracing::debug!(count = categories.len(), "loaded categories");
        Ok(categories)
    }

    pub fn products(&mut self) -> Result<Vec<Product>> {
        let raw: Vec<RawProduct> = self.load("products")?;
        let products = raw
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(count = products.len(), "loaded products");
        Ok(products)
    }

    /// Ensure a catalog file is cached locally, downloading it if needed.
    pub fn ensure_file(&mut self, name: &str) -> Result<PathBuf> {
        let files = config::catalog_files();
        let filename = files.get(name).ok_or_else(|| {
            ApniListError::NotFound(format!("Unknown catalog file: {}", name))
        })?;

        let local_path = self.cache_dir.join(filename);
        if local_path.exists() {
            return Ok(local_path);
        }
        if self.offline {
            return Err(ApniListError::NotFound(format!(
                "Catalog file {} not cached and offline mode is enabled",
                filename
            )));
        }
        self.download_file(filename, &local_path)?;
        Ok(local_path)
    }

    /// Remove all cached catalog files so the next access re-downloads them.
    pub fn clear(&self) -> Result<()> {
        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
            fs::create_dir_all(&self.cache_dir)?;
        }
        Ok(())
    }

    /// Drop the HTTP client, if open.
    pub fn close(&mut self) {
        self.client = None;
    }

    /// Downloads to a temp file first and renames on success, so an
    /// interrupted download never leaves a corrupt partial file behind.
    fn download_file(&mut self, filename: &str, dest: &Path) -> Result<()> {
        let url = format!("{}/{}", self.base_url, filename);
        tracing::info!(%url, "downloading catalog file");

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_dest = dest.with_extension(format!(
            "{}.tmp",
            dest.extension().and_then(|e| e.to_str()).unwrap_or("")
        ));

        let client = self.client()?.clone();
        let result = (|| -> Result<()> {
            let resp = client.get(&url).send()?.error_for_status()?;
            let bytes = resp.bytes()?;
            fs::write(&tmp_dest, &bytes)?;
            fs::rename(&tmp_dest, dest)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_dest);
        }
        result
    }

    /// Load a cached file and deserialize it into typed records.
    ///
    /// Syntactically corrupt files are deleted so the next call re-downloads
    /// them; well-formed JSON with malformed records is reported as
    /// [`ApniListError::InvalidArgument`] and left in place.
    fn load<T: DeserializeOwned>(&mut self, name: &str) -> Result<T> {
        let path = self.ensure_file(name)?;

        let value = match read_json(&path) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "corrupt catalog file, removing");
                let _ = fs::remove_file(&path);
                return Err(ApniListError::NotFound(format!(
                    "Catalog file '{}' was corrupt and has been removed. \
                     Retry to re-download. Original error: {}",
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("unknown"),
                    e
                )));
            }
        };

        serde_json::from_value(value).map_err(|e| {
            ApniListError::InvalidArgument(format!("Malformed {} record: {}", name, e))
        })
    }
}

/// Parse a JSON file, decompressing `.gz` transparently.
fn read_json(path: &Path) -> Result<serde_json::Value> {
    let contents = if path.extension().and_then(|e| e.to_str()) == Some("gz") {
        let file = fs::File::open(path)?;
        let mut decoder = BufReader::new(GzDecoder::new(BufReader::new(file)));
        let mut contents = String::new();
        decoder.read_to_string(&mut contents)?;
        contents
    } else {
        fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&contents)?)
}
