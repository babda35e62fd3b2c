use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use super::WishlistStore;
use crate::error::Result;
use crate::models::{ProductId, Scope, WishlistEntry};

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    product_id: ProductId,
    added_at: DateTime<Utc>,
}

/// On-disk layouts accepted when loading. Older clients persisted a bare
/// array of product ids, newest first.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredWishlist {
    Entries(Vec<StoredEntry>),
    Ids(Vec<ProductId>),
}

/// Anonymous, device-local wishlist.
///
/// Backed by a JSON file that is rewritten atomically on every mutation, or
/// held purely in memory when created with [`LocalWishlist::in_memory`].
pub struct LocalWishlist {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<ProductId, WishlistEntry>>,
}

impl LocalWishlist {
    /// Open (or lazily create) the wishlist stored at `path`.
    ///
    /// A file that cannot be parsed is removed and the wishlist starts empty,
    /// so a corrupt write never locks the user out of the feature.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = if path.exists() {
            let contents = fs::read(&path)?;
            match serde_json::from_slice::<StoredWishlist>(&contents) {
                Ok(stored) => into_entries(stored),
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupt local wishlist, removing"
                    );
                    fs::remove_file(&path)?;
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        tracing::debug!(path = %path.display(), entries = entries.len(), "opened local wishlist");
        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// All entries, ordered by product id.
    pub fn entries(&self) -> Vec<WishlistEntry> {
        self.entries.lock().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Remove several products in one durable write.
    pub fn remove_many<'a, I>(&self, ids: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a ProductId>,
    {
        self.mutate(|entries| {
            for id in ids {
                entries.remove(id);
            }
        })
    }

    pub fn clear(&self) -> Result<()> {
        self.mutate(|entries| entries.clear())
    }

    /// Apply `f` to a copy of the entries, persist it, then publish it.
    ///
    /// The in-memory state only changes once the file write succeeded.
    fn mutate(&self, f: impl FnOnce(&mut BTreeMap<ProductId, WishlistEntry>)) -> Result<()> {
        let mut guard = self.entries.lock();
        let mut next = guard.clone();
        f(&mut next);
        if next == *guard {
            return Ok(());
        }
        if let Some(path) = &self.path {
            write_atomically(path, &next)?;
        }
        *guard = next;
        Ok(())
    }
}

impl WishlistStore for LocalWishlist {
    fn scope(&self) -> Scope {
        Scope::Local
    }

    fn add(&self, product_id: &ProductId) -> Result<()> {
        self.mutate(|entries| {
            entries
                .entry(product_id.clone())
                .or_insert_with(|| WishlistEntry {
                    product_id: product_id.clone(),
                    added_at: Utc::now(),
                    scope: Scope::Local,
                });
        })
    }

    fn remove(&self, product_id: &ProductId) -> Result<()> {
        self.mutate(|entries| {
            entries.remove(product_id);
        })
    }

    fn contains(&self, product_id: &ProductId) -> Result<bool> {
        Ok(self.entries.lock().contains_key(product_id))
    }

    fn list(&self) -> Result<BTreeSet<ProductId>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }
}

fn into_entries(stored: StoredWishlist) -> BTreeMap<ProductId, WishlistEntry> {
    match stored {
        StoredWishlist::Entries(entries) => entries
            .into_iter()
            .map(|e| {
                let entry = WishlistEntry {
                    product_id: e.product_id.clone(),
                    added_at: e.added_at,
                    scope: Scope::Local,
                };
                (e.product_id, entry)
            })
            .collect(),
        StoredWishlist::Ids(ids) => {
            let now = Utc::now();
            ids.into_iter()
                .map(|id| {
                    let entry = WishlistEntry {
                        product_id: id.clone(),
                        added_at: now,
                        scope: Scope::Local,
                    };
                    (id, entry)
                })
                .collect()
        }
    }
}

/// Write to a temp file in the same directory, then rename over `path`, so an
/// interrupted write never leaves a truncated wishlist behind.
fn write_atomically(path: &Path, entries: &BTreeMap<ProductId, WishlistEntry>) -> Result<()> {
    let stored: Vec<StoredEntry> = entries
        .values()
        .map(|e| StoredEntry {
            product_id: e.product_id.clone(),
            added_at: e.added_at,
        })
        .collect();
    let json = serde_json::to_vec_pretty(&stored)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&json)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
