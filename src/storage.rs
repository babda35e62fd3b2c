//! DuckDB-backed durable storage for remote wishlists and the price archive.
//!
//! A single DuckDB connection is shared behind a mutex; every statement is
//! auto-committed, so a call that returns `Ok` has been durably written.
//! Timestamps are stored as nanoseconds since the epoch so a restored point
//! orders exactly as it did in memory.

use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use duckdb::{params, Connection as DuckDbConnection};
use parking_lot::Mutex;

use crate::error::{ApniListError, Result};
use crate::models::{PricePoint, ProductId, Retailer, Scope, UserId, WishlistEntry};
use crate::wishlist::RemoteBackend;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS wishlist (
        user_id VARCHAR NOT NULL,
        product_id VARCHAR NOT NULL,
        added_at_ns BIGINT NOT NULL,
        PRIMARY KEY (user_id, product_id)
    );
    CREATE SEQUENCE IF NOT EXISTS price_points_seq;
    CREATE TABLE IF NOT EXISTS price_points (
        seq BIGINT NOT NULL DEFAULT nextval('price_points_seq'),
        product_id VARCHAR NOT NULL,
        retailer VARCHAR NOT NULL,
        price DOUBLE NOT NULL,
        observed_at_ns BIGINT NOT NULL
    );
";

/// Append-only persistence for recorded prices.
pub trait PriceArchive: Send + Sync {
    fn append(&self, point: &PricePoint) -> Result<()>;

    /// Every archived point, in the order it was appended.
    fn load_all(&self) -> Result<Vec<PricePoint>>;
}

pub struct DuckDbStore {
    conn: Mutex<DuckDbConnection>,
}

impl DuckDbStore {
    /// Open (or create) a database file and ensure the schema exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = DuckDbConnection::open(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), "opened DuckDB store");
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::with_connection(DuckDbConnection::open_in_memory()?)
    }

    fn with_connection(conn: DuckDbConnection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Number of archived price points.
    pub fn price_point_count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM price_points", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

impl RemoteBackend for DuckDbStore {
    fn add(&self, user: &UserId, entry: &WishlistEntry) -> Result<bool> {
        let conn = self.conn.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO wishlist (user_id, product_id, added_at_ns) VALUES (?, ?, ?)",
            params![
                user.as_str(),
                entry.product_id.as_str(),
                to_nanos(entry.added_at)?
            ],
        )?;
        Ok(inserted > 0)
    }

    fn remove(&self, user: &UserId, product_id: &ProductId) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM wishlist WHERE user_id = ? AND product_id = ?",
            params![user.as_str(), product_id.as_str()],
        )?;
        Ok(())
    }

    fn contains(&self, user: &UserId, product_id: &ProductId) -> Result<bool> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM wishlist WHERE user_id = ? AND product_id = ?",
            params![user.as_str(), product_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn list(&self, user: &UserId) -> Result<Vec<WishlistEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT product_id, added_at_ns FROM wishlist WHERE user_id = ? ORDER BY product_id",
        )?;
        let rows = stmt.query_map(params![user.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (product_id, added_at_ns) = row?;
            entries.push(WishlistEntry {
                product_id: ProductId::new(product_id)?,
                added_at: Utc.timestamp_nanos(added_at_ns),
                scope: Scope::Remote,
            });
        }
        Ok(entries)
    }
}

impl PriceArchive for DuckDbStore {
    fn append(&self, point: &PricePoint) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO price_points (product_id, retailer, price, observed_at_ns) VALUES (?, ?, ?, ?)",
            params![
                point.product_id.as_str(),
                point.retailer.as_str(),
                point.price,
                to_nanos(point.observed_at)?
            ],
        )?;
        Ok(())
    }

    fn load_all(&self) -> Result<Vec<PricePoint>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT product_id, retailer, price, observed_at_ns FROM price_points ORDER BY seq",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (product_id, retailer, price, observed_at_ns) = row?;
            points.push(PricePoint::new(
                ProductId::new(product_id)?,
                retailer.parse::<Retailer>()?,
                price,
                Utc.timestamp_nanos(observed_at_ns),
            )?);
        }
        Ok(points)
    }
}

/// Nanoseconds since the epoch; representable for years 1677 through 2262.
fn to_nanos(at: DateTime<Utc>) -> Result<i64> {
    at.timestamp_nanos_opt()
        .ok_or_else(|| ApniListError::InvalidArgument(format!("timestamp out of range: {}", at)))
}
