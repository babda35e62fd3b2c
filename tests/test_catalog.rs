//! Catalog client integration tests against pre-seeded cache directories.

mod common;

use std::io::Write;
use std::time::Duration;

use apnilist_sdk::{ApniListError, CatalogClient, Retailer};
use chrono::Utc;
use common::pid;
use flate2::write::GzEncoder;
use flate2::Compression;

fn offline_client(dir: &std::path::Path) -> CatalogClient {
    CatalogClient::new(
        dir.to_path_buf(),
        "http://127.0.0.1:9/catalog",
        true,
        Duration::from_secs(1),
    )
    .unwrap()
}

fn write_categories(dir: &std::path::Path, value: &serde_json::Value) {
    std::fs::write(dir.join("categories.json"), value.to_string()).unwrap();
}

fn write_products_gz(dir: &std::path::Path, value: &serde_json::Value) {
    let file = std::fs::File::create(dir.join("products.json.gz")).unwrap();
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(value.to_string().as_bytes()).unwrap();
    encoder.finish().unwrap();
}

// ---------------------------------------------------------------------------
// categories
// ---------------------------------------------------------------------------

#[test]
fn loads_cached_categories_offline() {
    let tmp = tempfile::tempdir().unwrap();
    write_categories(tmp.path(), &common::sample_categories_json());

    let mut client = offline_client(tmp.path());
    let categories = client.categories().unwrap();
    let names: Vec<_> = categories.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Electronics", "TVs & Audio", "Kitchen"]);
}

#[test]
fn offline_without_cache_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let mut client = offline_client(tmp.path());

    let err = client.categories().unwrap_err();
    assert!(matches!(err, ApniListError::NotFound(_)));
}

#[test]
fn unknown_file_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let mut client = offline_client(tmp.path());
    assert!(matches!(
        client.ensure_file("brands"),
        Err(ApniListError::NotFound(_))
    ));
}

#[test]
fn category_with_empty_name_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    write_categories(
        tmp.path(),
        &serde_json::json!([{"id": "c1", "name": "  ", "slug": "blank"}]),
    );

    let mut client = offline_client(tmp.path());
    assert!(matches!(
        client.categories(),
        Err(ApniListError::InvalidArgument(_))
    ));
}

#[test]
fn category_missing_field_is_malformed() {
    let tmp = tempfile::tempdir().unwrap();
    write_categories(tmp.path(), &serde_json::json!([{"id": "c1", "name": "TVs"}]));

    let mut client = offline_client(tmp.path());
    let err = client.categories().unwrap_err();
    assert!(matches!(err, ApniListError::InvalidArgument(_)));
    // Well-formed JSON is kept for inspection.
    assert!(tmp.path().join("categories.json").exists());
}

#[test]
fn corrupt_file_is_removed() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("categories.json"), "[{\"id\":").unwrap();

    let mut client = offline_client(tmp.path());
    let err = client.categories().unwrap_err();
    assert!(matches!(err, ApniListError::NotFound(_)));
    assert!(!tmp.path().join("categories.json").exists());
}

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

#[test]
fn loads_gzipped_products() {
    let tmp = tempfile::tempdir().unwrap();
    write_products_gz(tmp.path(), &common::sample_products_json());

    let mut client = offline_client(tmp.path());
    let products = client.products().unwrap();
    assert_eq!(products.len(), 2);

    let chimney = &products[0];
    assert_eq!(chimney.id, pid("elica-60cm-chimney"));
    assert_eq!(chimney.retailer_prices[&Retailer::Amazon], 8999.0);
    assert_eq!(chimney.retailer_prices[&Retailer::Flipkart], 9499.0);
    assert_eq!(
        chimney.purchase_urls[&Retailer::Amazon],
        "https://amazon.in/dp/elica60"
    );
    assert!(products[1].purchase_urls.is_empty());
}

#[test]
fn unknown_retailer_rejects_load() {
    let tmp = tempfile::tempdir().unwrap();
    write_products_gz(
        tmp.path(),
        &serde_json::json!([{"id": "p1", "name": "P", "retailerPrices": {"myntra": 10.0}}]),
    );

    let mut client = offline_client(tmp.path());
    assert!(matches!(
        client.products(),
        Err(ApniListError::InvalidArgument(_))
    ));
}

#[test]
fn negative_catalog_price_rejects_load() {
    let tmp = tempfile::tempdir().unwrap();
    write_products_gz(
        tmp.path(),
        &serde_json::json!([{"id": "p1", "name": "P", "retailerPrices": {"amazon": -10.0}}]),
    );

    let mut client = offline_client(tmp.path());
    assert!(matches!(
        client.products(),
        Err(ApniListError::InvalidPrice(_))
    ));
}

#[test]
fn clear_removes_cached_files() {
    let tmp = tempfile::tempdir().unwrap();
    write_categories(tmp.path(), &common::sample_categories_json());

    let client = offline_client(tmp.path());
    client.clear().unwrap();
    assert!(tmp.path().exists());
    assert!(!tmp.path().join("categories.json").exists());
}

// ---------------------------------------------------------------------------
// Through the SDK
// ---------------------------------------------------------------------------

#[test]
fn sdk_loads_categories_and_ingests_products() {
    let (sdk, tmp) = common::ephemeral_sdk();
    let cache = tmp.path().join("catalog");
    std::fs::create_dir_all(&cache).unwrap();
    write_categories(&cache, &common::sample_categories_json());
    write_products_gz(&cache, &common::sample_products_json());

    assert_eq!(sdk.load_categories().unwrap(), 3);
    assert_eq!(sdk.suggestions("tv", None)[0].name, "TVs & Audio");

    let now = Utc::now();
    assert_eq!(sdk.ingest_catalog(now).unwrap(), 3);
    let chimney = pid("elica-60cm-chimney");
    assert_eq!(sdk.latest(&chimney, Retailer::Flipkart).unwrap().price, 9499.0);
    assert_eq!(sdk.current_prices(&pid("boat-airdopes-141")).len(), 1);
}
