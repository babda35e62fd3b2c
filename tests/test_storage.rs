//! DuckDB store integration tests: remote wishlist rows and the price archive.

mod common;

use std::sync::Arc;

use apnilist_sdk::{
    ApniList, DuckDbStore, IdentityEvent, PriceArchive, PricePoint, RemoteBackend, Retailer,
    Scope, WishlistEntry,
};
use chrono::{Duration, Utc};
use common::{day, pid, uid};

fn entry(id: &str) -> WishlistEntry {
    WishlistEntry {
        product_id: pid(id),
        added_at: day(1),
        scope: Scope::Remote,
    }
}

// ---------------------------------------------------------------------------
// RemoteBackend
// ---------------------------------------------------------------------------

#[test]
fn add_is_insert_or_ignore() {
    let store = DuckDbStore::open_in_memory().unwrap();
    let alice = uid("alice");

    assert!(store.add(&alice, &entry("p1")).unwrap());
    let mut later = entry("p1");
    later.added_at = day(9);
    assert!(!store.add(&alice, &later).unwrap());

    let entries = store.list(&alice).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].added_at, day(1));
    assert_eq!(entries[0].scope, Scope::Remote);
}

#[test]
fn rows_are_scoped_by_user() {
    let store = DuckDbStore::open_in_memory().unwrap();

    store.add(&uid("alice"), &entry("p1")).unwrap();
    store.add(&uid("bob"), &entry("p2")).unwrap();

    assert!(store.contains(&uid("alice"), &pid("p1")).unwrap());
    assert!(!store.contains(&uid("alice"), &pid("p2")).unwrap());
    assert_eq!(store.list(&uid("bob")).unwrap()[0].product_id, pid("p2"));
}

#[test]
fn remove_is_idempotent() {
    let store = DuckDbStore::open_in_memory().unwrap();
    let alice = uid("alice");

    store.add(&alice, &entry("p1")).unwrap();
    store.remove(&alice, &pid("p1")).unwrap();
    store.remove(&alice, &pid("p1")).unwrap();
    assert!(store.list(&alice).unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// PriceArchive
// ---------------------------------------------------------------------------

#[test]
fn archive_preserves_insertion_order() {
    let store = DuckDbStore::open_in_memory().unwrap();
    for (d, price) in [(5, 100.0), (2, 90.0), (7, 95.0)] {
        let point = PricePoint::new(pid("p1"), Retailer::Amazon, price, day(d)).unwrap();
        store.append(&point).unwrap();
    }

    let points = store.load_all().unwrap();
    assert_eq!(store.price_point_count().unwrap(), 3);
    assert_eq!(
        points.iter().map(|p| p.price).collect::<Vec<_>>(),
        vec![100.0, 90.0, 95.0]
    );
    assert_eq!(points[1].observed_at, day(2));
}

// ---------------------------------------------------------------------------
// Through the SDK
// ---------------------------------------------------------------------------

#[test]
fn sdk_restores_history_and_wishlists_from_data_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let chimney = pid("elica-60cm-chimney");

    {
        let sdk = ApniList::builder()
            .data_dir(tmp.path())
            .offline(true)
            .build()
            .unwrap();
        sdk.record_price(&chimney, Retailer::Amazon, 7999.0, day(1)).unwrap();
        sdk.record_price(&chimney, Retailer::Amazon, 8999.0, day(10)).unwrap();
        sdk.wishlist_add(&chimney).unwrap();
        sdk.handle_identity(IdentityEvent::SignedIn(uid("alice"))).unwrap();
    }

    let sdk = ApniList::builder()
        .data_dir(tmp.path())
        .offline(true)
        .build()
        .unwrap();
    assert_eq!(sdk.lowest_ever(&chimney, Retailer::Amazon).unwrap().price, 7999.0);
    assert_eq!(sdk.latest(&chimney, Retailer::Amazon).unwrap().price, 8999.0);

    // The local entry was migrated before the restart.
    assert!(sdk.local_wishlist().is_empty());
    sdk.handle_identity(IdentityEvent::SignedIn(uid("alice"))).unwrap();
    assert!(sdk.wishlist_contains(&chimney).unwrap());
}

#[test]
fn restart_keeps_sub_millisecond_ordering() {
    let tmp = tempfile::tempdir().unwrap();
    let p = pid("p1");
    let early = day(1) + Duration::microseconds(200);
    let late = day(1) + Duration::microseconds(500);

    let before = {
        let sdk = ApniList::builder()
            .data_dir(tmp.path())
            .offline(true)
            .build()
            .unwrap();
        sdk.record_price(&p, Retailer::Amazon, 10.0, late).unwrap();
        // Arrives after the 10.0 point but was observed earlier.
        sdk.record_price(&p, Retailer::Amazon, 20.0, early).unwrap();
        sdk.latest(&p, Retailer::Amazon).unwrap()
    };
    assert_eq!(before.price, 10.0);

    let sdk = ApniList::builder()
        .data_dir(tmp.path())
        .offline(true)
        .build()
        .unwrap();
    assert_eq!(sdk.latest(&p, Retailer::Amazon).unwrap(), before);
    assert_eq!(
        sdk.history(&p, Retailer::Amazon, None, None)
            .iter()
            .map(|p| p.observed_at)
            .collect::<Vec<_>>(),
        vec![early, late]
    );
    let lowest = sdk.lowest_ever(&p, Retailer::Amazon).unwrap();
    assert_eq!((lowest.price, lowest.observed_at), (10.0, late));
}

#[test]
fn wishlist_added_at_survives_round_trip() {
    let store = DuckDbStore::open_in_memory().unwrap();
    let mut precise = entry("p1");
    precise.added_at = day(1) + Duration::nanoseconds(123_456_789);

    store.add(&uid("alice"), &precise).unwrap();
    assert_eq!(store.list(&uid("alice")).unwrap()[0].added_at, precise.added_at);
}

#[test]
fn custom_archive_receives_recorded_prices() {
    let store = Arc::new(DuckDbStore::open_in_memory().unwrap());
    let tmp = tempfile::tempdir().unwrap();
    let sdk = ApniList::builder()
        .data_dir(tmp.path())
        .ephemeral(true)
        .price_archive(store.clone())
        .build()
        .unwrap();

    sdk.record_price(&pid("p1"), Retailer::Flipkart, 499.0, Utc::now()).unwrap();
    assert!(sdk.record_price(&pid("p1"), Retailer::Flipkart, -1.0, Utc::now()).is_err());
    assert_eq!(store.price_point_count().unwrap(), 1);
}
