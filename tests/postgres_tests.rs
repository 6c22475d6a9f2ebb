//! Postgres-backed gateway tests.
//!
//! Ignored by default because they need a reachable database that may be
//! reset freely.
//!
//! Run:
//!   DATABASE_URL=postgres://... cargo test --test postgres_tests -- --ignored --test-threads=1

mod common;

use auction_integrity::auction::model::NewAuction;
use auction_integrity::config::EngineConfig;
use auction_integrity::database::DatabaseManager;
use auction_integrity::error::{StoreError, WriteError};
use auction_integrity::gateway::WriteGateway;
use common::violation_of;
use std::sync::Arc;

/// Fresh schema with the clock at zero
async fn setup() -> Arc<WriteGateway> {
    common::init_tracing();
    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_manager = Arc::new(
        DatabaseManager::connect(&database_url, 5)
            .await
            .expect("Failed to create pool"),
    );
    db_manager
        .initialize_database(true, 0)
        .await
        .expect("schema initialization");
    Arc::new(WriteGateway::postgres(db_manager, EngineConfig::default()))
}

#[tokio::test]
#[ignore]
async fn test_postgres_bid_rules() {
    let gateway = setup().await;
    let auction = gateway
        .create_auction(NewAuction::new("seller", 100, 200, 10).with_id(42))
        .await
        .unwrap();
    assert_eq!(auction.id, 42);

    let violation = violation_of(gateway.place_bid(42, "alice", 10).await);
    assert_eq!(violation.code(), "BID_OUTSIDE_WINDOW");

    gateway.advance_clock(150).await.unwrap();
    assert_eq!(
        violation_of(gateway.place_bid(42, "alice", 9).await).code(),
        "BID_TOO_LOW"
    );
    assert_eq!(
        violation_of(gateway.place_bid(42, "seller", 11).await).code(),
        "SELLER_BID_CONFLICT"
    );
    gateway.place_bid(42, "alice", 10).await.unwrap();
    assert_eq!(
        violation_of(gateway.place_bid(42, "bob", 10).await).code(),
        "BID_TOO_LOW"
    );
    gateway.place_bid(42, "bob", 15).await.unwrap();

    let view = gateway.auction(42).await.unwrap().unwrap();
    assert_eq!(view.auction.highest_bid, Some(15));
    assert_eq!(view.auction.number_of_bids, 2);
    assert!(gateway.audit_auction(42).await.unwrap().unwrap().consistent);

    // Generated ids continue past feed-supplied ones.
    let next = gateway
        .create_auction(NewAuction::new("seller", 0, 10, 1))
        .await
        .unwrap();
    assert!(next.id > 42);
}

#[tokio::test]
#[ignore]
async fn test_postgres_clock_and_duplicates() {
    let gateway = setup().await;
    gateway.advance_clock(300).await.unwrap();
    assert_eq!(
        violation_of(gateway.advance_clock(300).await).code(),
        "NON_MONOTONIC_TIME"
    );
    assert_eq!(
        violation_of(gateway.advance_clock(299).await).code(),
        "NON_MONOTONIC_TIME"
    );
    assert_eq!(gateway.now().await.unwrap(), 300);
    gateway.advance_clock(301).await.unwrap();

    gateway
        .create_auction(NewAuction::new("seller", 0, 1000, 1).with_id(7))
        .await
        .unwrap();
    assert_eq!(
        violation_of(
            gateway
                .create_auction(NewAuction::new("seller", 0, 1000, 1).with_id(7))
                .await
        )
        .code(),
        "DUPLICATE_IDENTIFIER"
    );

    gateway.place_bid(7, "alice", 5).await.unwrap();
    assert_eq!(
        violation_of(gateway.place_bid(7, "alice", 6).await).code(),
        "DUPLICATE_IDENTIFIER"
    );
    assert_eq!(gateway.bids(7).await.unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_postgres_concurrent_bidding() {
    let gateway = setup().await;
    gateway
        .create_auction(NewAuction::new("seller", 0, 1000, 10).with_id(1))
        .await
        .unwrap();

    let mut handles = vec![];
    for i in 0..30_i64 {
        let gateway = Arc::clone(&gateway);
        handles.push(tokio::spawn(async move {
            gateway.place_bid(1, &format!("bidder{i}"), 10 + i).await
        }));
    }
    for handle in handles {
        if let Err(e) = handle.await.unwrap() {
            assert_eq!(e.code(), "BID_TOO_LOW");
        }
    }

    let audit = gateway.audit_auction(1).await.unwrap().unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.stored.highest_bid, Some(39));
}

#[tokio::test]
#[ignore]
async fn test_postgres_largest_auction_id() {
    let gateway = setup().await;
    let auction = gateway
        .create_auction(NewAuction::new("seller", 0, 10, 1).with_id(i64::MAX))
        .await
        .unwrap();
    assert_eq!(auction.id, i64::MAX);

    let result = gateway
        .create_auction(NewAuction::new("seller", 0, 10, 1))
        .await;
    assert!(matches!(
        result,
        Err(WriteError::Store(StoreError::IdsExhausted))
    ));
}
