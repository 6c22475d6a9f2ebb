mod common;

use auction_integrity::auction::model::{NewAuction, User};
use auction_integrity::ingest::{load_batch, SeedBatch, SeedBid};

fn seed_bid(auction_id: i64, user_id: &str, time: i64, amount: i64) -> SeedBid {
    SeedBid {
        auction_id,
        user_id: user_id.to_string(),
        time,
        amount,
    }
}

/// Historical bids replay in time order through the gateway
#[tokio::test]
async fn test_load_batch_replays_bids_in_time_order() {
    let gateway = common::gateway();
    let batch = SeedBatch {
        users: vec![
            User {
                id: "seller".to_string(),
                rating: 300,
                location: Some("Dallas, TX".to_string()),
                country: Some("USA".to_string()),
            },
            User::placeholder("early"),
        ],
        auctions: vec![NewAuction::new("seller", 100, 200, 10).with_id(1)],
        bids: vec![
            seed_bid(1, "late", 180, 30),
            seed_bid(1, "early", 120, 10),
            seed_bid(1, "middle", 150, 20),
        ],
    };

    let report = load_batch(&gateway, batch).await.unwrap();
    assert_eq!(report.users_loaded, 2);
    assert_eq!(report.auctions_loaded, 1);
    assert_eq!(report.bids_loaded, 3);
    assert!(report.rejected.is_empty());

    let bids = gateway.bids(1).await.unwrap();
    let times: Vec<_> = bids.iter().map(|bid| bid.time).collect();
    assert_eq!(times, vec![120, 150, 180]);
    assert_eq!(gateway.now().await.unwrap(), 180);
    // Bidders first seen through bids were registered on the way.
    assert!(gateway.user("late").await.unwrap().is_some());
}

/// Rows breaking an invariant are reported, the rest still load
#[tokio::test]
async fn test_load_batch_reports_rejections() {
    let gateway = common::gateway();
    let batch = SeedBatch {
        users: vec![
            User::placeholder("dup"),
            User {
                rating: 9,
                ..User::placeholder("dup")
            },
        ],
        auctions: vec![
            NewAuction::new("seller", 10, 20, 5).with_id(3),
            NewAuction::new("seller", 30, 20, 5).with_id(4),
            NewAuction::new("seller", 10, 40, 5).with_id(3),
        ],
        bids: vec![
            seed_bid(3, "a", 15, 5),
            seed_bid(3, "b", 16, 5),
            seed_bid(3, "seller", 17, 8),
            seed_bid(3, "c", 25, 9),
            seed_bid(99, "d", 26, 9),
        ],
    };

    let report = load_batch(&gateway, batch).await.unwrap();
    assert_eq!(report.users_loaded, 1);
    assert_eq!(report.auctions_loaded, 1);
    assert_eq!(report.bids_loaded, 1);

    let codes: Vec<_> = report
        .rejected
        .iter()
        .map(|rejection| (rejection.entity, rejection.code))
        .collect();
    assert_eq!(
        codes,
        vec![
            ("user", "DUPLICATE_IDENTIFIER"),
            ("auction", "INVALID_AUCTION_WINDOW"),
            ("auction", "DUPLICATE_IDENTIFIER"),
            ("bid", "BID_TOO_LOW"),
            ("bid", "SELLER_BID_CONFLICT"),
            ("bid", "BID_OUTSIDE_WINDOW"),
            ("bid", "UNKNOWN_REFERENCE"),
        ]
    );

    let audit = gateway.audit_auction(3).await.unwrap().unwrap();
    assert!(audit.consistent);
    assert_eq!(audit.stored.highest_bid, Some(5));
}

/// A bid older than the clock cannot be replayed
#[tokio::test]
async fn test_load_batch_rejects_stale_bid_times() {
    let gateway = common::gateway();
    gateway.advance_clock(500).await.unwrap();
    let batch = SeedBatch {
        auctions: vec![NewAuction::new("seller", 0, 1000, 1).with_id(1)],
        bids: vec![seed_bid(1, "bidder", 400, 2), seed_bid(1, "bidder", 500, 3)],
        ..SeedBatch::default()
    };

    let report = load_batch(&gateway, batch).await.unwrap();
    assert_eq!(report.bids_loaded, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].code, "NON_MONOTONIC_TIME");
    assert_eq!(report.rejected[0].key, "1/bidder/400");
}
