mod common;

use auction_integrity::handlers;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serve the router on an ephemeral port and return its base url
async fn spawn_server() -> String {
    let gateway = Arc::new(common::gateway());
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener address");
    tokio::spawn(async move {
        axum::serve(listener, handlers::routes(gateway).into_make_service())
            .await
            .expect("test server");
    });
    format!("http://{addr}")
}

/// Bid flow over HTTP, including rejection codes
#[tokio::test]
async fn test_bid_flow_over_http() {
    let base = spawn_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/clock"))
        .json(&json!({"now": 10}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::OK);

    let response = client
        .post(format!("{base}/auctions"))
        .json(&json!({
            "name": "Vintage radio",
            "seller_id": "seller",
            "start": 0,
            "end": 100,
            "first_bid": 10,
            "categories": ["Electronics", "Collectibles"]
        }))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::CREATED);
    let auction: Value = response.json().await.unwrap();
    let auction_id = auction["id"].as_i64().unwrap();

    let response = client
        .post(format!("{base}/bid"))
        .json(&json!({"auction_id": auction_id, "user_id": "alice", "amount": 9}))
        .send()
        .await
        .expect("Failed to send request");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "BID_TOO_LOW");

    let response = client
        .post(format!("{base}/bid"))
        .json(&json!({"auction_id": auction_id, "user_id": "seller", "amount": 20}))
        .send()
        .await
        .expect("Failed to send request");
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "SELLER_BID_CONFLICT");

    let response = client
        .post(format!("{base}/bid"))
        .json(&json!({"auction_id": auction_id, "user_id": "alice", "amount": 10}))
        .send()
        .await
        .expect("Failed to send request");
    assert!(response.status().is_success());
    let bid: Value = response.json().await.unwrap();
    assert_eq!(bid["time"], 10);

    let highest: Value = client
        .get(format!("{base}/auction/{auction_id}/highest-bid"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(highest, json!(10));

    let state: Value = client
        .get(format!("{base}/auction/{auction_id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(state["status"], "OPEN");
    assert_eq!(state["number_of_bids"], 1);
    assert_eq!(state["categories"], json!(["Collectibles", "Electronics"]));

    let history: Value = client
        .get(format!("{base}/auction/{auction_id}/bids"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(history.as_array().unwrap().len(), 1);

    let audit: Value = client
        .get(format!("{base}/auction/{auction_id}/audit"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(audit["consistent"], true);
}

/// Bodies that fail to parse get the same JSON error shape as write errors
#[tokio::test]
async fn test_malformed_bodies() {
    let base = spawn_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/bid"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"auction_id\": 1,")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST_BODY");
    assert!(body["error"].is_string());

    let response = client
        .post(format!("{base}/clock"))
        .json(&json!({"now": "later"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST_BODY");

    let response = client
        .post(format!("{base}/seed"))
        .body("not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_REQUEST_BODY");
}

/// Status codes for unknown references, duplicates and clock rewinds
#[tokio::test]
async fn test_error_status_codes() {
    let base = spawn_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/bid"))
        .json(&json!({"auction_id": 999, "user_id": "alice", "amount": 10}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let user = json!({"user_id": "mrwonderful", "rating": 50, "country": "USA"});
    let response = client
        .post(format!("{base}/users"))
        .json(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let response = client
        .post(format!("{base}/users"))
        .json(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let response = client
        .post(format!("{base}/users"))
        .json(&json!({"user_id": "mrwonderful", "rating": 51}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = client
        .post(format!("{base}/auctions"))
        .json(&json!({"seller_id": "mrwonderful", "start": 5, "end": 5, "first_bid": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_AUCTION_WINDOW");

    let response = client
        .post(format!("{base}/clock"))
        .json(&json!({"now": 0}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "NON_MONOTONIC_TIME");

    let clock: Value = client
        .get(format!("{base}/clock"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(clock["now"], 0);

    let response = client
        .get(format!("{base}/auction/12345"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// Seeding over HTTP reports loaded and rejected rows
#[tokio::test]
async fn test_seed_endpoint() {
    let base = spawn_server().await;
    let client = Client::new();

    let response = client
        .post(format!("{base}/seed"))
        .json(&json!({
            "users": [{"id": "seller", "rating": 10, "country": "USA"}],
            "auctions": [{"id": 7, "seller_id": "seller", "start": 0, "end": 50, "first_bid": 5}],
            "bids": [
                {"auction_id": 7, "user_id": "bidder", "time": 20, "amount": 6},
                {"auction_id": 7, "user_id": "seller", "time": 30, "amount": 9}
            ]
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let report: Value = response.json().await.unwrap();
    assert_eq!(report["users_loaded"], 1);
    assert_eq!(report["auctions_loaded"], 1);
    assert_eq!(report["bids_loaded"], 1);
    assert_eq!(report["rejected"][0]["code"], "SELLER_BID_CONFLICT");

    let auctions: Value = client
        .get(format!("{base}/auctions"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(auctions[0]["highest_bid"], 6);
    assert_eq!(auctions[0]["status"], "OPEN");
}
