#![allow(dead_code)]

use auction_integrity::auction::model::{Auction, NewAuction, Tick};
use auction_integrity::config::EngineConfig;
use auction_integrity::error::{Violation, WriteError};
use auction_integrity::gateway::WriteGateway;

/// Tracing for test output; safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .without_time()
        .with_target(false)
        .with_test_writer()
        .try_init();
}

pub fn gateway() -> WriteGateway {
    init_tracing();
    WriteGateway::in_memory(EngineConfig::default())
}

pub fn gateway_with(config: EngineConfig) -> WriteGateway {
    init_tracing();
    WriteGateway::in_memory(config)
}

pub async fn create_auction(
    gateway: &WriteGateway,
    seller: &str,
    start: Tick,
    end: Tick,
    first_bid: i64,
) -> Auction {
    gateway
        .create_auction(NewAuction::new(seller, start, end, first_bid))
        .await
        .expect("auction creation")
}

pub fn violation_of<T: std::fmt::Debug>(result: Result<T, WriteError>) -> Violation {
    match result {
        Err(WriteError::Violation(violation)) => violation,
        other => panic!("expected a violation, got {other:?}"),
    }
}
