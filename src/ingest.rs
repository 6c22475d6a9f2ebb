//! Bulk seeding from the ingestion pipeline.
//! Rows arrive already flattened and keyed; every row still goes through the
//! write gateway, so seeded data obeys the same invariants as live writes.
// region:    --- Imports
use crate::auction::model::{NewAuction, Tick, User};
use crate::error::{StoreError, Violation, WriteError};
use crate::gateway::WriteGateway;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Seed Model
/// Historical bid. `time` is where the clock is moved before placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedBid {
    pub auction_id: i64,
    pub user_id: String,
    pub time: Tick,
    pub amount: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedBatch {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub auctions: Vec<NewAuction>,
    #[serde(default)]
    pub bids: Vec<SeedBid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedRejection {
    pub entity: &'static str,
    pub key: String,
    pub code: &'static str,
    pub reason: String,
}

impl SeedRejection {
    fn new(entity: &'static str, key: String, violation: &Violation) -> Self {
        Self {
            entity,
            key,
            code: violation.code(),
            reason: violation.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub users_loaded: usize,
    pub auctions_loaded: usize,
    pub bids_loaded: usize,
    pub rejected: Vec<SeedRejection>,
}
// endregion: --- Seed Model

// region:    --- Load Batch
/// Loads users, then auctions, then bids in time order. Violations are
/// collected per row; a store failure aborts the load.
pub async fn load_batch(
    gateway: &WriteGateway,
    batch: SeedBatch,
) -> Result<SeedReport, StoreError> {
    info!(
        "{:<12} --> seeding {} users, {} auctions, {} bids",
        "Ingest",
        batch.users.len(),
        batch.auctions.len(),
        batch.bids.len()
    );
    let mut report = SeedReport::default();

    for user in batch.users {
        let key = user.id.clone();
        match gateway.register_user(user).await {
            Ok(registration) if registration.created => report.users_loaded += 1,
            Ok(_) => {}
            Err(e) => record(&mut report, "user", key, e)?,
        }
    }

    for auction in batch.auctions {
        let key = auction
            .id
            .map(|id| id.to_string())
            .unwrap_or_else(|| auction.seller_id.clone());
        match gateway.create_auction(auction).await {
            Ok(_) => report.auctions_loaded += 1,
            Err(e) => record(&mut report, "auction", key, e)?,
        }
    }

    let mut bids = batch.bids;
    bids.sort_by_key(|bid| bid.time);
    for bid in bids {
        let key = format!("{}/{}/{}", bid.auction_id, bid.user_id, bid.time);
        if gateway.now().await? != bid.time {
            if let Err(e) = gateway.advance_clock(bid.time).await {
                record(&mut report, "bid", key, e)?;
                continue;
            }
        }
        match gateway.place_bid(bid.auction_id, &bid.user_id, bid.amount).await {
            Ok(_) => report.bids_loaded += 1,
            Err(e) => record(&mut report, "bid", key, e)?,
        }
    }

    info!(
        "{:<12} --> seeded {} users, {} auctions, {} bids, {} rejected",
        "Ingest",
        report.users_loaded,
        report.auctions_loaded,
        report.bids_loaded,
        report.rejected.len()
    );
    Ok(report)
}

fn record(
    report: &mut SeedReport,
    entity: &'static str,
    key: String,
    error: WriteError,
) -> Result<(), StoreError> {
    match error {
        WriteError::Violation(violation) => {
            warn!("{:<12} --> {} {} rejected: {}", "Ingest", entity, key, violation);
            report
                .rejected
                .push(SeedRejection::new(entity, key, &violation));
            Ok(())
        }
        WriteError::Store(e) => Err(e),
    }
}
// endregion: --- Load Batch
