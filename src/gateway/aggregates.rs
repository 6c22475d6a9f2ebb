//! Derived auction fields.
//! `highest_bid` and `number_of_bids` are only ever written here, inside the
//! same transaction as the bid that changes them.
// region:    --- Imports
use crate::auction::model::{Auction, Bid};
use crate::error::StoreError;
use crate::store::StoreTx;
use serde::Serialize;
// endregion: --- Imports

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AuctionAggregates {
    pub highest_bid: Option<i64>,
    pub number_of_bids: i64,
}

impl AuctionAggregates {
    pub fn of(auction: &Auction) -> Self {
        Self {
            highest_bid: auction.highest_bid,
            number_of_bids: auction.number_of_bids,
        }
    }

    /// Aggregates after `bid` is accepted on top of `self`.
    pub fn after(self, bid: &Bid) -> Self {
        Self {
            highest_bid: Some(bid.amount),
            number_of_bids: self.number_of_bids + 1,
        }
    }

    /// Rebuilds the aggregates from the full bid history.
    pub fn recompute(bids: &[Bid]) -> Self {
        Self {
            highest_bid: bids.iter().map(|bid| bid.amount).max(),
            number_of_bids: bids.len() as i64,
        }
    }
}

/// Result of comparing stored aggregates against a recomputation.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateAudit {
    pub auction_id: i64,
    pub stored: AuctionAggregates,
    pub recomputed: AuctionAggregates,
    pub consistent: bool,
}

impl AggregateAudit {
    pub fn new(auction: &Auction, bids: &[Bid]) -> Self {
        let stored = AuctionAggregates::of(auction);
        let recomputed = AuctionAggregates::recompute(bids);
        Self {
            auction_id: auction.id,
            stored,
            recomputed,
            consistent: stored == recomputed,
        }
    }
}

/// Writes the post-bid aggregates through the open transaction and returns the
/// auction as it will read after commit.
pub(crate) async fn apply_accepted_bid(
    tx: &mut dyn StoreTx,
    auction: &Auction,
    bid: &Bid,
) -> Result<Auction, StoreError> {
    let next = AuctionAggregates::of(auction).after(bid);
    tx.update_auction_aggregates(auction.id, next.highest_bid, next.number_of_bids)
        .await?;

    let mut updated = auction.clone();
    updated.highest_bid = next.highest_bid;
    updated.number_of_bids = next.number_of_bids;
    Ok(updated)
}
