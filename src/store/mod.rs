//! Entity store seam.
//! Reads are available to anyone holding the gateway; every mutation lives on
//! `StoreTx`, which only the write gateway can open.
// region:    --- Imports
use crate::auction::model::{Auction, Bid, NewAuction, Tick, User};
use crate::error::StoreError;
use async_trait::async_trait;
// endregion: --- Imports

// region:    --- Modules
pub(crate) mod memory;
pub(crate) mod postgres;
// endregion: --- Modules

// region:    --- Store Traits
#[async_trait]
pub(crate) trait EntityStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn find_auction(&self, auction_id: i64) -> Result<Option<Auction>, StoreError>;
    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError>;
    /// Bids of one auction ordered by `(time, seq)`.
    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError>;
    async fn clock_now(&self) -> Result<Tick, StoreError>;
}

/// One atomic unit of work. Dropping an unfinished transaction rolls it back.
#[async_trait]
pub(crate) trait StoreTx: Send {
    async fn find_user(&mut self, user_id: &str) -> Result<Option<User>, StoreError>;
    async fn auction_exists(&mut self, auction_id: i64) -> Result<bool, StoreError>;
    /// Reads the auction and holds its row lock until commit or rollback.
    async fn lock_auction(&mut self, auction_id: i64) -> Result<Option<Auction>, StoreError>;
    async fn bid_key_taken(
        &mut self,
        auction_id: i64,
        user_id: &str,
        time: Tick,
    ) -> Result<bool, StoreError>;
    async fn read_clock(&mut self) -> Result<Tick, StoreError>;

    /// Returns false when the identifier is already taken.
    async fn insert_user(&mut self, user: &User) -> Result<bool, StoreError>;
    /// Returns None when an explicit auction id is already taken.
    async fn insert_auction(&mut self, auction: &NewAuction) -> Result<Option<Auction>, StoreError>;
    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), StoreError>;
    /// Requires the auction to be locked by this transaction.
    async fn update_auction_aggregates(
        &mut self,
        auction_id: i64,
        highest_bid: Option<i64>,
        number_of_bids: i64,
    ) -> Result<(), StoreError>;
    /// Returns false when `expected` is no longer the current reading.
    async fn compare_and_set_clock(
        &mut self,
        expected: Tick,
        requested: Tick,
    ) -> Result<bool, StoreError>;

    async fn commit(&mut self) -> Result<(), StoreError>;
    async fn rollback(&mut self) -> Result<(), StoreError>;
}
// endregion: --- Store Traits
