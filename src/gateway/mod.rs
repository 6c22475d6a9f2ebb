//! Write gateway.
//! The only path to a store mutation. Each write opens one transaction, reads
//! its snapshot, runs the rule set, mutates, and commits; any violation rolls
//! the whole transaction back before anything becomes visible.
// region:    --- Imports
use crate::auction::events::WriteEvent;
use crate::auction::model::{Auction, AuctionView, Bid, NewAuction, Tick, User};
use crate::config::EngineConfig;
use crate::database::DatabaseManager;
use crate::error::{EntityKind, StoreError, Violation, WriteError};
use crate::rules::{AuctionCheck, BidCheck, RuleSet};
use crate::store::memory::MemoryStore;
use crate::store::postgres::PgStore;
use crate::store::{EntityStore, StoreTx};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Modules
pub mod aggregates;

pub use aggregates::{AggregateAudit, AuctionAggregates};
// endregion: --- Modules

// Upper bound on lost clock compare-and-set races
const MAX_CLOCK_RETRIES: u32 = 100;

/// Accepted clock advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClockAdvance {
    pub previous: Tick,
    pub current: Tick,
}

/// Outcome of a registration: the stored row and whether this call created it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
    pub user: User,
    pub created: bool,
}

// region:    --- Write Gateway
pub struct WriteGateway {
    store: Arc<dyn EntityStore>,
    rules: RuleSet,
    config: EngineConfig,
    events: broadcast::Sender<WriteEvent>,
}

impl WriteGateway {
    fn with_store(store: Arc<dyn EntityStore>, config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_buffer.max(1));
        Self {
            store,
            rules: RuleSet::standard(),
            config,
            events,
        }
    }

    /// Gateway over a fresh in-process store.
    pub fn in_memory(config: EngineConfig) -> Self {
        let store = MemoryStore::new(config.initial_clock);
        Self::with_store(Arc::new(store), config)
    }

    /// Gateway over an initialized Postgres schema.
    pub fn postgres(db_manager: Arc<DatabaseManager>, config: EngineConfig) -> Self {
        Self::with_store(Arc::new(PgStore::new(db_manager)), config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WriteEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: WriteEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Commit on Ok, roll back on Err.
    async fn finish<T>(
        mut tx: Box<dyn StoreTx>,
        result: Result<T, WriteError>,
    ) -> Result<T, WriteError> {
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    // region:    --- Register User
    /// Idempotent for an identical row; a conflicting row is a
    /// `DuplicateIdentifier`.
    pub async fn register_user(&self, user: User) -> Result<Registration, WriteError> {
        info!("{:<12} --> register user: {}", "Gateway", user.id);
        let mut tx = self.store.begin().await?;
        let result = Self::register_user_in(&mut *tx, &user).await;
        let registration = Self::finish(tx, result).await.inspect_err(|e| {
            warn!("{:<12} --> register user {} rejected: {}", "Gateway", user.id, e);
        })?;

        if registration.created {
            self.publish(WriteEvent::UserRegistered {
                user: registration.user.clone(),
                automatic: false,
                recorded_at: Utc::now(),
            });
        }
        Ok(registration)
    }

    async fn register_user_in(
        tx: &mut dyn StoreTx,
        user: &User,
    ) -> Result<Registration, WriteError> {
        if user.id.trim().is_empty() {
            return Err(Violation::UnknownReference {
                kind: EntityKind::User,
                id: user.id.clone(),
            }
            .into());
        }

        let existing = match tx.find_user(&user.id).await? {
            Some(existing) => existing,
            None => {
                if tx.insert_user(user).await? {
                    return Ok(Registration {
                        user: user.clone(),
                        created: true,
                    });
                }
                // Lost a race against another registration of the same id.
                tx.find_user(&user.id).await?.ok_or_else(|| {
                    StoreError::Corrupt(format!("user {} vanished after conflict", user.id))
                })?
            }
        };

        if existing != *user {
            return Err(Violation::DuplicateIdentifier {
                kind: EntityKind::User,
                id: user.id.clone(),
            }
            .into());
        }
        Ok(Registration {
            user: existing,
            created: false,
        })
    }
    // endregion: --- Register User

    // region:    --- Create Auction
    /// Auto-creates an unknown seller. Fails on `start >= end` or a reused
    /// auction id.
    pub async fn create_auction(&self, new: NewAuction) -> Result<Auction, WriteError> {
        info!(
            "{:<12} --> create auction: seller {}, window {}..={}",
            "Gateway", new.seller_id, new.start, new.end
        );
        let mut tx = self.store.begin().await?;
        let result = self.create_auction_in(&mut *tx, &new).await;
        let (auction, seller_created) = Self::finish(tx, result).await.inspect_err(|e| {
            warn!("{:<12} --> create auction rejected: {}", "Gateway", e);
        })?;

        if seller_created {
            self.publish(WriteEvent::UserRegistered {
                user: User::placeholder(auction.seller_id.clone()),
                automatic: true,
                recorded_at: Utc::now(),
            });
        }
        self.publish(WriteEvent::AuctionCreated {
            auction: auction.clone(),
            recorded_at: Utc::now(),
        });
        info!("{:<12} --> auction {} created", "Gateway", auction.id);
        Ok(auction)
    }

    async fn create_auction_in(
        &self,
        tx: &mut dyn StoreTx,
        new: &NewAuction,
    ) -> Result<(Auction, bool), WriteError> {
        let seller_exists = tx.find_user(&new.seller_id).await?.is_some();
        self.rules.check_auction(&AuctionCheck {
            auction: new,
            seller_exists,
        })?;

        if let Some(id) = new.id {
            if tx.auction_exists(id).await? {
                return Err(duplicate_auction(id).into());
            }
        }

        let seller_created = !seller_exists
            && tx
                .insert_user(&User::placeholder(new.seller_id.clone()))
                .await?;

        let auction = tx
            .insert_auction(new)
            .await?
            .ok_or_else(|| duplicate_auction(new.id.unwrap_or_default()))?;
        Ok((auction, seller_created))
    }
    // endregion: --- Create Auction

    // region:    --- Place Bid
    /// Stamps the bid with the current pseudo time; the caller never supplies
    /// it.
    pub async fn place_bid(
        &self,
        auction_id: i64,
        user_id: &str,
        amount: i64,
    ) -> Result<Bid, WriteError> {
        info!(
            "{:<12} --> place bid: auction {}, user {}, amount {}",
            "Gateway", auction_id, user_id, amount
        );
        let mut tx = self.store.begin().await?;
        let result = self
            .place_bid_in(&mut *tx, auction_id, user_id, amount)
            .await;
        let (bid, auction, bidder_created) = Self::finish(tx, result).await.inspect_err(|e| {
            warn!(
                "{:<12} --> bid on auction {} by {} rejected: {}",
                "Gateway", auction_id, user_id, e
            );
        })?;

        if bidder_created {
            self.publish(WriteEvent::UserRegistered {
                user: User::placeholder(user_id),
                automatic: true,
                recorded_at: Utc::now(),
            });
        }
        self.publish(WriteEvent::BidPlaced {
            bid: bid.clone(),
            highest_bid: auction.highest_bid,
            number_of_bids: auction.number_of_bids,
            recorded_at: Utc::now(),
        });
        info!(
            "{:<12} --> bid accepted: auction {}, highest {}, count {}",
            "Gateway", auction.id, bid.amount, auction.number_of_bids
        );
        Ok(bid)
    }

    async fn place_bid_in(
        &self,
        tx: &mut dyn StoreTx,
        auction_id: i64,
        user_id: &str,
        amount: i64,
    ) -> Result<(Bid, Auction, bool), WriteError> {
        let auction = tx
            .lock_auction(auction_id)
            .await?
            .ok_or_else(|| Violation::UnknownReference {
                kind: EntityKind::Auction,
                id: auction_id.to_string(),
            })?;
        let now = tx.read_clock().await?;
        let bidder_exists = tx.find_user(user_id).await?.is_some();
        let key_taken = tx.bid_key_taken(auction_id, user_id, now).await?;

        self.rules.check_bid(&BidCheck {
            auction: &auction,
            user_id,
            amount,
            now,
            bidder_exists,
            auto_register_bidders: self.config.auto_register_bidders,
            key_taken,
        })?;

        let bidder_created =
            !bidder_exists && tx.insert_user(&User::placeholder(user_id)).await?;

        let bid = Bid {
            auction_id,
            user_id: user_id.to_string(),
            time: now,
            amount,
            seq: auction.number_of_bids + 1,
        };
        tx.insert_bid(&bid).await?;
        let auction = aggregates::apply_accepted_bid(tx, &auction, &bid).await?;
        Ok((bid, auction, bidder_created))
    }
    // endregion: --- Place Bid

    // region:    --- Advance Clock
    /// Forward-only. A rejected value leaves the clock untouched.
    pub async fn advance_clock(&self, requested: Tick) -> Result<ClockAdvance, WriteError> {
        info!("{:<12} --> advance clock to {}", "Gateway", requested);
        let mut retries = 0;

        while retries < MAX_CLOCK_RETRIES {
            let mut tx = self.store.begin().await?;
            let result = self.advance_clock_in(&mut *tx, requested).await;
            match Self::finish(tx, result).await {
                Ok(Some(advance)) => {
                    self.publish(WriteEvent::ClockAdvanced {
                        previous: advance.previous,
                        current: advance.current,
                        recorded_at: Utc::now(),
                    });
                    return Ok(advance);
                }
                Ok(None) => {
                    warn!("{:<12} --> clock moved concurrently: retry", "Gateway");
                    retries += 1;
                }
                Err(e) => {
                    warn!("{:<12} --> clock advance rejected: {}", "Gateway", e);
                    return Err(e);
                }
            }
        }

        Err(StoreError::Contention("pseudo clock").into())
    }

    async fn advance_clock_in(
        &self,
        tx: &mut dyn StoreTx,
        requested: Tick,
    ) -> Result<Option<ClockAdvance>, WriteError> {
        let current = tx.read_clock().await?;
        self.rules.check_clock(current, requested)?;
        if !tx.compare_and_set_clock(current, requested).await? {
            return Ok(None);
        }
        Ok(Some(ClockAdvance {
            previous: current,
            current: requested,
        }))
    }
    // endregion: --- Advance Clock

    // region:    --- Reads
    pub async fn now(&self) -> Result<Tick, StoreError> {
        self.store.clock_now().await
    }

    pub async fn user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.store.find_user(user_id).await
    }

    pub async fn auction(&self, auction_id: i64) -> Result<Option<AuctionView>, StoreError> {
        let now = self.now().await?;
        Ok(self
            .store
            .find_auction(auction_id)
            .await?
            .map(|auction| AuctionView::at(auction, now)))
    }

    pub async fn auctions(&self) -> Result<Vec<AuctionView>, StoreError> {
        let now = self.now().await?;
        Ok(self
            .store
            .list_auctions()
            .await?
            .into_iter()
            .map(|auction| AuctionView::at(auction, now))
            .collect())
    }

    /// Bid history ordered by time.
    pub async fn bids(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        self.store.bids_for_auction(auction_id).await
    }

    /// `Ok(None)` when the auction does not exist.
    pub async fn highest_bid(&self, auction_id: i64) -> Result<Option<Option<i64>>, StoreError> {
        Ok(self
            .store
            .find_auction(auction_id)
            .await?
            .map(|auction| auction.highest_bid))
    }

    /// Compares stored aggregates against a recomputation from the bids.
    pub async fn audit_auction(&self, auction_id: i64) -> Result<Option<AggregateAudit>, StoreError> {
        let Some(auction) = self.store.find_auction(auction_id).await? else {
            return Ok(None);
        };
        let bids = self.store.bids_for_auction(auction_id).await?;
        let audit = AggregateAudit::new(&auction, &bids);
        if !audit.consistent {
            warn!(
                "{:<12} --> auction {} aggregates drifted: {:?} vs {:?}",
                "Audit", auction_id, audit.stored, audit.recomputed
            );
        }
        Ok(Some(audit))
    }
    // endregion: --- Reads
}
// endregion: --- Write Gateway

fn duplicate_auction(id: i64) -> Violation {
    Violation::DuplicateIdentifier {
        kind: EntityKind::Auction,
        id: id.to_string(),
    }
}
