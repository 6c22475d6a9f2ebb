//! In-process entity store.
//! Users sit behind one short-lived map lock; each auction has its own async
//! mutex so bids on different auctions never wait on each other.
// region:    --- Imports
use super::{EntityStore, StoreTx};
use crate::auction::model::{Auction, Bid, NewAuction, Tick, User};
use crate::clock::PseudoClock;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
// endregion: --- Imports

// region:    --- Memory Store
struct AuctionSlot {
    auction: Auction,
    bids: Vec<Bid>,
}

struct Inner {
    clock: PseudoClock,
    users: RwLock<HashMap<String, User>>,
    auctions: RwLock<BTreeMap<i64, Arc<Mutex<AuctionSlot>>>>,
    next_auction_id: AtomicI64,
}

impl Inner {
    fn slot(&self, auction_id: i64) -> Option<Arc<Mutex<AuctionSlot>>> {
        self.auctions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&auction_id)
            .cloned()
    }
}

pub(crate) struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub(crate) fn new(initial_clock: Tick) -> Self {
        Self {
            inner: Arc::new(Inner {
                clock: PseudoClock::new(initial_clock),
                users: RwLock::new(HashMap::new()),
                auctions: RwLock::new(BTreeMap::new()),
                next_auction_id: AtomicI64::new(1),
            }),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            inner: Arc::clone(&self.inner),
            locked: Vec::new(),
            undo: Vec::new(),
            finished: false,
        }))
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        let users = self.inner.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(user_id).cloned())
    }

    async fn find_auction(&self, auction_id: i64) -> Result<Option<Auction>, StoreError> {
        let Some(slot) = self.inner.slot(auction_id) else {
            return Ok(None);
        };
        let slot = slot.lock().await;
        Ok(Some(slot.auction.clone()))
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        let slots: Vec<_> = self
            .inner
            .auctions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        let mut auctions = Vec::with_capacity(slots.len());
        for slot in slots {
            auctions.push(slot.lock().await.auction.clone());
        }
        Ok(auctions)
    }

    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        let Some(slot) = self.inner.slot(auction_id) else {
            return Ok(Vec::new());
        };
        let slot = slot.lock().await;
        Ok(slot.bids.clone())
    }

    async fn clock_now(&self) -> Result<Tick, StoreError> {
        Ok(self.inner.clock.read())
    }
}
// endregion: --- Memory Store

// region:    --- Memory Transaction
enum Undo {
    User(String),
    Auction(i64),
    Bid(i64),
    Aggregates {
        auction_id: i64,
        highest_bid: Option<i64>,
        number_of_bids: i64,
    },
    Clock {
        previous: Tick,
        current: Tick,
    },
}

/// Writes apply in place and are recorded in an undo log; rollback (or drop
/// before commit) replays the log backwards. Auction locks are held until the
/// transaction finishes, so readers never see a bid without its aggregates.
struct MemoryTx {
    inner: Arc<Inner>,
    locked: Vec<(i64, OwnedMutexGuard<AuctionSlot>)>,
    undo: Vec<Undo>,
    finished: bool,
}

impl MemoryTx {
    fn locked_slot(&mut self, auction_id: i64) -> Option<&mut AuctionSlot> {
        self.locked
            .iter_mut()
            .find(|(id, _)| *id == auction_id)
            .map(|(_, guard)| &mut **guard)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.finished {
            return Err(StoreError::TransactionClosed);
        }
        Ok(())
    }

    fn undo_all(&mut self) {
        while let Some(step) = self.undo.pop() {
            match step {
                Undo::User(user_id) => {
                    self.inner
                        .users
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&user_id);
                }
                Undo::Auction(auction_id) => {
                    self.inner
                        .auctions
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&auction_id);
                }
                Undo::Bid(auction_id) => {
                    if let Some(slot) = self.locked_slot(auction_id) {
                        slot.bids.pop();
                    }
                }
                Undo::Aggregates {
                    auction_id,
                    highest_bid,
                    number_of_bids,
                } => {
                    if let Some(slot) = self.locked_slot(auction_id) {
                        slot.auction.highest_bid = highest_bid;
                        slot.auction.number_of_bids = number_of_bids;
                    }
                }
                Undo::Clock { previous, current } => {
                    self.inner.clock.compare_and_set(current, previous);
                }
            }
        }
        self.locked.clear();
        self.finished = true;
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if !self.finished {
            debug!("{:<12} --> unfinished transaction rolled back", "MemoryStore");
            self.undo_all();
        }
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn find_user(&mut self, user_id: &str) -> Result<Option<User>, StoreError> {
        self.ensure_open()?;
        let users = self.inner.users.read().unwrap_or_else(PoisonError::into_inner);
        Ok(users.get(user_id).cloned())
    }

    async fn auction_exists(&mut self, auction_id: i64) -> Result<bool, StoreError> {
        self.ensure_open()?;
        if self.locked_slot(auction_id).is_some() {
            return Ok(true);
        }
        Ok(self.inner.slot(auction_id).is_some())
    }

    async fn lock_auction(&mut self, auction_id: i64) -> Result<Option<Auction>, StoreError> {
        self.ensure_open()?;
        if let Some(slot) = self.locked_slot(auction_id) {
            return Ok(Some(slot.auction.clone()));
        }
        let Some(slot) = self.inner.slot(auction_id) else {
            return Ok(None);
        };
        let guard = slot.lock_owned().await;
        let auction = guard.auction.clone();
        self.locked.push((auction_id, guard));
        Ok(Some(auction))
    }

    async fn bid_key_taken(
        &mut self,
        auction_id: i64,
        user_id: &str,
        time: Tick,
    ) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let slot = self
            .locked_slot(auction_id)
            .ok_or(StoreError::NotLocked(auction_id))?;
        Ok(slot
            .bids
            .iter()
            .any(|bid| bid.user_id == user_id && bid.time == time))
    }

    async fn read_clock(&mut self) -> Result<Tick, StoreError> {
        self.ensure_open()?;
        Ok(self.inner.clock.read())
    }

    async fn insert_user(&mut self, user: &User) -> Result<bool, StoreError> {
        self.ensure_open()?;
        let mut users = self.inner.users.write().unwrap_or_else(PoisonError::into_inner);
        if users.contains_key(&user.id) {
            return Ok(false);
        }
        users.insert(user.id.clone(), user.clone());
        self.undo.push(Undo::User(user.id.clone()));
        Ok(true)
    }

    async fn insert_auction(&mut self, new: &NewAuction) -> Result<Option<Auction>, StoreError> {
        self.ensure_open()?;
        let mut auctions = self
            .inner
            .auctions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let auction_id = match new.id {
            Some(id) => {
                if auctions.contains_key(&id) {
                    return Ok(None);
                }
                self.inner
                    .next_auction_id
                    .fetch_max(id.saturating_add(1), Ordering::AcqRel);
                id
            }
            // i64::MAX is only reachable as an explicit id.
            None => loop {
                let id = self
                    .inner
                    .next_auction_id
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |next| {
                        next.checked_add(1)
                    })
                    .map_err(|_| StoreError::IdsExhausted)?;
                if !auctions.contains_key(&id) {
                    break id;
                }
            },
        };
        let auction = new.clone().into_auction(auction_id);
        auctions.insert(
            auction_id,
            Arc::new(Mutex::new(AuctionSlot {
                auction: auction.clone(),
                bids: Vec::new(),
            })),
        );
        self.undo.push(Undo::Auction(auction_id));
        Ok(Some(auction))
    }

    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), StoreError> {
        self.ensure_open()?;
        let slot = self
            .locked_slot(bid.auction_id)
            .ok_or(StoreError::NotLocked(bid.auction_id))?;
        slot.bids.push(bid.clone());
        self.undo.push(Undo::Bid(bid.auction_id));
        Ok(())
    }

    async fn update_auction_aggregates(
        &mut self,
        auction_id: i64,
        highest_bid: Option<i64>,
        number_of_bids: i64,
    ) -> Result<(), StoreError> {
        self.ensure_open()?;
        let slot = self
            .locked_slot(auction_id)
            .ok_or(StoreError::NotLocked(auction_id))?;
        let previous = Undo::Aggregates {
            auction_id,
            highest_bid: slot.auction.highest_bid,
            number_of_bids: slot.auction.number_of_bids,
        };
        slot.auction.highest_bid = highest_bid;
        slot.auction.number_of_bids = number_of_bids;
        self.undo.push(previous);
        Ok(())
    }

    async fn compare_and_set_clock(
        &mut self,
        expected: Tick,
        requested: Tick,
    ) -> Result<bool, StoreError> {
        self.ensure_open()?;
        if !self.inner.clock.compare_and_set(expected, requested) {
            return Ok(false);
        }
        self.undo.push(Undo::Clock {
            previous: expected,
            current: requested,
        });
        Ok(true)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.undo.clear();
        self.locked.clear();
        self.finished = true;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.undo_all();
        Ok(())
    }
}
// endregion: --- Memory Transaction
