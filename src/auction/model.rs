use serde::{Deserialize, Serialize};

/// Pseudo-clock reading. All auction bounds and bid times use this unit.
pub type Tick = i64;

// region:    --- User
/// Marketplace user. Sellers and bidders share the same table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl User {
    /// Minimal row created when an identifier first shows up through
    /// auction or bid activity.
    pub fn placeholder(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rating: 0,
            location: None,
            country: None,
        }
    }
}
// endregion: --- User

// region:    --- Auction
/// Auction row. `highest_bid` and `number_of_bids` are derived fields and are
/// only ever written by the aggregate maintainer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Auction {
    pub id: i64,
    pub name: String,
    pub seller_id: String,
    #[sqlx(rename = "start_tick")]
    pub start: Tick,
    #[sqlx(rename = "end_tick")]
    pub end: Tick,
    pub buy_price: Option<i64>,
    pub first_bid: i64,
    pub highest_bid: Option<i64>,
    pub number_of_bids: i64,
    pub description: Option<String>,
    #[sqlx(skip)]
    pub categories: Vec<String>,
}

impl Auction {
    /// Status is never stored; it is read off the clock and the bounds.
    pub fn status_at(&self, now: Tick) -> AuctionStatus {
        if now < self.start {
            AuctionStatus::NotStarted
        } else if now <= self.end {
            AuctionStatus::Open
        } else {
            AuctionStatus::Closed
        }
    }

    pub fn is_open_at(&self, now: Tick) -> bool {
        self.status_at(now) == AuctionStatus::Open
    }
}

/// Auction creation request. `id` is the natural key supplied by the feed;
/// when absent the store assigns one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuction {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: String,
    pub seller_id: String,
    pub start: Tick,
    pub end: Tick,
    #[serde(default)]
    pub buy_price: Option<i64>,
    pub first_bid: i64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub categories: Vec<String>,
}

impl NewAuction {
    pub fn new(seller_id: impl Into<String>, start: Tick, end: Tick, first_bid: i64) -> Self {
        Self {
            id: None,
            name: String::new(),
            seller_id: seller_id.into(),
            start,
            end,
            buy_price: None,
            first_bid,
            description: None,
            categories: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_buy_price(mut self, buy_price: i64) -> Self {
        self.buy_price = Some(buy_price);
        self
    }

    /// Materializes the row as it looks right after creation.
    pub fn into_auction(self, id: i64) -> Auction {
        let mut categories = self.categories;
        categories.sort();
        categories.dedup();
        Auction {
            id,
            name: self.name,
            seller_id: self.seller_id,
            start: self.start,
            end: self.end,
            buy_price: self.buy_price,
            first_bid: self.first_bid,
            highest_bid: None,
            number_of_bids: 0,
            description: self.description,
            categories,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuctionStatus {
    NotStarted,
    Open,
    Closed,
}

/// Auction together with its status at the time of the read.
#[derive(Debug, Clone, Serialize)]
pub struct AuctionView {
    #[serde(flatten)]
    pub auction: Auction,
    pub status: AuctionStatus,
    pub now: Tick,
}

impl AuctionView {
    pub fn at(auction: Auction, now: Tick) -> Self {
        let status = auction.status_at(now);
        Self {
            auction,
            status,
            now,
        }
    }
}
// endregion: --- Auction

// region:    --- Bid
/// Accepted bid. The natural key is `(auction_id, user_id, time)`; `seq` is
/// the engine-assigned position within the auction, starting at 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Bid {
    pub auction_id: i64,
    pub user_id: String,
    #[sqlx(rename = "bid_time")]
    pub time: Tick,
    pub amount: i64,
    pub seq: i64,
}
// endregion: --- Bid
