use crate::auction::model::Tick;
use serde::Serialize;
use std::fmt;

// region:    --- Violation
/// Kind of entity a reference or identifier points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Auction,
    Bid,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::User => write!(f, "user"),
            EntityKind::Auction => write!(f, "auction"),
            EntityKind::Bid => write!(f, "bid"),
        }
    }
}

/// Named reason a proposed write was rejected. A violation is always raised
/// before anything is written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "violation", rename_all = "snake_case")]
pub enum Violation {
    SellerBidConflict {
        auction_id: i64,
        user_id: String,
    },
    BidTooLow {
        amount: i64,
        first_bid: i64,
        highest_bid: Option<i64>,
    },
    BidOutsideWindow {
        now: Tick,
        start: Tick,
        end: Tick,
    },
    UnknownReference {
        kind: EntityKind,
        id: String,
    },
    NonMonotonicTime {
        current: Tick,
        requested: Tick,
    },
    InvalidAuctionWindow {
        start: Tick,
        end: Tick,
    },
    DuplicateIdentifier {
        kind: EntityKind,
        id: String,
    },
}

impl Violation {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Violation::SellerBidConflict { .. } => "SELLER_BID_CONFLICT",
            Violation::BidTooLow { .. } => "BID_TOO_LOW",
            Violation::BidOutsideWindow { .. } => "BID_OUTSIDE_WINDOW",
            Violation::UnknownReference { .. } => "UNKNOWN_REFERENCE",
            Violation::NonMonotonicTime { .. } => "NON_MONOTONIC_TIME",
            Violation::InvalidAuctionWindow { .. } => "INVALID_AUCTION_WINDOW",
            Violation::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::SellerBidConflict {
                auction_id,
                user_id,
            } => write!(
                f,
                "seller may not bid on own auction (auction {auction_id}, user {user_id})"
            ),
            Violation::BidTooLow {
                amount,
                first_bid,
                highest_bid: Some(highest),
            } => write!(
                f,
                "new bid must exceed current highest bid ({amount} <= {highest}, first bid {first_bid})"
            ),
            Violation::BidTooLow {
                amount,
                first_bid,
                highest_bid: None,
            } => write!(
                f,
                "new bid must be at least the first bid ({amount} < {first_bid})"
            ),
            Violation::BidOutsideWindow { now, start, end } => write!(
                f,
                "bid outside auction active window (now {now}, window {start}..={end})"
            ),
            Violation::UnknownReference { kind, id } => {
                write!(f, "unknown referenced entity: {kind} {id}")
            }
            Violation::NonMonotonicTime { current, requested } => write!(
                f,
                "time may only move forward (current {current}, requested {requested})"
            ),
            Violation::InvalidAuctionWindow { start, end } => write!(
                f,
                "auction must start before it ends (start {start}, end {end})"
            ),
            Violation::DuplicateIdentifier { kind, id } => {
                write!(f, "conflicting {kind} identifier: {id}")
            }
        }
    }
}

impl std::error::Error for Violation {}
// endregion: --- Violation

// region:    --- StoreError
/// Infrastructure failure of the entity store. Never a business-rule outcome.
#[derive(Debug)]
pub enum StoreError {
    Database(sqlx::Error),
    /// The transaction was used after it was committed or rolled back.
    TransactionClosed,
    /// A write required a row lock the transaction does not hold.
    NotLocked(i64),
    /// Stored data failed to decode into the model.
    Corrupt(String),
    /// Compare-and-set kept losing to concurrent writers.
    Contention(&'static str),
    /// No auction id is left to generate.
    IdsExhausted,
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {e}"),
            StoreError::TransactionClosed => write!(f, "transaction already finished"),
            StoreError::NotLocked(id) => write!(f, "auction {id} is not locked by this transaction"),
            StoreError::Corrupt(msg) => write!(f, "corrupt store data: {msg}"),
            StoreError::Contention(what) => write!(f, "too much contention on {what}"),
            StoreError::IdsExhausted => write!(f, "auction id space exhausted"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Database(e)
    }
}
// endregion: --- StoreError

// region:    --- WriteError
/// Outcome of a rejected gateway write.
#[derive(Debug)]
pub enum WriteError {
    Violation(Violation),
    Store(StoreError),
}

impl WriteError {
    pub fn violation(&self) -> Option<&Violation> {
        match self {
            WriteError::Violation(v) => Some(v),
            WriteError::Store(_) => None,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WriteError::Violation(v) => v.code(),
            WriteError::Store(_) => "STORE_ERROR",
        }
    }
}

impl fmt::Display for WriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteError::Violation(v) => write!(f, "{v}"),
            WriteError::Store(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for WriteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WriteError::Violation(v) => Some(v),
            WriteError::Store(e) => Some(e),
        }
    }
}

impl From<Violation> for WriteError {
    fn from(v: Violation) -> Self {
        WriteError::Violation(v)
    }
}

impl From<StoreError> for WriteError {
    fn from(e: StoreError) -> Self {
        WriteError::Store(e)
    }
}

impl From<sqlx::Error> for WriteError {
    fn from(e: sqlx::Error) -> Self {
        WriteError::Store(StoreError::Database(e))
    }
}
// endregion: --- WriteError
