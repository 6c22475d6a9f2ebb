use super::model::{Auction, Bid, Tick, User};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Committed write. Published only after the transaction commits.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(tag = "type")]
pub enum WriteEvent {
    // User registration, explicit or automatic
    UserRegistered {
        user: User,
        automatic: bool,
        recorded_at: DateTime<Utc>,
    },
    AuctionCreated {
        auction: Auction,
        recorded_at: DateTime<Utc>,
    },
    // Accepted bid with the auction's aggregates after it
    BidPlaced {
        bid: Bid,
        highest_bid: Option<i64>,
        number_of_bids: i64,
        recorded_at: DateTime<Utc>,
    },
    ClockAdvanced {
        previous: Tick,
        current: Tick,
        recorded_at: DateTime<Utc>,
    },
}

impl WriteEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WriteEvent::UserRegistered { .. } => "UserRegistered",
            WriteEvent::AuctionCreated { .. } => "AuctionCreated",
            WriteEvent::BidPlaced { .. } => "BidPlaced",
            WriteEvent::ClockAdvanced { .. } => "ClockAdvanced",
        }
    }
}

/// Logs every committed write until the channel closes.
pub fn spawn_event_logger(mut events: broadcast::Receiver<WriteEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!("{:<12} --> {}: {}", "EventLog", event.kind(), json),
                    Err(e) => warn!("{:<12} --> unserializable event: {:?}", "EventLog", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("{:<12} --> event log lagged, {} skipped", "EventLog", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
