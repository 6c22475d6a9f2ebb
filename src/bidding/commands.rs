//! Write commands accepted over the wire.
//! Each maps one-to-one onto a gateway operation.
// region:    --- Imports
use crate::auction::model::{Auction, Bid, NewAuction, Tick, User};
use crate::error::WriteError;
use crate::gateway::{ClockAdvance, Registration, WriteGateway};
use serde::{Deserialize, Serialize};
use tracing::info;
// endregion: --- Imports

// region:    --- Commands
/// Bid placement. No time field: bids are stamped with the pseudo clock.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaceBidCommand {
    pub auction_id: i64,
    pub user_id: String,
    pub amount: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterUserCommand {
    pub user_id: String,
    #[serde(default)]
    pub rating: i64,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl From<RegisterUserCommand> for User {
    fn from(cmd: RegisterUserCommand) -> Self {
        User {
            id: cmd.user_id,
            rating: cmd.rating,
            location: cmd.location,
            country: cmd.country,
        }
    }
}

pub type CreateAuctionCommand = NewAuction;

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AdvanceClockCommand {
    pub now: Tick,
}
// endregion: --- Commands

// region:    --- Command Handlers
pub async fn handle_place_bid(
    cmd: PlaceBidCommand,
    gateway: &WriteGateway,
) -> Result<Bid, WriteError> {
    info!("{:<12} --> {:?}", "Command", cmd);
    gateway
        .place_bid(cmd.auction_id, &cmd.user_id, cmd.amount)
        .await
}

pub async fn handle_register_user(
    cmd: RegisterUserCommand,
    gateway: &WriteGateway,
) -> Result<Registration, WriteError> {
    info!("{:<12} --> {:?}", "Command", cmd);
    gateway.register_user(cmd.into()).await
}

pub async fn handle_create_auction(
    cmd: CreateAuctionCommand,
    gateway: &WriteGateway,
) -> Result<Auction, WriteError> {
    info!("{:<12} --> {:?}", "Command", cmd);
    gateway.create_auction(cmd).await
}

pub async fn handle_advance_clock(
    cmd: AdvanceClockCommand,
    gateway: &WriteGateway,
) -> Result<ClockAdvance, WriteError> {
    info!("{:<12} --> {:?}", "Command", cmd);
    gateway.advance_clock(cmd.now).await
}
// endregion: --- Command Handlers
