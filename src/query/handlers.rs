// region:    --- Imports
use super::queries;
use crate::auction::model::{Auction, Bid, Tick, User};
use crate::database::DatabaseManager;
use sqlx::Error as SqlxError;
use sqlx::Row;
use std::collections::HashMap;
use tracing::debug;

// endregion: --- Imports

// region:    --- Query Handlers

/// User by id
pub async fn get_user(
    db_manager: &DatabaseManager,
    user_id: String,
) -> Result<Option<User>, SqlxError> {
    debug!("{:<12} --> user lookup id: {}", "Query", user_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, User>(queries::GET_USER)
                    .bind(user_id)
                    .fetch_optional(&mut **tx)
                    .await
            })
        })
        .await
}

/// Auction by id, categories attached
pub async fn get_auction(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Option<Auction>, SqlxError> {
    debug!("{:<12} --> auction lookup id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let auction = sqlx::query_as::<_, Auction>(queries::GET_AUCTION)
                    .bind(auction_id)
                    .fetch_optional(&mut **tx)
                    .await?;

                let Some(mut auction) = auction else {
                    return Ok(None);
                };
                auction.categories = sqlx::query_scalar::<_, String>(queries::GET_AUCTION_CATEGORIES)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await?;
                Ok(Some(auction))
            })
        })
        .await
}

/// Every auction ordered by id
pub async fn get_all_auctions(db_manager: &DatabaseManager) -> Result<Vec<Auction>, SqlxError> {
    debug!("{:<12} --> all auctions", "Query");
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let mut auctions = sqlx::query_as::<_, Auction>(queries::GET_ALL_AUCTIONS)
                    .fetch_all(&mut **tx)
                    .await?;

                let rows = sqlx::query(queries::GET_ALL_CATEGORIES)
                    .fetch_all(&mut **tx)
                    .await?;
                let mut categories: HashMap<i64, Vec<String>> = HashMap::new();
                for row in rows {
                    categories
                        .entry(row.get("auction_id"))
                        .or_default()
                        .push(row.get("category"));
                }
                for auction in &mut auctions {
                    if let Some(found) = categories.remove(&auction.id) {
                        auction.categories = found;
                    }
                }
                Ok(auctions)
            })
        })
        .await
}

/// Bid history of an auction, oldest first
pub async fn get_auction_bids(
    db_manager: &DatabaseManager,
    auction_id: i64,
) -> Result<Vec<Bid>, SqlxError> {
    debug!("{:<12} --> bid history id: {}", "Query", auction_id);
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                sqlx::query_as::<_, Bid>(queries::GET_AUCTION_BIDS)
                    .bind(auction_id)
                    .fetch_all(&mut **tx)
                    .await
            })
        })
        .await
}

/// Current pseudo time
pub async fn get_clock(db_manager: &DatabaseManager) -> Result<Tick, SqlxError> {
    db_manager
        .transaction(|tx| {
            Box::pin(async move {
                let result = sqlx::query(queries::GET_CLOCK)
                    .fetch_one(&mut **tx)
                    .await?;

                Ok(result.get("now"))
            })
        })
        .await
}

// endregion: --- Query Handlers
