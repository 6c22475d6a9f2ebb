//! PostgreSQL entity store.
//! Same-auction writes serialize on `SELECT ... FOR UPDATE` of the auction
//! row; the clock advance locks the single `pseudo_time` row.
// region:    --- Imports
use super::{EntityStore, StoreTx};
use crate::auction::model::{Auction, Bid, NewAuction, Tick, User};
use crate::database::DatabaseManager;
use crate::error::StoreError;
use crate::query::{handlers, queries};
use async_trait::async_trait;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;
// endregion: --- Imports

// region:    --- Postgres Store
pub(crate) struct PgStore {
    db_manager: Arc<DatabaseManager>,
}

impl PgStore {
    pub(crate) fn new(db_manager: Arc<DatabaseManager>) -> Self {
        Self { db_manager }
    }
}

#[async_trait]
impl EntityStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.db_manager.pool().begin().await?;
        Ok(Box::new(PgTx { tx: Some(tx) }))
    }

    async fn find_user(&self, user_id: &str) -> Result<Option<User>, StoreError> {
        Ok(handlers::get_user(&self.db_manager, user_id.to_string()).await?)
    }

    async fn find_auction(&self, auction_id: i64) -> Result<Option<Auction>, StoreError> {
        Ok(handlers::get_auction(&self.db_manager, auction_id).await?)
    }

    async fn list_auctions(&self) -> Result<Vec<Auction>, StoreError> {
        Ok(handlers::get_all_auctions(&self.db_manager).await?)
    }

    async fn bids_for_auction(&self, auction_id: i64) -> Result<Vec<Bid>, StoreError> {
        Ok(handlers::get_auction_bids(&self.db_manager, auction_id).await?)
    }

    async fn clock_now(&self) -> Result<Tick, StoreError> {
        Ok(handlers::get_clock(&self.db_manager).await?)
    }
}
// endregion: --- Postgres Store

// region:    --- Postgres Transaction
/// Dropping the inner sqlx transaction without commit rolls it back.
struct PgTx {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgTx {
    fn conn(&mut self) -> Result<&mut Transaction<'static, Postgres>, StoreError> {
        self.tx.as_mut().ok_or(StoreError::TransactionClosed)
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn find_user(&mut self, user_id: &str) -> Result<Option<User>, StoreError> {
        let tx = self.conn()?;
        let user = sqlx::query_as::<_, User>(queries::GET_USER)
            .bind(user_id)
            .fetch_optional(&mut **tx)
            .await?;
        Ok(user)
    }

    async fn auction_exists(&mut self, auction_id: i64) -> Result<bool, StoreError> {
        let tx = self.conn()?;
        let exists = sqlx::query_scalar::<_, bool>(queries::AUCTION_EXISTS)
            .bind(auction_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(exists)
    }

    async fn lock_auction(&mut self, auction_id: i64) -> Result<Option<Auction>, StoreError> {
        let tx = self.conn()?;
        let auction = sqlx::query_as::<_, Auction>(queries::LOCK_AUCTION)
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
    }

    async fn bid_key_taken(
        &mut self,
        auction_id: i64,
        user_id: &str,
        time: Tick,
    ) -> Result<bool, StoreError> {
        let tx = self.conn()?;
        let taken = sqlx::query_scalar::<_, bool>(queries::BID_KEY_EXISTS)
            .bind(auction_id)
            .bind(user_id)
            .bind(time)
            .fetch_one(&mut **tx)
            .await?;
        Ok(taken)
    }

    async fn read_clock(&mut self) -> Result<Tick, StoreError> {
        let tx = self.conn()?;
        let now = sqlx::query_scalar::<_, Tick>(queries::GET_CLOCK)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::Corrupt("pseudo_time row missing".to_string()))?;
        Ok(now)
    }

    async fn insert_user(&mut self, user: &User) -> Result<bool, StoreError> {
        let tx = self.conn()?;
        let inserted = sqlx::query_scalar::<_, String>(
            "INSERT INTO users (id, rating, location, country)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            RETURNING id",
        )
        .bind(&user.id)
        .bind(user.rating)
        .bind(&user.location)
        .bind(&user.country)
        .fetch_optional(&mut **tx)
        .await?;
        Ok(inserted.is_some())
    }

    async fn insert_auction(&mut self, new: &NewAuction) -> Result<Option<Auction>, StoreError> {
        let tx = self.conn()?;
        let auction_id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO auctions (id, name, seller_id, start_tick, end_tick, buy_price, first_bid, description)
            VALUES (COALESCE($1, nextval(pg_get_serial_sequence('auctions', 'id'))), $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            RETURNING id",
        )
        .bind(new.id)
        .bind(&new.name)
        .bind(&new.seller_id)
        .bind(new.start)
        .bind(new.end)
        .bind(new.buy_price)
        .bind(new.first_bid)
        .bind(&new.description)
        .fetch_optional(&mut **tx)
        .await
        .map_err(sequence_exhausted)?;

        let Some(auction_id) = auction_id else {
            return Ok(None);
        };

        if new.id.is_some() {
            // Keep generated ids clear of feed-supplied ones.
            sqlx::query(
                "SELECT setval(pg_get_serial_sequence('auctions', 'id'), GREATEST((SELECT MAX(id) FROM auctions), 1))",
            )
            .execute(&mut **tx)
            .await?;
        }

        let auction = new.clone().into_auction(auction_id);
        for category in &auction.categories {
            sqlx::query("INSERT INTO auction_categories (auction_id, category) VALUES ($1, $2)")
                .bind(auction_id)
                .bind(category)
                .execute(&mut **tx)
                .await?;
        }
        Ok(Some(auction))
    }

    async fn insert_bid(&mut self, bid: &Bid) -> Result<(), StoreError> {
        let tx = self.conn()?;
        sqlx::query(
            "INSERT INTO bids (auction_id, user_id, bid_time, amount, seq) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(bid.auction_id)
        .bind(&bid.user_id)
        .bind(bid.time)
        .bind(bid.amount)
        .bind(bid.seq)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    async fn update_auction_aggregates(
        &mut self,
        auction_id: i64,
        highest_bid: Option<i64>,
        number_of_bids: i64,
    ) -> Result<(), StoreError> {
        let tx = self.conn()?;
        let updated = sqlx::query(
            "UPDATE auctions SET highest_bid = $1, number_of_bids = $2 WHERE id = $3",
        )
        .bind(highest_bid)
        .bind(number_of_bids)
        .bind(auction_id)
        .execute(&mut **tx)
        .await?;
        if updated.rows_affected() != 1 {
            return Err(StoreError::NotLocked(auction_id));
        }
        Ok(())
    }

    async fn compare_and_set_clock(
        &mut self,
        expected: Tick,
        requested: Tick,
    ) -> Result<bool, StoreError> {
        let tx = self.conn()?;
        let current = sqlx::query_scalar::<_, Tick>(queries::LOCK_CLOCK)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::Corrupt("pseudo_time row missing".to_string()))?;
        if current != expected {
            return Ok(false);
        }
        sqlx::query("UPDATE pseudo_time SET now = $1 WHERE id = 1")
            .bind(requested)
            .execute(&mut **tx)
            .await?;
        Ok(true)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.commit().await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), StoreError> {
        let tx = self.tx.take().ok_or(StoreError::TransactionClosed)?;
        tx.rollback().await?;
        Ok(())
    }
}
// endregion: --- Postgres Transaction

/// `nextval` past the sequence maximum (SQLSTATE 2200H).
fn sequence_exhausted(e: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some("2200H") {
            return StoreError::IdsExhausted;
        }
    }
    StoreError::Database(e)
}
