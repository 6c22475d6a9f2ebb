use crate::auction::model::Tick;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::info;

pub struct DatabaseManager {
    pub pool: Arc<PgPool>,
}

impl DatabaseManager {
    /// Connect a pool to `database_url`
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Run `f` inside a transaction; commit on Ok, roll back on Err
    pub async fn transaction<F, R, E>(&self, f: F) -> Result<R, E>
    where
        F: for<'c> FnOnce(
            &'c mut sqlx::Transaction<'_, sqlx::Postgres>,
        ) -> Pin<Box<dyn Future<Output = Result<R, E>> + Send + 'c>>,
        E: From<sqlx::Error>,
    {
        let mut tx = self.pool.begin().await?;
        let result = f(&mut tx).await;
        match result {
            Ok(r) => {
                tx.commit().await?;
                Ok(r)
            }
            Err(e) => {
                tx.rollback().await?;
                Err(e)
            }
        }
    }

    /// Create the schema, dropping existing tables first when `reset` is set.
    /// The clock row is seeded with `initial_clock` only if it does not exist.
    pub async fn initialize_database(
        &self,
        reset: bool,
        initial_clock: Tick,
    ) -> Result<(), sqlx::Error> {
        if reset {
            let recreate_db_sql = include_str!("../../sql/00-recreate-db.sql");
            self.execute_multi_query(recreate_db_sql).await?;
            info!("{:<12} --> existing tables dropped", "Database");
        }

        let create_schema_sql = include_str!("../../sql/01-create-schema.sql");
        self.execute_multi_query(create_schema_sql).await?;

        sqlx::query("INSERT INTO pseudo_time (id, now) VALUES (1, $1) ON CONFLICT (id) DO NOTHING")
            .bind(initial_clock)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }

    /// Run each `;`-separated statement in order
    async fn execute_multi_query(&self, sql: &str) -> Result<(), sqlx::Error> {
        for query in sql.split(';') {
            let query = query.trim();
            if !query.is_empty() {
                sqlx::query(query).execute(&*self.pool).await?;
            }
        }
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
