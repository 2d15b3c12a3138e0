use async_trait::async_trait;
use common::{BatchRef, Sku, Version};
use domain::Product;
use sqlx::{PgPool, Postgres, Row, postgres::PgRow};

use crate::{
    Result, StoreError,
    store::{ConcurrencyMode, StockStore, StockTransaction},
};

/// SQLSTATE raised when a repeatable-read transaction loses a race.
const SERIALIZATION_FAILURE: &str = "40001";

/// PostgreSQL-backed stock store.
///
/// Products live in the `products` table: the sku, the version number used
/// for the optimistic check, and the product document as JSONB.
#[derive(Clone)]
pub struct PostgresStockStore {
    pool: PgPool,
}

impl PostgresStockStore {
    /// Creates a new PostgreSQL stock store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl StockStore for PostgresStockStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self, mode: ConcurrencyMode) -> Result<PostgresTransaction> {
        let mut tx = self.pool.begin().await?;

        // Optimistic transactions read from one snapshot and fail on a
        // concurrent update. Pessimistic ones serialize on the row lock and
        // must see the latest committed row once they get it.
        let isolation = match mode {
            ConcurrencyMode::Optimistic => "SET TRANSACTION ISOLATION LEVEL REPEATABLE READ",
            ConcurrencyMode::Pessimistic => "SET TRANSACTION ISOLATION LEVEL READ COMMITTED",
        };
        sqlx::query(isolation).execute(&mut *tx).await?;

        Ok(PostgresTransaction { tx, mode })
    }
}

/// Transaction over a [`PostgresStockStore`].
///
/// Dropping it without committing rolls back: sqlx issues the rollback when
/// the connection goes back to the pool.
pub struct PostgresTransaction {
    tx: sqlx::Transaction<'static, Postgres>,
    mode: ConcurrencyMode,
}

impl PostgresTransaction {
    fn lock_clause(&self) -> &'static str {
        match self.mode {
            ConcurrencyMode::Optimistic => "",
            ConcurrencyMode::Pessimistic => " FOR UPDATE",
        }
    }

    fn row_to_product(row: PgRow) -> Result<Product> {
        let state: serde_json::Value = row.try_get("state")?;
        Ok(serde_json::from_value(state)?)
    }

    async fn current_version(&mut self, sku: &Sku) -> Result<Option<Version>> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version_number FROM products WHERE sku = $1")
                .bind(sku.as_str())
                .fetch_optional(&mut *self.tx)
                .await?;
        Ok(version.map(Version::new))
    }
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(SERIALIZATION_FAILURE))
}

fn write_conflict(sku: &Sku, expected: Option<Version>, actual: Option<Version>) -> StoreError {
    metrics::counter!("stock_store_write_conflicts_total", "backend" => "postgres").increment(1);
    tracing::warn!(%sku, ?expected, ?actual, "write conflict");
    StoreError::WriteConflict {
        sku: sku.clone(),
        expected,
        actual,
    }
}

fn map_write_error(err: sqlx::Error, sku: &Sku, expected: Option<Version>) -> StoreError {
    if is_serialization_failure(&err) {
        return write_conflict(sku, expected, None);
    }
    StoreError::Database(err)
}

#[async_trait]
impl StockTransaction for PostgresTransaction {
    async fn load(&mut self, sku: &Sku) -> Result<Option<Product>> {
        let sql = format!(
            "SELECT sku, version_number, state FROM products WHERE sku = $1{}",
            self.lock_clause()
        );
        let row = sqlx::query(&sql)
            .bind(sku.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_write_error(e, sku, None))?;

        row.map(Self::row_to_product).transpose()
    }

    async fn load_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<Product>> {
        let sql = format!(
            r#"
            SELECT sku, version_number, state
            FROM products
            WHERE state->'batches' @> jsonb_build_array(jsonb_build_object('reference', $1::text))
            ORDER BY sku
            LIMIT 1{}
            "#,
            self.lock_clause()
        );
        let row = sqlx::query(&sql)
            .bind(reference.as_str())
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Self::row_to_product).transpose()
    }

    async fn insert(&mut self, product: &Product) -> Result<()> {
        let sku = product.sku();
        let state = serde_json::to_value(product)?;

        let result = sqlx::query(
            r#"
            INSERT INTO products (sku, version_number, state)
            VALUES ($1, $2, $3)
            ON CONFLICT (sku) DO NOTHING
            "#,
        )
        .bind(sku.as_str())
        .bind(product.version().as_i64())
        .bind(state)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, sku, None))?;

        if result.rows_affected() == 0 {
            let actual = self.current_version(sku).await?;
            return Err(write_conflict(sku, None, actual));
        }
        Ok(())
    }

    async fn update(&mut self, product: &Product, expected: Version) -> Result<()> {
        let sku = product.sku();
        let state = serde_json::to_value(product)?;

        let result = sqlx::query(
            r#"
            UPDATE products
            SET version_number = $2, state = $3
            WHERE sku = $1 AND version_number = $4
            "#,
        )
        .bind(sku.as_str())
        .bind(product.version().as_i64())
        .bind(state)
        .bind(expected.as_i64())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, sku, Some(expected)))?;

        if result.rows_affected() == 0 {
            let actual = self.current_version(sku).await?;
            return Err(write_conflict(sku, Some(expected), actual));
        }
        Ok(())
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
