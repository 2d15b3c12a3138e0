//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container and need Docker, so they
//! are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p stock-store --test postgres_integration -- --ignored
//! ```

use std::sync::Arc;
use std::time::Duration;

use common::{BatchRef, Sku, Version};
use domain::{Batch, OrderLine, Product};
use serial_test::serial;
use sqlx::PgPool;
use stock_store::{
    ConcurrencyMode, PostgresStockStore, Repository, StockStore, StockTransaction, StoreError,
};
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_products_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and a cleared table
async fn get_test_store() -> PostgresStockStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE products")
        .execute(&pool)
        .await
        .unwrap();

    PostgresStockStore::new(pool)
}

fn table() -> Product {
    Product::with_batches(
        "ASYMMETRIC-TABLE",
        vec![Batch::new("batch-1", "ASYMMETRIC-TABLE", 100, None)],
    )
}

async fn seed(store: &PostgresStockStore, product: Product) {
    let mut repo = Repository::new(store.begin(ConcurrencyMode::Optimistic).await.unwrap());
    repo.add(product);
    repo.commit().await.unwrap();
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn insert_and_load_product() {
    let store = get_test_store().await;
    seed(&store, table()).await;

    let mut tx = store.begin(ConcurrencyMode::Optimistic).await.unwrap();
    let product = tx
        .load(&Sku::new("ASYMMETRIC-TABLE"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(product.version(), Version::initial());
    assert_eq!(product.available_quantity(), 100);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn load_by_batch_ref() {
    let store = get_test_store().await;
    seed(&store, table()).await;

    let mut tx = store.begin(ConcurrencyMode::Optimistic).await.unwrap();
    let product = tx
        .load_by_batch_ref(&BatchRef::new("batch-1"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(product.sku().as_str(), "ASYMMETRIC-TABLE");

    assert!(
        tx.load_by_batch_ref(&BatchRef::new("batch-2"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn uncommitted_work_is_rolled_back_on_drop() {
    let store = get_test_store().await;
    {
        let mut repo = Repository::new(store.begin(ConcurrencyMode::Optimistic).await.unwrap());
        repo.add(table());
    }

    let mut tx = store.begin(ConcurrencyMode::Optimistic).await.unwrap();
    assert!(
        tx.load(&Sku::new("ASYMMETRIC-TABLE"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn concurrent_updates_conflict_once() {
    let store = get_test_store().await;
    seed(&store, table()).await;
    let sku = Sku::new("ASYMMETRIC-TABLE");

    let mut first = Repository::new(store.begin(ConcurrencyMode::Optimistic).await.unwrap());
    let mut second = Repository::new(store.begin(ConcurrencyMode::Optimistic).await.unwrap());

    first
        .get(&sku)
        .await
        .unwrap()
        .unwrap()
        .allocate(OrderLine::new("order-1", "ASYMMETRIC-TABLE", 10))
        .unwrap();
    second
        .get(&sku)
        .await
        .unwrap()
        .unwrap()
        .allocate(OrderLine::new("order-2", "ASYMMETRIC-TABLE", 10))
        .unwrap();

    first.commit().await.unwrap();
    let err = second.commit().await.unwrap_err();
    assert!(matches!(err, StoreError::WriteConflict { .. }));

    let mut tx = store.begin(ConcurrencyMode::Optimistic).await.unwrap();
    let product = tx.load(&sku).await.unwrap().unwrap();
    assert_eq!(product.version(), Version::new(1));
    assert_eq!(product.available_quantity(), 90);
}

#[tokio::test]
#[serial]
#[ignore = "requires Docker"]
async fn pessimistic_reader_waits_then_sees_committed_state() {
    let store = get_test_store().await;
    seed(&store, table()).await;
    let sku = Sku::new("ASYMMETRIC-TABLE");

    let mut holder = Repository::new(store.begin(ConcurrencyMode::Pessimistic).await.unwrap());
    holder
        .get(&sku)
        .await
        .unwrap()
        .unwrap()
        .allocate(OrderLine::new("order-1", "ASYMMETRIC-TABLE", 10))
        .unwrap();

    let waiter_store = store.clone();
    let waiter_sku = sku.clone();
    let mut waiter = tokio::spawn(async move {
        let mut repo = Repository::new(
            waiter_store
                .begin(ConcurrencyMode::Pessimistic)
                .await
                .unwrap(),
        );
        let product = repo.get(&waiter_sku).await.unwrap().unwrap();
        product
            .allocate(OrderLine::new("order-2", "ASYMMETRIC-TABLE", 10))
            .unwrap();
        repo.commit().await.map(|_| ())
    });

    let blocked = tokio::time::timeout(Duration::from_millis(200), &mut waiter).await;
    assert!(blocked.is_err(), "second reader should wait for the lock");

    holder.commit().await.unwrap();
    waiter.await.unwrap().unwrap();

    let mut tx = store.begin(ConcurrencyMode::Optimistic).await.unwrap();
    let product = tx.load(&sku).await.unwrap().unwrap();
    assert_eq!(product.version(), Version::new(2));
    assert_eq!(product.available_quantity(), 80);
}
