//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use common::{Money, OrderId, UserId};
use domain::{Address, Order, OrderStatus};
use sqlx::PgPool;
use store::{
    OrderStore, PostgresOrderStore, PostgresUserStore, StoreError, UserRecord, UserStore,
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

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            sqlx::raw_sql(include_str!("../../../migrations/001_create_orders.sql"))
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

/// Get fresh stores with their own pool and cleared tables
async fn get_test_stores() -> (PostgresOrderStore, PostgresUserStore) {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE orders, users")
        .execute(&pool)
        .await
        .unwrap();

    (
        PostgresOrderStore::new(pool.clone()),
        PostgresUserStore::new(pool),
    )
}

async fn seed_user(users: &PostgresUserStore) -> UserId {
    let user_id = UserId::new();
    let mut record = UserRecord::new(user_id, "ada@example.com");
    record.shipping_address = Some(Address {
        line1: "500 Market St".to_string(),
        line2: Some("Apt 4".to_string()),
        city: "San Francisco".to_string(),
        state: "CA".to_string(),
        postal_code: "94105".to_string(),
        country: "US".to_string(),
    });
    users.upsert(record).await.unwrap();
    user_id
}

fn sample_order(user_id: UserId) -> Order {
    Order::new(
        user_id,
        "ethiopia-natural",
        "Ethiopia Natural",
        Money::from_cents(2404),
        "cs_test_123",
    )
}

#[tokio::test]
#[serial_test::serial]
async fn test_create_get_roundtrip() {
    let (orders, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;

    let order = orders.create(sample_order(user_id)).await.unwrap();
    let loaded = orders.get(order.id).await.unwrap().unwrap();

    assert_eq!(loaded.id, order.id);
    assert_eq!(loaded.status, OrderStatus::Pending);
    assert_eq!(loaded.price, Money::from_cents(2404));
    assert_eq!(loaded.session_id, "cs_test_123");
    assert!(loaded.error_details.is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn test_get_missing_order() {
    let (orders, _) = get_test_stores().await;
    assert!(orders.get(OrderId::new()).await.unwrap().is_none());
}

#[tokio::test]
#[serial_test::serial]
async fn test_list_for_user_newest_first() {
    let (orders, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;
    let other = seed_user(&users).await;

    let first = orders.create(sample_order(user_id)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    let second = orders.create(sample_order(user_id)).await.unwrap();
    orders.create(sample_order(other)).await.unwrap();

    let listed = orders.list_for_user(user_id).await.unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
}

#[tokio::test]
#[serial_test::serial]
async fn test_status_lifecycle_and_idempotency() {
    let (orders, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;
    let order = orders.create(sample_order(user_id)).await.unwrap();

    orders
        .update_status(order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    orders
        .update_status(order.id, OrderStatus::Failed, Some("page error"))
        .await
        .unwrap();

    // exact repeat must not duplicate the narrative
    let repeated = orders
        .update_status(order.id, OrderStatus::Failed, Some("page error"))
        .await
        .unwrap();
    assert_eq!(repeated.error_details.as_deref(), Some("page error"));

    let refunded = orders
        .update_status(order.id, OrderStatus::Refunded, None)
        .await
        .unwrap();
    assert_eq!(refunded.status, OrderStatus::Refunded);
    assert_eq!(refunded.error_details.as_deref(), Some("page error"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_invalid_transition_rejected() {
    let (orders, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;
    let order = orders.create(sample_order(user_id)).await.unwrap();

    orders
        .update_status(order.id, OrderStatus::Processing, None)
        .await
        .unwrap();
    orders
        .update_status(order.id, OrderStatus::Completed, None)
        .await
        .unwrap();

    let err = orders
        .update_status(order.id, OrderStatus::Processing, None)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Domain(_)));

    // the terminal row is untouched
    let loaded = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.status, OrderStatus::Completed);
}

#[tokio::test]
#[serial_test::serial]
async fn test_card_details_survive_failure() {
    let (orders, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;
    let order = orders.create(sample_order(user_id)).await.unwrap();

    orders
        .set_card_details(order.id, "ich_123", "ic_456")
        .await
        .unwrap();
    orders
        .update_status(order.id, OrderStatus::Failed, Some("issuer timeout"))
        .await
        .unwrap();

    let loaded = orders.get(order.id).await.unwrap().unwrap();
    assert_eq!(loaded.cardholder_id.as_deref(), Some("ich_123"));
    assert_eq!(loaded.card_id.as_deref(), Some("ic_456"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_user_record_roundtrip() {
    let (_, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;

    let loaded = users.get(user_id).await.unwrap().unwrap();
    assert_eq!(loaded.email, "ada@example.com");
    assert!(loaded.cardholder_id.is_none());

    let address = loaded.shipping_address.unwrap();
    assert_eq!(address.line1, "500 Market St");
    assert_eq!(address.line2.as_deref(), Some("Apt 4"));
}

#[tokio::test]
#[serial_test::serial]
async fn test_billing_identity_cache() {
    let (_, users) = get_test_stores().await;
    let user_id = seed_user(&users).await;

    users
        .set_billing_identity(user_id, "ich_123", "cus_456")
        .await
        .unwrap();

    let loaded = users.get(user_id).await.unwrap().unwrap();
    assert_eq!(loaded.cardholder_id.as_deref(), Some("ich_123"));
    assert_eq!(loaded.customer_id.as_deref(), Some("cus_456"));

    let err = users
        .set_billing_identity(UserId::new(), "ich_x", "cus_x")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UserNotFound(_)));
}
