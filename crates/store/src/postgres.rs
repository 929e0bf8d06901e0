//! PostgreSQL-backed store implementations.

use async_trait::async_trait;
use common::{Money, OrderId, UserId};
use domain::{Address, Order, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::StoreError;
use crate::store::{OrderStore, Result, UserRecord, UserStore};

/// PostgreSQL-backed order store.
#[derive(Clone)]
pub struct PostgresOrderStore {
    pool: PgPool,
}

impl PostgresOrderStore {
    /// Creates a new PostgreSQL order store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let status_text: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_text).ok_or_else(|| StoreError::CorruptRow {
            entity: "order",
            detail: format!("unknown status {status_text:?}"),
        })?;

        let price_text: String = row.try_get("price")?;
        let price = Money::parse_decimal(&price_text).map_err(|e| StoreError::CorruptRow {
            entity: "order",
            detail: e.to_string(),
        })?;

        Ok(Order {
            id: OrderId::from_uuid(row.try_get::<Uuid, _>("id")?),
            user_id: UserId::from_uuid(row.try_get::<Uuid, _>("user_id")?),
            product_handle: row.try_get("product_handle")?,
            product_name: row.try_get("product_name")?,
            price,
            status,
            session_id: row.try_get("session_id")?,
            cardholder_id: row.try_get("cardholder_id")?,
            card_id: row.try_get("card_id")?,
            error_details: row.try_get("error_details")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

#[async_trait]
impl OrderStore for PostgresOrderStore {
    async fn create(&self, order: Order) -> Result<Order> {
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, product_handle, product_name, price, status,
                                session_id, cardholder_id, card_id, error_details,
                                created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user_id.as_uuid())
        .bind(&order.product_handle)
        .bind(&order.product_name)
        .bind(order.price.to_decimal_string())
        .bind(order.status.as_str())
        .bind(&order.session_id)
        .bind(&order.cardholder_id)
        .bind(&order.card_id)
        .bind(&order.error_details)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = $1")
            .bind(order_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_order).transpose()
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_order).collect()
    }

    async fn set_card_details(
        &self,
        order_id: OrderId,
        cardholder_id: &str,
        card_id: &str,
    ) -> Result<Order> {
        let row = sqlx::query(
            r#"
            UPDATE orders
            SET cardholder_id = $2, card_id = $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(order_id.as_uuid())
        .bind(cardholder_id)
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::OrderNotFound(order_id))?;

        Self::row_to_order(&row)
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        error_details: Option<&str>,
    ) -> Result<Order> {
        // Lock the row so the transition check and the write are atomic
        // against a concurrent update of the same order.
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(order_id))?;

        let mut order = Self::row_to_order(&row)?;
        let changed = order.apply_status(status, error_details)?;

        if changed {
            sqlx::query(
                r#"
                UPDATE orders
                SET status = $2, error_details = $3, updated_at = $4
                WHERE id = $1
                "#,
            )
            .bind(order_id.as_uuid())
            .bind(order.status.as_str())
            .bind(&order.error_details)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(order)
    }
}

/// PostgreSQL-backed user store.
#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    /// Creates a new PostgreSQL user store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn row_to_user(row: &PgRow) -> Result<UserRecord> {
        let shipping_address = match (
            row.try_get::<Option<String>, _>("address_line1")?,
            row.try_get::<Option<String>, _>("city")?,
            row.try_get::<Option<String>, _>("state")?,
            row.try_get::<Option<String>, _>("postal_code")?,
            row.try_get::<Option<String>, _>("country")?,
        ) {
            (Some(line1), Some(city), Some(state), Some(postal_code), Some(country)) => {
                Some(Address {
                    line1,
                    line2: row.try_get("address_line2")?,
                    city,
                    state,
                    postal_code,
                    country,
                })
            }
            _ => None,
        };

        Ok(UserRecord {
            id: UserId::from_uuid(row.try_get::<Uuid, _>("id")?),
            email: row.try_get("email")?,
            cardholder_id: row.try_get("cardholder_id")?,
            customer_id: row.try_get("customer_id")?,
            shipping_address,
        })
    }
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = $1")
            .bind(user_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_user).transpose()
    }

    async fn upsert(&self, record: UserRecord) -> Result<()> {
        let address = record.shipping_address.as_ref();
        sqlx::query(
            r#"
            INSERT INTO users (id, email, cardholder_id, customer_id,
                               address_line1, address_line2, city, state, postal_code, country)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (id) DO UPDATE
            SET email = EXCLUDED.email,
                cardholder_id = EXCLUDED.cardholder_id,
                customer_id = EXCLUDED.customer_id,
                address_line1 = EXCLUDED.address_line1,
                address_line2 = EXCLUDED.address_line2,
                city = EXCLUDED.city,
                state = EXCLUDED.state,
                postal_code = EXCLUDED.postal_code,
                country = EXCLUDED.country
            "#,
        )
        .bind(record.id.as_uuid())
        .bind(&record.email)
        .bind(&record.cardholder_id)
        .bind(&record.customer_id)
        .bind(address.map(|a| a.line1.clone()))
        .bind(address.and_then(|a| a.line2.clone()))
        .bind(address.map(|a| a.city.clone()))
        .bind(address.map(|a| a.state.clone()))
        .bind(address.map(|a| a.postal_code.clone()))
        .bind(address.map(|a| a.country.clone()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_billing_identity(
        &self,
        user_id: UserId,
        cardholder_id: &str,
        customer_id: &str,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE users SET cardholder_id = $2, customer_id = $3 WHERE id = $1",
        )
        .bind(user_id.as_uuid())
        .bind(cardholder_id)
        .bind(customer_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::UserNotFound(user_id));
        }
        Ok(())
    }

    async fn shipping_address(&self, user_id: UserId) -> Result<Option<Address>> {
        Ok(self.get(user_id).await?.and_then(|u| u.shipping_address))
    }
}
