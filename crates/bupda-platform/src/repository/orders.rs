use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bupda_core::{
    Order, OrderPatch, OrderStatus, OrderStore, PaymentMethod, PaymentStatus,
};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

const ORDER_COLUMNS: &str = r#"
    id, id_user, id_desa, number_order, product_type, order_type,
    full_name, email, phone, shipping_cost, payment_cash, payment_fee,
    sub_total, total_bill, payment_method, payment_channel, payment_name,
    payment_status, order_status, paylater_paid_status, ordered_at,
    payment_due_at, payment_success_at, completed_at, canceled_at
"#;

// not yet marked paid and never canceled
const UNPAID_PAYLATER: &str = "payment_method = 'paylater' AND paylater_paid_status = 0 AND order_status <> 9";

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn create_order(&self, order: &Order) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_order(&mut conn, order).await
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders_transaction WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_number(&self, number_order: &str) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders_transaction WHERE number_order = $1"
        ))
        .bind(number_order)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_by_user(&self, id_user: Uuid, status: Option<OrderStatus>) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders_transaction
            WHERE id_user = $1
              AND ($2::SMALLINT IS NULL OR order_status = $2)
            ORDER BY ordered_at DESC
            "#
        ))
        .bind(id_user)
        .bind(status.map(|status| status.code()))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn find_unpaid_paylater(&self, id_user: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders_transaction
            WHERE id_user = $1 AND {UNPAID_PAYLATER}
            ORDER BY ordered_at ASC, number_order ASC
            "#
        ))
        .bind(id_user)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn find_oldest_unpaid_paylater(&self, id_user: Uuid) -> Result<Option<Order>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders_transaction
            WHERE id_user = $1 AND {UNPAID_PAYLATER}
            ORDER BY ordered_at ASC, number_order ASC
            LIMIT 1
            "#
        ))
        .bind(id_user)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(order_from_row).transpose()
    }

    async fn find_paylater_between(
        &self,
        id_user: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ORDER_COLUMNS}
            FROM orders_transaction
            WHERE id_user = $1
              AND payment_method = 'paylater'
              AND order_status <> 9
              AND ordered_at >= $2
              AND ordered_at < $3
            "#
        ))
        .bind(id_user)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(order_from_row).collect()
    }

    async fn update_order(&self, id: Uuid, patch: &OrderPatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let result = sqlx::query(
            r#"
            UPDATE orders_transaction
            SET order_status = COALESCE($2, order_status),
                payment_status = COALESCE($3, payment_status),
                payment_success_at = COALESCE($4, payment_success_at),
                completed_at = COALESCE($5, completed_at),
                canceled_at = COALESCE($6, canceled_at)
            WHERE id = $1 AND order_status NOT IN (5, 9)
            "#,
        )
        .bind(id)
        .bind(patch.order_status.map(|status| status.code()))
        .bind(patch.payment_status.map(|status| status.code()))
        .bind(patch.payment_success_at)
        .bind(patch.completed_at)
        .bind(patch.canceled_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn mark_paylater_paid(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(&format!(
            "UPDATE orders_transaction SET paylater_paid_status = 1 WHERE id = $1 AND {UNPAID_PAYLATER}"
        ))
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_bill_settlement(&self, id_user: Uuid, settlement: &Order) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        insert_order(&mut tx, settlement).await?;
        let marked = sqlx::query(&format!(
            "UPDATE orders_transaction SET paylater_paid_status = 1 WHERE id_user = $1 AND {UNPAID_PAYLATER}"
        ))
        .bind(id_user)
        .execute(&mut *tx)
        .await
        .context("failed to mark paylater orders paid")?
        .rows_affected();

        tx.commit().await?;
        Ok(marked)
    }
}

async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO orders_transaction (
            id, id_user, id_desa, number_order, product_type, order_type,
            full_name, email, phone, shipping_cost, payment_cash, payment_fee,
            sub_total, total_bill, payment_method, payment_channel, payment_name,
            payment_status, order_status, paylater_paid_status, ordered_at,
            payment_due_at, payment_success_at, completed_at, canceled_at
        )
        VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
            $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25
        )
        "#,
    )
    .bind(order.id)
    .bind(order.id_user)
    .bind(order.id_desa)
    .bind(&order.number_order)
    .bind(&order.product_type)
    .bind(order.order_type)
    .bind(&order.full_name)
    .bind(&order.email)
    .bind(&order.phone)
    .bind(order.shipping_cost)
    .bind(order.payment_cash)
    .bind(order.payment_fee)
    .bind(order.sub_total)
    .bind(order.total_bill)
    .bind(order.payment_method.as_str())
    .bind(&order.payment_channel)
    .bind(&order.payment_name)
    .bind(order.payment_status.code())
    .bind(order.order_status.code())
    .bind(i16::from(order.paylater_paid))
    .bind(order.ordered_at)
    .bind(order.payment_due_at)
    .bind(order.payment_success_at)
    .bind(order.completed_at)
    .bind(order.canceled_at)
    .execute(&mut *conn)
    .await
    .with_context(|| format!("failed to insert order {}", order.number_order))?;

    Ok(())
}

fn order_from_row(row: &PgRow) -> Result<Order> {
    let method: String = row.try_get("payment_method")?;
    let payment_status: i16 = row.try_get("payment_status")?;
    let order_status: i16 = row.try_get("order_status")?;
    let paylater_paid: i16 = row.try_get("paylater_paid_status")?;

    Ok(Order {
        id: row.try_get("id")?,
        id_user: row.try_get("id_user")?,
        id_desa: row.try_get("id_desa")?,
        number_order: row.try_get("number_order")?,
        product_type: row.try_get("product_type")?,
        order_type: row.try_get("order_type")?,
        full_name: row.try_get("full_name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        shipping_cost: row.try_get("shipping_cost")?,
        payment_cash: row.try_get("payment_cash")?,
        payment_fee: row.try_get("payment_fee")?,
        sub_total: row.try_get("sub_total")?,
        total_bill: row.try_get("total_bill")?,
        payment_method: PaymentMethod::from_code(&method)
            .ok_or_else(|| anyhow!("unknown payment method {method}"))?,
        payment_channel: row.try_get("payment_channel")?,
        payment_name: row.try_get("payment_name")?,
        payment_status: PaymentStatus::from_code(payment_status)
            .ok_or_else(|| anyhow!("unknown payment status {payment_status}"))?,
        order_status: OrderStatus::from_code(order_status)
            .ok_or_else(|| anyhow!("unknown order status {order_status}"))?,
        paylater_paid: paylater_paid == 1,
        ordered_at: row.try_get("ordered_at")?,
        payment_due_at: row.try_get("payment_due_at")?,
        payment_success_at: row.try_get("payment_success_at")?,
        completed_at: row.try_get("completed_at")?,
        canceled_at: row.try_get("canceled_at")?,
    })
}
