use chrono::{DateTime, Utc};
use log::{debug, trace};
use settlement_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{LifecycleStatus, NewOrder, Order, OrderTotals, PaymentMeta, PaymentStatus, SettlementId},
    SettlementError,
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: String,
    user_id: Option<String>,
    outlet_id: Option<String>,
    items: String,
    subtotal: i64,
    discount: i64,
    loyalty_discount: i64,
    gift_card_discount: i64,
    total_amount: i64,
    is_pre_order: bool,
    full_order_value: Option<i64>,
    gift_card_code: Option<String>,
    points_used: i64,
    sales_agent: Option<String>,
    status: String,
    payment_status: String,
    status_reason: Option<String>,
    payment_meta: Option<String>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = SettlementError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let payment_meta: Option<PaymentMeta> = row.payment_meta.as_deref().map(serde_json::from_str).transpose()?;
        Ok(Order {
            id: SettlementId(row.id),
            user_id: row.user_id,
            outlet_id: row.outlet_id,
            items: serde_json::from_str(&row.items)?,
            totals: OrderTotals {
                subtotal: Money::from(row.subtotal),
                discount: Money::from(row.discount),
                loyalty_discount: Money::from(row.loyalty_discount),
                gift_card_discount: Money::from(row.gift_card_discount),
                total_amount: Money::from(row.total_amount),
            },
            is_pre_order: row.is_pre_order,
            full_order_value: row.full_order_value.map(Money::from),
            gift_card_code: row.gift_card_code,
            points_used: row.points_used,
            sales_agent: row.sales_agent,
            status: row.status.parse::<LifecycleStatus>()?,
            payment_status: row.payment_status.parse::<PaymentStatus>()?,
            status_reason: row.status_reason,
            payment_meta,
            version: row.version,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub async fn fetch_order(id: &SettlementId, conn: &mut SqliteConnection) -> Result<Option<Order>, SettlementError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    row.map(Order::try_from).transpose()
}

/// Stores a new order in `awaiting_payment`. This is the page layer's job in production, and is exposed here for
/// seeding and tests.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, SettlementError> {
    let now = Utc::now();
    let items = serde_json::to_string(&order.items)?;
    sqlx::query(
        r#"
            INSERT INTO orders (
                id, user_id, outlet_id, items, subtotal, discount, loyalty_discount, gift_card_discount,
                total_amount, is_pre_order, full_order_value, gift_card_code, points_used, sales_agent,
                status, payment_status, version, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, 0, $17, $17);
        "#,
    )
    .bind(order.id.as_str())
    .bind(&order.user_id)
    .bind(&order.outlet_id)
    .bind(items)
    .bind(order.totals.subtotal.value())
    .bind(order.totals.discount.value())
    .bind(order.totals.loyalty_discount.value())
    .bind(order.totals.gift_card_discount.value())
    .bind(order.totals.total_amount.value())
    .bind(order.is_pre_order)
    .bind(order.full_order_value.map(|v| v.value()))
    .bind(&order.gift_card_code)
    .bind(order.points_used)
    .bind(&order.sales_agent)
    .bind(LifecycleStatus::AwaitingPayment.as_str())
    .bind(PaymentStatus::Pending.to_string())
    .bind(now)
    .execute(&mut *conn)
    .await?;
    debug!("🗃️ Order {} inserted", order.id);
    fetch_order(&order.id, conn).await?.ok_or_else(|| SettlementError::not_found("order", &order.id))
}

/// Writes the order's mutable fields if, and only if, the stored version is still `order.version`. The stored version
/// is incremented. Returns `false` if the version check failed.
pub async fn update_versioned(order: &Order, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let payment_meta = order.payment_meta.as_ref().map(serde_json::to_string).transpose()?;
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                payment_status = $2,
                status_reason = $3,
                payment_meta = $4,
                updated_at = $5,
                version = version + 1
            WHERE id = $6 AND version = $7
        "#,
    )
    .bind(order.status.as_str())
    .bind(order.payment_status.to_string())
    .bind(&order.status_reason)
    .bind(payment_meta)
    .bind(order.updated_at)
    .bind(order.id.as_str())
    .bind(order.version)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Versioned update of order {} at version {}: {updated}", order.id, order.version);
    Ok(updated)
}

pub async fn fetch_version(id: &SettlementId, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version = sqlx::query_scalar("SELECT version FROM orders WHERE id = $1")
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?;
    Ok(version)
}

/// Cancels the order if it is still waiting for a payment. Returns `true` if the order was canceled.
pub async fn cancel_if_pending(
    id: &SettlementId,
    reason: &str,
    conn: &mut SqliteConnection,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                status = $1,
                payment_status = $2,
                status_reason = $3,
                updated_at = $4,
                version = version + 1
            WHERE id = $5 AND status IN ($6, $7)
        "#,
    )
    .bind(LifecycleStatus::Canceled.as_str())
    .bind(PaymentStatus::Failed.to_string())
    .bind(reason)
    .bind(Utc::now())
    .bind(id.as_str())
    .bind(LifecycleStatus::AwaitingPayment.as_str())
    .bind(LifecycleStatus::AwaitingFinalPayment.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
