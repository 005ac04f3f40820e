use chrono::{DateTime, Utc};
use log::debug;
use settlement_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{LifecycleStatus, OrderTotals, PaymentStatus, PosSale, SettlementId},
    SettlementError,
};

#[derive(Debug, FromRow)]
struct PosSaleRow {
    id: String,
    outlet_id: String,
    user_id: Option<String>,
    items: String,
    subtotal: i64,
    discount: i64,
    loyalty_discount: i64,
    gift_card_discount: i64,
    total_amount: i64,
    gift_card_code: Option<String>,
    points_used: i64,
    points_earned: i64,
    sales_agent: Option<String>,
    payment_method: String,
    status: String,
    payment_status: String,
    status_reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<PosSaleRow> for PosSale {
    type Error = SettlementError;

    fn try_from(row: PosSaleRow) -> Result<Self, Self::Error> {
        Ok(PosSale {
            id: SettlementId(row.id),
            outlet_id: row.outlet_id,
            user_id: row.user_id,
            items: serde_json::from_str(&row.items)?,
            totals: OrderTotals {
                subtotal: Money::from(row.subtotal),
                discount: Money::from(row.discount),
                loyalty_discount: Money::from(row.loyalty_discount),
                gift_card_discount: Money::from(row.gift_card_discount),
                total_amount: Money::from(row.total_amount),
            },
            gift_card_code: row.gift_card_code,
            points_used: row.points_used,
            points_earned: row.points_earned,
            sales_agent: row.sales_agent,
            payment_method: row.payment_method,
            status: row.status.parse::<LifecycleStatus>()?,
            payment_status: row.payment_status.parse::<PaymentStatus>()?,
            status_reason: row.status_reason,
            created_at: row.created_at,
        })
    }
}

pub async fn fetch_pos_sale(
    id: &SettlementId,
    conn: &mut SqliteConnection,
) -> Result<Option<PosSale>, SettlementError> {
    let row: Option<PosSaleRow> =
        sqlx::query_as("SELECT * FROM pos_sales WHERE id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    row.map(PosSale::try_from).transpose()
}

/// Inserts the sale. With `ignore_existing`, an existing sale with the same id is left as it is, and `false` is
/// returned. Otherwise a duplicate id means another terminal recorded the sale first, and is reported as contention.
pub async fn insert_pos_sale(
    sale: &PosSale,
    ignore_existing: bool,
    conn: &mut SqliteConnection,
) -> Result<bool, SettlementError> {
    let conflict = if ignore_existing { "ON CONFLICT (id) DO NOTHING" } else { "" };
    let sql = format!(
        r#"
            INSERT INTO pos_sales (
                id, outlet_id, user_id, items, subtotal, discount, loyalty_discount, gift_card_discount,
                total_amount, gift_card_code, points_used, points_earned, sales_agent, payment_method,
                status, payment_status, status_reason, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            {conflict};
        "#
    );
    let items = serde_json::to_string(&sale.items)?;
    let result = sqlx::query(&sql)
        .bind(sale.id.as_str())
        .bind(&sale.outlet_id)
        .bind(&sale.user_id)
        .bind(items)
        .bind(sale.totals.subtotal.value())
        .bind(sale.totals.discount.value())
        .bind(sale.totals.loyalty_discount.value())
        .bind(sale.totals.gift_card_discount.value())
        .bind(sale.totals.total_amount.value())
        .bind(&sale.gift_card_code)
        .bind(sale.points_used)
        .bind(sale.points_earned)
        .bind(&sale.sales_agent)
        .bind(&sale.payment_method)
        .bind(sale.status.as_str())
        .bind(sale.payment_status.to_string())
        .bind(&sale.status_reason)
        .bind(sale.created_at)
        .execute(conn)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                SettlementError::Contention(format!("POS sale {} was recorded concurrently", sale.id))
            },
            e => e.into(),
        })?;
    let inserted = result.rows_affected() == 1;
    if inserted {
        debug!("🗃️ POS sale {} recorded as {}", sale.id, sale.status);
    }
    Ok(inserted)
}
