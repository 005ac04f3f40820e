use chrono::{DateTime, Utc};
use log::{debug, trace};
use settlement_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{db_types::GiftCard, SettlementError};

#[derive(Debug, FromRow)]
struct GiftCardRow {
    code: String,
    balance: i64,
    enabled: bool,
    expires_at: Option<DateTime<Utc>>,
    version: i64,
}

impl From<GiftCardRow> for GiftCard {
    fn from(row: GiftCardRow) -> Self {
        GiftCard {
            code: row.code,
            balance: Money::from(row.balance),
            enabled: row.enabled,
            expires_at: row.expires_at,
            version: row.version,
        }
    }
}

pub async fn fetch_gift_card(code: &str, conn: &mut SqliteConnection) -> Result<Option<GiftCard>, SettlementError> {
    let row: Option<GiftCardRow> =
        sqlx::query_as("SELECT * FROM gift_cards WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(row.map(GiftCard::from))
}

pub async fn insert_gift_card(card: &GiftCard, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO gift_cards (code, balance, enabled, expires_at, version)
            VALUES ($1, $2, $3, $4, 0)
        "#,
    )
    .bind(&card.code)
    .bind(card.balance.value())
    .bind(card.enabled)
    .bind(card.expires_at)
    .execute(conn)
    .await?;
    debug!("🗃️ Gift card {} issued with a balance of {}", card.code, card.balance);
    Ok(())
}

pub async fn update_versioned(card: &GiftCard, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let result = sqlx::query(
        r#"
            UPDATE gift_cards SET balance = $1, enabled = $2, version = version + 1
            WHERE code = $3 AND version = $4
        "#,
    )
    .bind(card.balance.value())
    .bind(card.enabled)
    .bind(&card.code)
    .bind(card.version)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Versioned update of gift card {} at version {}: {updated}", card.code, card.version);
    Ok(updated)
}

pub async fn fetch_version(code: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version =
        sqlx::query_scalar("SELECT version FROM gift_cards WHERE code = $1").bind(code).fetch_optional(conn).await?;
    Ok(version)
}
