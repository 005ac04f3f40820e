use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{NewPointsEntry, PointsEntry, PointsEntryType},
    SettlementError,
};

#[derive(Debug, FromRow)]
struct PointsEntryRow {
    id: i64,
    user_id: String,
    delta: i64,
    entry_type: String,
    reason: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PointsEntryRow> for PointsEntry {
    type Error = SettlementError;

    fn try_from(row: PointsEntryRow) -> Result<Self, Self::Error> {
        Ok(PointsEntry {
            id: row.id,
            user_id: row.user_id,
            delta: row.delta,
            entry_type: row.entry_type.parse::<PointsEntryType>()?,
            reason: row.reason,
            created_at: row.created_at,
        })
    }
}

/// Appends an entry to the user's points history. The history table rejects updates and deletes.
pub async fn append_entry(entry: &NewPointsEntry, conn: &mut SqliteConnection) -> Result<i64, sqlx::Error> {
    let id = sqlx::query_scalar(
        r#"
            INSERT INTO points_history (user_id, delta, entry_type, reason, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
        "#,
    )
    .bind(&entry.user_id)
    .bind(entry.delta)
    .bind(entry.entry_type.to_string())
    .bind(&entry.reason)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(id)
}

pub async fn fetch_history(user_id: &str, conn: &mut SqliteConnection) -> Result<Vec<PointsEntry>, SettlementError> {
    let rows: Vec<PointsEntryRow> = sqlx::query_as("SELECT * FROM points_history WHERE user_id = $1 ORDER BY id ASC")
        .bind(user_id)
        .fetch_all(conn)
        .await?;
    rows.into_iter().map(PointsEntry::try_from).collect()
}
