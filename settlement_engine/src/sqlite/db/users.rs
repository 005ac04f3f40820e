use log::{debug, trace};
use settlement_common::Money;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{MembershipTier, UserProfile},
    SettlementError,
};

#[derive(Debug, FromRow)]
struct UserRow {
    id: String,
    loyalty_points: i64,
    total_spent: i64,
    membership_tier: String,
    version: i64,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = SettlementError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(UserProfile {
            id: row.id,
            loyalty_points: row.loyalty_points,
            total_spent: Money::from(row.total_spent),
            membership_tier: row.membership_tier.parse::<MembershipTier>()?,
            version: row.version,
        })
    }
}

pub async fn fetch_user(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<UserProfile>, SettlementError> {
    let row: Option<UserRow> = sqlx::query_as(
        "SELECT id, loyalty_points, total_spent, membership_tier, version FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(conn)
    .await?;
    row.map(UserProfile::try_from).transpose()
}

/// Creates the user with a zero points balance, or resets an existing user's spend and tier. Points are never set
/// directly; they only move through the points history.
pub async fn upsert_user(
    user_id: &str,
    total_spent: Money,
    tier: MembershipTier,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO users (id, loyalty_points, total_spent, membership_tier, version)
            VALUES ($1, 0, $2, $3, 0)
            ON CONFLICT (id) DO UPDATE SET
                total_spent = excluded.total_spent,
                membership_tier = excluded.membership_tier,
                version = users.version + 1
        "#,
    )
    .bind(user_id)
    .bind(total_spent.value())
    .bind(tier.to_string())
    .execute(conn)
    .await?;
    debug!("🗃️ User {user_id} saved with tier {tier}");
    Ok(())
}

pub async fn update_versioned(user: &UserProfile, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let result = sqlx::query(
        r#"
            UPDATE users SET
                loyalty_points = $1,
                total_spent = $2,
                membership_tier = $3,
                version = version + 1
            WHERE id = $4 AND version = $5
        "#,
    )
    .bind(user.loyalty_points)
    .bind(user.total_spent.value())
    .bind(user.membership_tier.to_string())
    .bind(&user.id)
    .bind(user.version)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Versioned update of user {} at version {}: {updated}", user.id, user.version);
    Ok(updated)
}

pub async fn fetch_version(user_id: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version =
        sqlx::query_scalar("SELECT version FROM users WHERE id = $1").bind(user_id).fetch_optional(conn).await?;
    Ok(version)
}
