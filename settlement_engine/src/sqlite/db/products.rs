use chrono::{DateTime, Utc};
use log::{debug, trace};
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{normalize_variants, Product},
    SettlementError,
};

#[derive(Debug, FromRow)]
struct ProductRow {
    id: String,
    name: String,
    is_pre_order: bool,
    variants: String,
    version: i64,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = SettlementError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let variants = normalize_variants(&row.variants)
            .map_err(|e| SettlementError::DatabaseError(format!("Product {} has malformed variants. {e}", row.id)))?;
        Ok(Product {
            id: row.id,
            name: row.name,
            is_pre_order: row.is_pre_order,
            variants,
            version: row.version,
            updated_at: row.updated_at,
        })
    }
}

pub async fn fetch_product(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, SettlementError> {
    let row: Option<ProductRow> =
        sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    row.map(Product::try_from).transpose()
}

/// Stores a product with its variants given as a raw JSON document. Either of the historical variant shapes (a list,
/// or an object keyed by SKU) is accepted, and is normalized when the product is read.
pub async fn upsert_product_json(
    product_id: &str,
    name: &str,
    is_pre_order: bool,
    variants_json: &str,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
            INSERT INTO products (id, name, is_pre_order, variants, version, updated_at)
            VALUES ($1, $2, $3, $4, 0, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                is_pre_order = excluded.is_pre_order,
                variants = excluded.variants,
                version = products.version + 1,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(product_id)
    .bind(name)
    .bind(is_pre_order)
    .bind(variants_json)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    debug!("🗃️ Product {product_id} saved");
    Ok(())
}

/// Writes the product's variants if the stored version is still `product.version`, and increments the version.
/// Returns `false` if the version check failed.
pub async fn update_versioned(product: &Product, conn: &mut SqliteConnection) -> Result<bool, SettlementError> {
    let variants = serde_json::to_string(&product.variants)?;
    let result = sqlx::query(
        r#"
            UPDATE products SET variants = $1, updated_at = $2, version = version + 1
            WHERE id = $3 AND version = $4
        "#,
    )
    .bind(variants)
    .bind(Utc::now())
    .bind(&product.id)
    .bind(product.version)
    .execute(conn)
    .await?;
    let updated = result.rows_affected() == 1;
    trace!("🗃️ Versioned update of product {} at version {}: {updated}", product.id, product.version);
    Ok(updated)
}

pub async fn fetch_version(product_id: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, sqlx::Error> {
    let version =
        sqlx::query_scalar("SELECT version FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(version)
}
