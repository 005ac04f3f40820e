//! Per-outlet, per-variant stock counters.
//!
//! The ledger never opens its own transaction. It reads and stages through the caller's [`UnitOfWork`], so stock
//! movements commit, or vanish, together with everything else in the settlement.
use std::collections::BTreeMap;

use log::*;

use crate::{
    db_types::{LineItem, Variant},
    settlement_api::unit_of_work::UnitOfWork,
    traits::SettlementDatabase,
    SettlementError,
};

/// Stock taken from one variant at one outlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockMovement {
    pub product_id: String,
    pub sku: String,
    pub outlet_id: String,
    pub quantity: i64,
}

/// Deducts the quantities in `lines` from outlet and global stock.
///
/// Each line is fulfilled by its own outlet if it names one, or by `default_outlet` otherwise. Quantities for the same
/// variant and outlet are added together before they are checked. Lines for pre-order products are skipped. If any
/// line cannot be fulfilled, nothing is staged and the first failure is returned.
///
/// Returns the movements that were staged.
pub async fn reserve_and_commit<B: SettlementDatabase>(
    uow: &mut UnitOfWork<'_, B>,
    default_outlet: Option<&str>,
    lines: &[LineItem],
) -> Result<Vec<StockMovement>, SettlementError> {
    // product -> (sku, outlet) -> quantity
    let mut requested: BTreeMap<&str, BTreeMap<(&str, Option<&str>), i64>> = BTreeMap::new();
    for line in lines {
        if line.quantity <= 0 {
            return Err(SettlementError::ValidationRejected(format!(
                "Line for {}/{} has a non-positive quantity of {}",
                line.product_id, line.sku, line.quantity
            )));
        }
        let outlet = line.outlet_id.as_deref().or(default_outlet);
        let total = requested.entry(&line.product_id).or_default().entry((&line.sku, outlet)).or_default();
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            SettlementError::ValidationRejected(format!(
                "The quantities requested for {}/{} add up to more than can be counted",
                line.product_id, line.sku
            ))
        })?;
    }

    let mut staged = Vec::with_capacity(requested.len());
    let mut movements = Vec::new();
    for (product_id, wanted) in requested {
        let mut product = uow.product(product_id).await?;
        if product.is_pre_order {
            trace!("📦️ Product {product_id} is a pre-order. Skipping stock deduction");
            continue;
        }
        for ((sku, outlet), quantity) in wanted {
            let outlet = outlet.ok_or_else(|| {
                SettlementError::ValidationRejected(format!("No outlet has been assigned to fulfil {product_id}/{sku}"))
            })?;
            let variant = product.variant_mut(sku).ok_or_else(|| SettlementError::VariantNotFound {
                product_id: product_id.to_string(),
                sku: sku.to_string(),
            })?;
            let available = variant.outlet_stock(outlet);
            if available < quantity {
                debug!("📦️ {product_id}/{sku} at {outlet}: {available} in stock, {quantity} requested");
                return Err(SettlementError::InsufficientStock {
                    product_id: product_id.to_string(),
                    sku: sku.to_string(),
                    outlet_id: outlet.to_string(),
                    available,
                    requested: quantity,
                });
            }
            adjust(variant, outlet, -quantity)?;
            movements.push(StockMovement {
                product_id: product_id.to_string(),
                sku: sku.to_string(),
                outlet_id: outlet.to_string(),
                quantity,
            });
        }
        staged.push(product);
    }
    for product in staged {
        uow.stage_product(product);
    }
    debug!("📦️ Staged {} stock movements", movements.len());
    Ok(movements)
}

/// Adds received goods to an outlet's stock. The variant must exist; the outlet entry is created if needed.
pub async fn receive<B: SettlementDatabase>(
    uow: &mut UnitOfWork<'_, B>,
    product_id: &str,
    sku: &str,
    outlet_id: &str,
    quantity: i64,
) -> Result<Variant, SettlementError> {
    if quantity <= 0 {
        return Err(SettlementError::ValidationRejected(format!(
            "Received quantity must be positive, but was {quantity}"
        )));
    }
    let mut product = uow.product(product_id).await?;
    let variant = product.variant_mut(sku).ok_or_else(|| SettlementError::VariantNotFound {
        product_id: product_id.to_string(),
        sku: sku.to_string(),
    })?;
    adjust(variant, outlet_id, quantity)?;
    let result = variant.clone();
    uow.stage_product(product);
    Ok(result)
}

/// Moves outlet and global stock together, so the two never drift apart. Neither counter is touched if either would
/// overflow.
fn adjust(variant: &mut Variant, outlet_id: &str, delta: i64) -> Result<(), SettlementError> {
    let overflow = || {
        SettlementError::ValidationRejected(format!(
            "Adjusting {} stock at {outlet_id} by {delta} overflows the stock counter",
            variant.sku
        ))
    };
    let outlet_stock = variant.outlet_stock(outlet_id).checked_add(delta).ok_or_else(overflow)?;
    let stock = variant.stock.checked_add(delta).ok_or_else(overflow)?;
    variant.outlet_stocks.insert(outlet_id.to_string(), outlet_stock);
    variant.stock = stock;
    Ok(())
}
