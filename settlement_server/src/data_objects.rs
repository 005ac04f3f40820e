use std::fmt::Display;

use serde::{Deserialize, Serialize};
use settlement_common::{decimal_serde, Money};
use settlement_engine::db_types::{LineItem, NewPosSale, Order, OrderTotals, SettlementId};

/// Response body for POS and back-office requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

/// Response body for the gateway's payment notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub status: CallbackStatus,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl CallbackResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { status: CallbackStatus::Success, message: message.to_string() }
    }

    pub fn failed<S: Display>(message: S) -> Self {
        Self { status: CallbackStatus::Failed, message: message.to_string() }
    }
}

/// The form the payment gateway posts to the IPN endpoint. Only these fields are read; everything else the gateway
/// sends is ignored, and none of it is trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IpnForm {
    pub tran_id: Option<String>,
    pub val_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosLine {
    pub product_id: String,
    pub sku: String,
    pub quantity: i64,
    #[serde(with = "decimal_serde")]
    pub unit_price: Money,
    #[serde(default)]
    pub outlet_id: Option<String>,
}

/// A completed sale, as sent by a POS terminal. Amounts are decimal numbers or strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PosSaleRequest {
    pub sale_id: String,
    pub outlet_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub items: Vec<PosLine>,
    #[serde(with = "decimal_serde")]
    pub subtotal: Money,
    #[serde(default, with = "decimal_serde")]
    pub discount: Money,
    #[serde(default, with = "decimal_serde")]
    pub loyalty_discount: Money,
    #[serde(default, with = "decimal_serde")]
    pub gift_card_discount: Money,
    #[serde(with = "decimal_serde")]
    pub total: Money,
    #[serde(default)]
    pub gift_card_code: Option<String>,
    #[serde(default)]
    pub points_used: i64,
    #[serde(default)]
    pub sales_agent: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

impl TryFrom<PosSaleRequest> for NewPosSale {
    type Error = String;

    fn try_from(req: PosSaleRequest) -> Result<Self, Self::Error> {
        let id = req.sale_id.parse::<SettlementId>().map_err(|e| e.to_string())?;
        if req.outlet_id.trim().is_empty() {
            return Err(format!("POS sale {id} does not name an outlet"));
        }
        let items = req
            .items
            .into_iter()
            .map(|l| LineItem {
                product_id: l.product_id,
                sku: l.sku,
                quantity: l.quantity,
                unit_price: l.unit_price,
                outlet_id: l.outlet_id,
            })
            .collect();
        let mut sale = NewPosSale::new(id, req.outlet_id, items);
        sale.user_id = req.user_id.filter(|s| !s.trim().is_empty());
        sale.totals = OrderTotals {
            subtotal: req.subtotal,
            discount: req.discount,
            loyalty_discount: req.loyalty_discount,
            gift_card_discount: req.gift_card_discount,
            total_amount: req.total,
        };
        sale.gift_card_code = req.gift_card_code.filter(|s| !s.trim().is_empty());
        sale.points_used = req.points_used;
        sale.sales_agent = req.sales_agent;
        if let Some(method) = req.payment_method {
            sale.payment_method = method;
        }
        Ok(sale)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockReceipt {
    pub product_id: String,
    pub sku: String,
    pub outlet_id: String,
    pub quantity: i64,
}

/// What the storefront needs to know to show the progress of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusResponse {
    pub order_id: String,
    pub status: String,
    pub payment_status: String,
    pub reason: Option<String>,
    #[serde(with = "decimal_serde")]
    pub amount_due: Money,
}

impl From<Order> for OrderStatusResponse {
    fn from(order: Order) -> Self {
        let amount_due = match order.status.is_pre_settlement() {
            true => order.expected_payable(),
            false => Money::zero(),
        };
        Self {
            order_id: order.id.as_str().to_string(),
            status: order.status.to_string(),
            payment_status: order.payment_status.to_string(),
            reason: order.status_reason,
            amount_due,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pos_request_conversion() {
        let json = r#"{
            "sale_id": "POS-1",
            "outlet_id": "dhaka",
            "user_id": "",
            "items": [{"product_id": "p1", "sku": "V1", "quantity": 2, "unit_price": "50.00"}],
            "subtotal": 100,
            "gift_card_discount": "20.5",
            "total": 79.5,
            "gift_card_code": "GC1"
        }"#;
        let req: PosSaleRequest = serde_json::from_str(json).unwrap();
        let sale = NewPosSale::try_from(req).unwrap();
        assert_eq!(sale.id.as_str(), "POS-1");
        assert!(sale.user_id.is_none());
        assert_eq!(sale.items[0].unit_price, Money::from_units(50));
        assert_eq!(sale.totals.total_amount, Money::from(79_500_000));
        assert_eq!(sale.totals.computed_total(), sale.totals.total_amount);
        assert_eq!(sale.payment_method, "cash");
    }

    #[test]
    fn pos_request_needs_an_id() {
        let json = r#"{"sale_id": " ", "outlet_id": "dhaka", "items": [], "subtotal": 0, "total": 0}"#;
        let req: PosSaleRequest = serde_json::from_str(json).unwrap();
        assert!(NewPosSale::try_from(req).is_err());
    }

    #[test]
    fn pos_request_with_an_oversized_amount_is_refused() {
        let json = r#"{
            "sale_id": "POS-2",
            "outlet_id": "dhaka",
            "items": [{"product_id": "p1", "sku": "V1", "quantity": 1, "unit_price": 100}],
            "subtotal": 10000000000000,
            "total": 100
        }"#;
        let err = serde_json::from_str::<PosSaleRequest>(json).unwrap_err();
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
