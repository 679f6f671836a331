//! # Domain Types
//!
//! Core domain types shared by every layer of the kiosk.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │   ScanEvent     │   │    Session      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id             │   │  code           │   │  user           │       │
//! │  │  sku (scanned)  │   │  timestamp      │   │  role           │       │
//! │  │  name           │   └─────────────────┘   │  capabilities   │       │
//! │  │  price          │                         └─────────────────┘       │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │ PaymentMethod   │   │ TransactionId   │                             │
//! │  │  Cash | Card    │   │ assigned by the │                             │
//! │  └─────────────────┘   │ backend         │                             │
//! │                        └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Products carry both:
//! - `id`: the catalog's primary key, used by cart operations
//! - `sku`: the business key printed in the QR code and matched on scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;
use crate::role::{Capabilities, Role};

// =============================================================================
// Product
// =============================================================================

/// Catalog primary key of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProductId(pub i64);

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProductId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<i64>()
            .map(ProductId)
            .map_err(|e| ValidationError::InvalidFormat {
                field: "product id".to_string(),
                reason: e.to_string(),
            })
    }
}

/// A product as published by the catalog.
///
/// Unknown catalog fields (`subCategory`, audit columns) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,

    /// Business key encoded in the product's QR code.
    pub sku: String,

    pub name: String,

    /// Unit price in minor units.
    pub price: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stock: Option<i64>,
}

impl Product {
    pub fn new(id: ProductId, sku: impl Into<String>, name: impl Into<String>, price: Money) -> Self {
        Product {
            id,
            sku: sku.into(),
            name: name.into(),
            price,
            description: None,
            stock: None,
        }
    }
}

// =============================================================================
// Scan Event
// =============================================================================

/// A debounced, decoded code emitted by the scanner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanEvent {
    pub code: String,

    pub timestamp: DateTime<Utc>,
}

impl ScanEvent {
    pub fn new(code: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        ScanEvent {
            code: code.into(),
            timestamp,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the shopper pays. The kiosk never talks to a payment gateway; the
/// choice is recorded on the receipt and sent with the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
}

impl PaymentMethod {
    /// Label printed on the receipt.
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Card => "Card",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Card => write!(f, "card"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" | "credit" | "debit" => Ok(PaymentMethod::Card),
            other => Err(ValidationError::InvalidFormat {
                field: "payment method".to_string(),
                reason: format!("unknown method '{}', expected cash or card", other),
            }),
        }
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// Identifier the backend assigns to a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub String);

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Session
// =============================================================================

/// An authenticated kiosk session.
///
/// Capabilities are derived from the role once, when the session is built,
/// and carried alongside it; nothing downstream re-parses role strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user: String,
    pub role: Role,
    pub capabilities: Capabilities,
}

impl Session {
    pub fn new(user: impl Into<String>, role: Role) -> Self {
        Session {
            user: user.into(),
            capabilities: role.capabilities(),
            role,
        }
    }

    #[inline]
    pub fn can_checkout(&self) -> bool {
        self.capabilities.can_checkout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_from_catalog_json() {
        let json = r#"{
            "id": 5,
            "sku": "A1",
            "name": "Widget",
            "description": "Blue",
            "stock": 12,
            "price": 100,
            "subCategory": 3
        }"#;

        let product: Product = serde_json::from_str(json).unwrap();
        assert_eq!(product.id, ProductId(5));
        assert_eq!(product.sku, "A1");
        assert_eq!(product.price, Money::from_minor(100));
        assert_eq!(product.stock, Some(12));
    }

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(" Card ".parse::<PaymentMethod>().unwrap(), PaymentMethod::Card);
        assert!("bitcoin".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_wire_format() {
        let json = serde_json::to_string(&PaymentMethod::Card).unwrap();
        assert_eq!(json, "\"card\"");
    }

    #[test]
    fn test_session_carries_role_capabilities() {
        let session = Session::new("ayesha", Role::StoreManager);
        assert!(session.can_checkout());
        assert!(session.capabilities.can_manage_inventory);

        let staff = Session::new("bilal", Role::Staff);
        assert!(!staff.can_checkout());
    }

    #[test]
    fn test_product_id_parsing() {
        assert_eq!("42".parse::<ProductId>().unwrap(), ProductId(42));
        assert!("abc".parse::<ProductId>().is_err());
    }
}
