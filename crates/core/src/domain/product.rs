use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::tenant::TenantId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub String);

/// Three-state availability. Unconfirmed products exist in the catalog only
/// because a customer mentioned them; they must never be sold until a human
/// decision promotes them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Availability {
    Confirmed,
    OutOfStock,
    Unconfirmed,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::OutOfStock => "out_of_stock",
            Self::Unconfirmed => "unconfirmed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "confirmed" => Some(Self::Confirmed),
            "out_of_stock" => Some(Self::OutOfStock),
            "unconfirmed" => Some(Self::Unconfirmed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub tenant_id: TenantId,
    pub sku: String,
    pub name: String,
    /// Free text carrying ingredient and customization detail; search must
    /// surface it, since option questions hinge on it rather than the name.
    pub description: Option<String>,
    /// None for zero-price ingredient products; such lines never count
    /// toward a billable cart total.
    pub price: Option<Decimal>,
    pub unit: String,
    pub availability: Availability,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        matches!(self.availability, Availability::Confirmed)
    }

    /// Text the matcher ranks against: name plus description.
    pub fn search_text(&self) -> String {
        match &self.description {
            Some(description) => format!("{} {}", self.name, description),
            None => self.name.clone(),
        }
    }
}
