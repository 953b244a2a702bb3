use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification of a purchasable unit as seen by the application.
#[derive(Debug, Deserialize, Serialize, PartialEq, Eq, Hash, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    #[serde(alias = "onetime", alias = "inapp")]
    InAppPurchase,
    #[serde(alias = "consumable")]
    InAppPurchaseConsumable,
    #[serde(alias = "subs")]
    Subscription,
}

impl ItemType {
    /// Backend product family this item type is queried under.
    pub fn product_type(&self) -> ProductType {
        match self {
            ItemType::InAppPurchase | ItemType::InAppPurchaseConsumable => ProductType::InApp,
            ItemType::Subscription => ProductType::Subs,
        }
    }
}

/// Product family understood by the billing backend.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ProductType {
    InApp,
    Subs,
}

impl ProductType {
    /// Item type used when re-querying purchases of this family.
    pub fn item_type(&self) -> ItemType {
        match self {
            ProductType::InApp => ItemType::InAppPurchase,
            ProductType::Subs => ItemType::Subscription,
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProductType::InApp => f.write_str("inapp"),
            ProductType::Subs => f.write_str("subs"),
        }
    }
}

/// Localized price of a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    pub amount: Decimal,
    pub currency_code: String,
}

impl Price {
    pub fn new(amount: Decimal, currency_code: impl Into<String>) -> Self {
        Self {
            amount,
            currency_code: currency_code.into(),
        }
    }

    /// Price in millionths of the currency unit, as the backend reports it.
    pub fn micros(&self) -> i64 {
        self.amount
            .checked_mul(Decimal::from(1_000_000))
            .and_then(|micros| micros.trunc().to_i64())
            .unwrap_or(if self.amount.is_sign_negative() {
                i64::MIN
            } else {
                i64::MAX
            })
    }

    /// Display form, e.g. `1.99 USD`.
    pub fn formatted(&self) -> String {
        format!("{} {}", self.amount.normalize(), self.currency_code)
    }
}

/// A purchasable offer attached to a subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOffer {
    pub offer_token: String,
    pub base_plan_id: Option<String>,
}

impl SubscriptionOffer {
    pub fn new(offer_token: impl Into<String>) -> Self {
        Self {
            offer_token: offer_token.into(),
            base_plan_id: None,
        }
    }
}

/// Catalog metadata for a single product.
///
/// Built fresh by every catalog query; never cached across calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: String,
    pub item_type: ItemType,
    pub name: String,
    pub description: String,
    pub price: Price,
    /// Offers available for subscriptions, in backend order.
    pub offers: Vec<SubscriptionOffer>,
}

impl ProductRecord {
    /// Offer token used when the caller does not pick one explicitly.
    pub fn first_offer_token(&self) -> Option<&str> {
        self.offers.first().map(|o| o.offer_token.as_str())
    }
}
