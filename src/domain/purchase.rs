use super::product::ProductRecord;
use crate::error::BillingError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum PurchaseState {
    #[default]
    Unspecified,
    Purchased,
    Pending,
}

/// A normalized purchase as reported by the backend.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct PurchaseRecord {
    /// Products covered by this purchase. Usually exactly one.
    pub product_ids: Vec<String>,
    /// Token identifying the purchase towards the backend.
    pub purchase_token: String,
    pub order_id: Option<String>,
    pub state: PurchaseState,
    pub acknowledged: bool,
    pub auto_renewing: bool,
    /// Purchase time in milliseconds since the epoch.
    pub purchase_time_ms: i64,
    pub quantity: u32,
    pub obfuscated_account_id: Option<String>,
    pub obfuscated_profile_id: Option<String>,
}

impl PurchaseRecord {
    pub fn new(product_id: impl Into<String>, purchase_token: impl Into<String>) -> Self {
        Self {
            product_ids: vec![product_id.into()],
            purchase_token: purchase_token.into(),
            order_id: None,
            state: PurchaseState::Purchased,
            acknowledged: false,
            auto_renewing: false,
            purchase_time_ms: 0,
            quantity: 1,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
        }
    }

    /// Primary product id of the purchase.
    pub fn product_id(&self) -> &str {
        self.product_ids.first().map(String::as_str).unwrap_or_default()
    }

    pub fn covers(&self, product_id: &str) -> bool {
        self.product_ids.iter().any(|p| p == product_id)
    }
}

/// How cost and time are adjusted when replacing a subscription.
///
/// Discriminants match the backend's integer contract.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[repr(i32)]
pub enum ProrationMode {
    #[default]
    ImmediateWithTimeProration = 1,
    ImmediateAndChargeProratedPrice = 2,
    ImmediateWithoutProration = 3,
    Deferred = 4,
    ImmediateAndChargeFullPrice = 5,
}

impl ProrationMode {
    pub fn code(&self) -> i32 {
        *self as i32
    }
}

impl TryFrom<i32> for ProrationMode {
    type Error = BillingError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ImmediateWithTimeProration),
            2 => Ok(Self::ImmediateAndChargeProratedPrice),
            3 => Ok(Self::ImmediateWithoutProration),
            4 => Ok(Self::Deferred),
            5 => Ok(Self::ImmediateAndChargeFullPrice),
            other => Err(BillingError::InvalidArgument(format!(
                "unknown proration mode {other}"
            ))),
        }
    }
}

/// Replacement details attached to a subscription change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    pub old_purchase_token: String,
    pub proration_mode: ProrationMode,
}

/// Everything the backend needs to present its purchase screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingFlowParams {
    pub product: ProductRecord,
    pub offer_token: Option<String>,
    pub obfuscated_account_id: Option<String>,
    pub obfuscated_profile_id: Option<String>,
    pub subscription_update: Option<SubscriptionUpdate>,
}

/// Final result of a purchase-style operation that did not fail hard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PurchaseOutcome {
    Purchased(PurchaseRecord),
    /// The user backed out of the purchase screen.
    UserCancelled,
    /// Another purchase flow is still outstanding; nothing was started.
    AlreadyInProgress,
    /// The backend reported success but no matching purchase could be found.
    NoResult,
}

impl PurchaseOutcome {
    pub fn purchase(&self) -> Option<&PurchaseRecord> {
        match self {
            PurchaseOutcome::Purchased(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_purchase(self) -> Option<PurchaseRecord> {
        match self {
            PurchaseOutcome::Purchased(record) => Some(record),
            _ => None,
        }
    }
}
