use serde::{Deserialize, Serialize};
use std::fmt;

/// Response codes reported by the billing backend.
///
/// The integer values follow the backend's wire contract and are preserved
/// through [`BillingResponseCode::from_code`] and [`BillingResponseCode::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BillingResponseCode {
    ServiceTimeout,
    FeatureNotSupported,
    ServiceDisconnected,
    Ok,
    UserCancelled,
    ServiceUnavailable,
    BillingUnavailable,
    ItemUnavailable,
    DeveloperError,
    Error,
    ItemAlreadyOwned,
    ItemNotOwned,
    NetworkError,
    Unknown(i32),
}

impl BillingResponseCode {
    pub fn from_code(code: i32) -> Self {
        match code {
            -3 => Self::ServiceTimeout,
            -2 => Self::FeatureNotSupported,
            -1 => Self::ServiceDisconnected,
            0 => Self::Ok,
            1 => Self::UserCancelled,
            2 => Self::ServiceUnavailable,
            3 => Self::BillingUnavailable,
            4 => Self::ItemUnavailable,
            5 => Self::DeveloperError,
            6 => Self::Error,
            7 => Self::ItemAlreadyOwned,
            8 => Self::ItemNotOwned,
            12 => Self::NetworkError,
            other => Self::Unknown(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::ServiceTimeout => -3,
            Self::FeatureNotSupported => -2,
            Self::ServiceDisconnected => -1,
            Self::Ok => 0,
            Self::UserCancelled => 1,
            Self::ServiceUnavailable => 2,
            Self::BillingUnavailable => 3,
            Self::ItemUnavailable => 4,
            Self::DeveloperError => 5,
            Self::Error => 6,
            Self::ItemAlreadyOwned => 7,
            Self::ItemNotOwned => 8,
            Self::NetworkError => 12,
            Self::Unknown(code) => *code,
        }
    }
}

impl From<i32> for BillingResponseCode {
    fn from(code: i32) -> Self {
        Self::from_code(code)
    }
}

impl fmt::Display for BillingResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// Status object attached to every backend reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingResult {
    pub response_code: BillingResponseCode,
    pub debug_message: String,
}

impl BillingResult {
    pub fn new(response_code: BillingResponseCode, debug_message: impl Into<String>) -> Self {
        Self {
            response_code,
            debug_message: debug_message.into(),
        }
    }

    pub fn ok() -> Self {
        Self::new(BillingResponseCode::Ok, "")
    }

    pub fn from_code(code: BillingResponseCode) -> Self {
        Self::new(code, "")
    }

    pub fn is_ok(&self) -> bool {
        self.response_code == BillingResponseCode::Ok
    }
}

/// Optional backend capabilities that must be probed before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BillingFeature {
    Subscriptions,
    SubscriptionsUpdate,
}

/// A backend reply carrying a status and a list payload.
///
/// `status` is `None` when the backend returned no result object at all.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResponse<T> {
    pub status: Option<BillingResult>,
    pub payload: Vec<T>,
}

impl<T> BackendResponse<T> {
    pub fn new(status: BillingResult, payload: Vec<T>) -> Self {
        Self {
            status: Some(status),
            payload,
        }
    }

    pub fn missing() -> Self {
        Self {
            status: None,
            payload: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes_keep_their_ordinals() {
        for code in [-3, -2, -1, 0, 1, 2, 3, 4, 5, 6, 7, 8, 12] {
            let parsed = BillingResponseCode::from_code(code);
            assert!(!matches!(parsed, BillingResponseCode::Unknown(_)));
            assert_eq!(parsed.code(), code);
        }
    }

    #[test]
    fn test_unlisted_code_is_unknown() {
        assert_eq!(
            BillingResponseCode::from(42),
            BillingResponseCode::Unknown(42)
        );
        assert_eq!(BillingResponseCode::Unknown(42).code(), 42);
    }

    #[test]
    fn test_billing_result_ok() {
        assert!(BillingResult::ok().is_ok());
        assert!(!BillingResult::from_code(BillingResponseCode::Error).is_ok());
    }
}
