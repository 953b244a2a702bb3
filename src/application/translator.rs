use crate::domain::response::{BillingResponseCode, BillingResult};
use crate::error::{BillingError, Result};

/// How an `ItemUnavailable` response is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InvalidProductPolicy {
    #[default]
    Fail,
    Ignore,
}

impl InvalidProductPolicy {
    pub fn from_ignore_flag(ignore_invalid_products: bool) -> Self {
        if ignore_invalid_products {
            Self::Ignore
        } else {
            Self::Fail
        }
    }
}

/// Translates a backend status into proceed/fail.
///
/// Returns `Ok(true)` for success, `Ok(false)` for codes that are not an
/// error but not a success either (unknown codes, or an ignored
/// `ItemUnavailable`), and the matching [`BillingError`] otherwise.
/// A missing status object is a general error.
pub fn translate(result: Option<&BillingResult>, policy: InvalidProductPolicy) -> Result<bool> {
    let Some(result) = result else {
        return Err(BillingError::GeneralError(
            "backend returned no result".to_string(),
        ));
    };
    let message = result.debug_message.clone();

    match result.response_code {
        BillingResponseCode::Ok => Ok(true),
        BillingResponseCode::UserCancelled => Err(BillingError::UserCancelled),
        BillingResponseCode::ServiceUnavailable => Err(BillingError::ServiceUnavailable(message)),
        BillingResponseCode::ServiceDisconnected => {
            Err(BillingError::ServiceDisconnected(message))
        }
        // Network failures surface as timeouts whatever the backend called them.
        BillingResponseCode::ServiceTimeout | BillingResponseCode::NetworkError => {
            Err(BillingError::ServiceTimeout(message))
        }
        BillingResponseCode::BillingUnavailable => Err(BillingError::BillingUnavailable(message)),
        BillingResponseCode::ItemNotOwned => Err(BillingError::ItemNotOwned(message)),
        BillingResponseCode::DeveloperError => Err(BillingError::DeveloperError(message)),
        BillingResponseCode::Error => Err(BillingError::GeneralError(message)),
        BillingResponseCode::FeatureNotSupported => {
            Err(BillingError::FeatureNotSupported(message))
        }
        BillingResponseCode::ItemAlreadyOwned => Err(BillingError::ItemAlreadyOwned(message)),
        BillingResponseCode::ItemUnavailable => match policy {
            InvalidProductPolicy::Ignore => Ok(false),
            InvalidProductPolicy::Fail => Err(BillingError::ItemUnavailable(message)),
        },
        BillingResponseCode::Unknown(_) => Ok(false),
    }
}

/// Like [`translate`], but anything short of success is an error.
pub fn require_success(result: Option<&BillingResult>) -> Result<()> {
    if translate(result, InvalidProductPolicy::Fail)? {
        Ok(())
    } else {
        let code = result.map(|r| r.response_code.code()).unwrap_or_default();
        Err(BillingError::GeneralError(format!(
            "unexpected response code {code}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: BillingResponseCode) -> BillingResult {
        BillingResult::new(code, "debug")
    }

    #[test]
    fn test_ok_proceeds() {
        let result = status(BillingResponseCode::Ok);
        assert_eq!(translate(Some(&result), InvalidProductPolicy::Fail), Ok(true));
        assert_eq!(require_success(Some(&result)), Ok(()));
    }

    #[test]
    fn test_missing_result_is_general_error() {
        assert!(matches!(
            translate(None, InvalidProductPolicy::Ignore),
            Err(BillingError::GeneralError(_))
        ));
    }

    #[test]
    fn test_named_failures() {
        let cases = [
            (BillingResponseCode::UserCancelled, BillingError::UserCancelled),
            (
                BillingResponseCode::ServiceUnavailable,
                BillingError::ServiceUnavailable("debug".into()),
            ),
            (
                BillingResponseCode::ServiceDisconnected,
                BillingError::ServiceDisconnected("debug".into()),
            ),
            (
                BillingResponseCode::ServiceTimeout,
                BillingError::ServiceTimeout("debug".into()),
            ),
            (
                BillingResponseCode::BillingUnavailable,
                BillingError::BillingUnavailable("debug".into()),
            ),
            (
                BillingResponseCode::ItemNotOwned,
                BillingError::ItemNotOwned("debug".into()),
            ),
            (
                BillingResponseCode::DeveloperError,
                BillingError::DeveloperError("debug".into()),
            ),
            (
                BillingResponseCode::Error,
                BillingError::GeneralError("debug".into()),
            ),
            (
                BillingResponseCode::FeatureNotSupported,
                BillingError::FeatureNotSupported("debug".into()),
            ),
            (
                BillingResponseCode::ItemAlreadyOwned,
                BillingError::ItemAlreadyOwned("debug".into()),
            ),
            (
                BillingResponseCode::ItemUnavailable,
                BillingError::ItemUnavailable("debug".into()),
            ),
        ];

        for (code, expected) in cases {
            let result = status(code);
            assert_eq!(
                translate(Some(&result), InvalidProductPolicy::Fail),
                Err(expected),
                "code {code}"
            );
        }
    }

    #[test]
    fn test_network_error_normalized_to_timeout() {
        let result = status(BillingResponseCode::NetworkError);
        assert!(matches!(
            translate(Some(&result), InvalidProductPolicy::Ignore),
            Err(BillingError::ServiceTimeout(_))
        ));
    }

    #[test]
    fn test_item_unavailable_degrades_when_ignored() {
        let result = status(BillingResponseCode::ItemUnavailable);
        assert_eq!(
            translate(Some(&result), InvalidProductPolicy::Ignore),
            Ok(false)
        );
    }

    #[test]
    fn test_unknown_codes_never_succeed() {
        for code in [-99, 9, 10, 11, 13, 1000] {
            let result = status(BillingResponseCode::from_code(code));
            assert_eq!(
                translate(Some(&result), InvalidProductPolicy::Fail),
                Ok(false)
            );
            assert!(matches!(
                require_success(Some(&result)),
                Err(BillingError::GeneralError(_))
            ));
        }
    }
}
