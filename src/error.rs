use thiserror::Error;

/// Failure taxonomy for every billing operation.
///
/// Each variant carries the backend's debug message when one was available.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BillingError {
    #[error("not connected to the billing service")]
    NotConnected,
    #[error("general billing error: {0}")]
    GeneralError(String),
    #[error("user cancelled the purchase")]
    UserCancelled,
    #[error("billing service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("billing service disconnected: {0}")]
    ServiceDisconnected(String),
    #[error("billing service timed out: {0}")]
    ServiceTimeout(String),
    #[error("billing unavailable: {0}")]
    BillingUnavailable(String),
    #[error("item not owned: {0}")]
    ItemNotOwned(String),
    #[error("developer error: {0}")]
    DeveloperError(String),
    #[error("feature not supported: {0}")]
    FeatureNotSupported(String),
    #[error("item already owned: {0}")]
    ItemAlreadyOwned(String),
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),
    #[error("item not found: {0}")]
    ItemNotFound(String),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// A pending request was cancelled because a newer `connect` replaced it.
    #[error("pending request superseded by a new connection")]
    Superseded,
}

impl BillingError {
    /// Cancellation is an expected outcome callers handle as "try again".
    pub fn is_user_cancelled(&self) -> bool {
        matches!(self, BillingError::UserCancelled)
    }
}

/// Teardown failure reported by a backend client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("backend error: {0}")]
pub struct BackendError(pub String);

/// Errors surfaced by the command line front end.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Config error: {0}")]
    ConfigError(#[from] serde_json::Error),
    #[error("Billing error: {0}")]
    BillingError(#[from] BillingError),
    #[error("Command error: {0}")]
    CommandError(String),
}

pub type Result<T, E = BillingError> = std::result::Result<T, E>;
