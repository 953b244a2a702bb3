use crate::error::AppError;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::time::Duration;

/// Runtime settings of the billing layer.
///
/// Every field has a default, so a partial JSON document is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BillingConfig {
    /// Allow purchases that complete later (e.g. cash payments).
    pub enable_pending_purchases: bool,
    /// Skip unknown product ids in catalog queries instead of failing.
    pub ignore_invalid_products: bool,
    /// Upper bound on waiting for a purchase result after the flow launched.
    pub purchase_timeout_secs: u64,
    /// Upper bound on the connection handshake.
    pub connect_timeout_secs: u64,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            enable_pending_purchases: true,
            ignore_invalid_products: false,
            purchase_timeout_secs: 300,
            connect_timeout_secs: 30,
        }
    }
}

impl BillingConfig {
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> Result<Self, AppError> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    pub fn purchase_timeout(&self) -> Duration {
        Duration::from_secs(self.purchase_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BillingConfig::default();
        assert!(config.enable_pending_purchases);
        assert!(!config.ignore_invalid_products);
        assert_eq!(config.purchase_timeout(), Duration::from_secs(300));
        assert_eq!(config.connect_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: BillingConfig =
            serde_json::from_str(r#"{ "ignore_invalid_products": true, "purchase_timeout_secs": 5 }"#)
                .unwrap();
        assert!(config.ignore_invalid_products);
        assert!(config.enable_pending_purchases);
        assert_eq!(config.purchase_timeout_secs, 5);
        assert_eq!(config.connect_timeout_secs, 30);
    }

    #[test]
    fn test_from_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "enable_pending_purchases": false }"#).unwrap();

        let config = BillingConfig::from_json_path(&path).unwrap();
        assert!(!config.enable_pending_purchases);
    }
}
