//! Read-only catalog and purchase queries plus purchase finalization.
//!
//! These operations hold no state between calls and may run concurrently
//! with each other and with a purchase flow.

use super::translator::{InvalidProductPolicy, translate};
use crate::domain::ports::BillingClient;
use crate::domain::product::{ItemType, ProductRecord};
use crate::domain::purchase::PurchaseRecord;
use crate::domain::response::BillingFeature;
use crate::error::{BillingError, Result};
use tracing::{debug, warn};

/// Fails fast unless the backend supports subscriptions.
pub fn ensure_subscriptions_supported(client: &dyn BillingClient) -> Result<()> {
    let status = client.is_feature_supported(BillingFeature::Subscriptions);
    if translate(status.as_ref(), InvalidProductPolicy::Fail)? {
        Ok(())
    } else {
        Err(BillingError::FeatureNotSupported(
            "subscriptions are not supported".to_string(),
        ))
    }
}

/// Fetches catalog metadata for `product_ids`.
///
/// An empty id list returns immediately without contacting the backend.
/// Invalid ids either fail the whole call or are skipped, per `policy`.
pub async fn query_products(
    client: &dyn BillingClient,
    item_type: ItemType,
    product_ids: &[String],
    policy: InvalidProductPolicy,
) -> Result<Vec<ProductRecord>> {
    if product_ids.is_empty() {
        return Ok(Vec::new());
    }
    if item_type == ItemType::Subscription {
        ensure_subscriptions_supported(client)?;
    }

    let response = client
        .query_product_details(item_type.product_type(), product_ids)
        .await;
    translate(response.status.as_ref(), policy)?;

    debug!(
        requested = product_ids.len(),
        found = response.payload.len(),
        "product details received"
    );
    // Consumables are indistinguishable from one-time products on the
    // backend, so the caller's classification wins.
    Ok(response
        .payload
        .into_iter()
        .map(|product| ProductRecord {
            item_type,
            ..product
        })
        .collect())
}

/// Currently owned, active purchases of the given type.
pub async fn query_purchases(
    client: &dyn BillingClient,
    item_type: ItemType,
) -> Result<Vec<PurchaseRecord>> {
    let response = client.query_purchases(item_type.product_type()).await;
    translate(response.status.as_ref(), InvalidProductPolicy::Fail)?;
    Ok(response.payload)
}

/// Most recent purchase per product, including expired and consumed ones.
/// The backend only offers a best-effort list; an empty one is valid.
pub async fn query_purchase_history(
    client: &dyn BillingClient,
    item_type: ItemType,
) -> Vec<PurchaseRecord> {
    client
        .query_purchase_history(item_type.product_type())
        .await
        .unwrap_or_default()
}

/// Acknowledges each token independently and reports success per token.
pub async fn finalize(client: &dyn BillingClient, tokens: &[String]) -> Vec<(String, bool)> {
    let mut results = Vec::with_capacity(tokens.len());
    for token in tokens {
        let status = client.acknowledge_purchase(token).await;
        let success = match translate(status.as_ref(), InvalidProductPolicy::Fail) {
            Ok(success) => success,
            Err(err) => {
                warn!(token = %token, error = %err, "acknowledge failed");
                false
            }
        };
        results.push((token.clone(), success));
    }
    results
}

/// Consumes a purchase so the product can be bought again.
pub async fn consume(client: &dyn BillingClient, product_id: &str, token: &str) -> Result<bool> {
    if token.trim().is_empty() {
        return Err(BillingError::InvalidArgument(
            "a purchase token is required to consume".to_string(),
        ));
    }
    let status = client.consume(token).await;
    let consumed = translate(status.as_ref(), InvalidProductPolicy::Fail)?;
    debug!(product_id, consumed, "consume finished");
    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::{BillingClientFactory, ClientOptions, PurchasesUpdatedListener};
    use crate::domain::product::Price;
    use crate::domain::response::{BillingResponseCode, BillingResult};
    use crate::infrastructure::sandbox::SandboxBackend;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    struct Silent;

    impl PurchasesUpdatedListener for Silent {
        fn on_purchases_updated(&self, _: BillingResult, _: Vec<PurchaseRecord>) {}
    }

    fn product(id: &str, item_type: ItemType) -> ProductRecord {
        ProductRecord {
            product_id: id.to_string(),
            item_type,
            name: id.to_uppercase(),
            description: String::new(),
            price: Price::new(dec!(0.99), "USD"),
            offers: vec![],
        }
    }

    fn client(sandbox: &SandboxBackend) -> Arc<dyn BillingClient> {
        sandbox.create(ClientOptions::default(), Arc::new(Silent))
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_id_list_skips_backend() {
        let sandbox = SandboxBackend::new();
        let client = client(&sandbox);

        let products = query_products(
            client.as_ref(),
            ItemType::Subscription,
            &[],
            InvalidProductPolicy::Fail,
        )
        .await
        .unwrap();

        assert!(products.is_empty());
        assert_eq!(sandbox.backend_calls(), 0);
    }

    #[tokio::test]
    async fn test_unsupported_subscriptions_fail_fast() {
        let sandbox = SandboxBackend::new();
        sandbox.add_product(product("gold", ItemType::Subscription));
        sandbox.set_subscriptions_supported(false);
        let client = client(&sandbox);

        let result = query_products(
            client.as_ref(),
            ItemType::Subscription,
            &ids(&["gold"]),
            InvalidProductPolicy::Fail,
        )
        .await;

        assert!(matches!(result, Err(BillingError::FeatureNotSupported(_))));
        assert_eq!(sandbox.product_queries(), 0);
    }

    #[tokio::test]
    async fn test_invalid_ids_follow_policy() {
        let sandbox = SandboxBackend::new();
        sandbox.add_product(product("coins", ItemType::InAppPurchaseConsumable));
        let client = client(&sandbox);
        let wanted = ids(&["coins", "missing"]);

        let strict = query_products(
            client.as_ref(),
            ItemType::InAppPurchaseConsumable,
            &wanted,
            InvalidProductPolicy::Fail,
        )
        .await;
        assert!(matches!(strict, Err(BillingError::ItemUnavailable(_))));

        let lenient = query_products(
            client.as_ref(),
            ItemType::InAppPurchaseConsumable,
            &wanted,
            InvalidProductPolicy::Ignore,
        )
        .await
        .unwrap();
        assert_eq!(lenient.len(), 1);
        assert_eq!(lenient[0].product_id, "coins");
        assert_eq!(lenient[0].item_type, ItemType::InAppPurchaseConsumable);
    }

    #[tokio::test]
    async fn test_finalize_continues_after_failure() {
        let sandbox = SandboxBackend::new();
        sandbox.add_owned_purchase(ItemType::InAppPurchase, PurchaseRecord::new("a", "t1"));
        sandbox.add_owned_purchase(ItemType::InAppPurchase, PurchaseRecord::new("b", "t3"));
        let client = client(&sandbox);

        let results = finalize(client.as_ref(), &ids(&["t1", "unknown", "t3"])).await;

        assert_eq!(
            results,
            vec![
                ("t1".to_string(), true),
                ("unknown".to_string(), false),
                ("t3".to_string(), true),
            ]
        );
    }

    #[tokio::test]
    async fn test_history_missing_is_empty() {
        let sandbox = SandboxBackend::new();
        sandbox.set_history_available(false);
        let client = client(&sandbox);

        assert!(
            query_purchase_history(client.as_ref(), ItemType::Subscription)
                .await
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_consume_requires_token() {
        let sandbox = SandboxBackend::new();
        let client = client(&sandbox);

        assert!(matches!(
            consume(client.as_ref(), "coins", " ").await,
            Err(BillingError::InvalidArgument(_))
        ));
        assert!(matches!(
            consume(client.as_ref(), "coins", "nope").await,
            Err(BillingError::ItemNotOwned(_))
        ));
        assert_eq!(
            BillingResponseCode::ItemNotOwned,
            sandbox.last_consume_code().unwrap()
        );
    }
}
