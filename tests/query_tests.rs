mod common;

use inapp_billing::application::orchestrator::PurchaseRequest;
use inapp_billing::domain::product::ItemType;
use inapp_billing::domain::purchase::PurchaseRecord;
use inapp_billing::domain::response::BillingResponseCode;
use inapp_billing::error::BillingError;

#[tokio::test]
async fn test_empty_query_skips_backend() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;
    let calls_before = sandbox.backend_calls();

    let products = billing
        .query_products(ItemType::Subscription, Vec::<String>::new())
        .await
        .unwrap();

    assert!(products.is_empty());
    assert_eq!(sandbox.backend_calls(), calls_before);
}

#[tokio::test]
async fn test_query_keeps_requested_item_type() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;

    let products = billing
        .query_products(ItemType::InAppPurchaseConsumable, ["sku_a"])
        .await
        .unwrap();

    assert_eq!(products.len(), 1);
    assert_eq!(products[0].item_type, ItemType::InAppPurchaseConsumable);
}

#[tokio::test]
async fn test_invalid_products_fail_unless_ignored() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;

    let err = billing
        .query_products(ItemType::InAppPurchase, ["sku_a", "nope"])
        .await
        .unwrap_err();
    assert!(matches!(err, BillingError::ItemUnavailable(_)));

    billing.set_ignore_invalid_products(true);
    let products = billing
        .query_products(ItemType::InAppPurchase, ["sku_a", "nope"])
        .await
        .unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].product_id, "sku_a");
}

#[tokio::test]
async fn test_subscription_query_needs_feature_support() {
    let sandbox = common::sandbox();
    sandbox.set_subscriptions_supported(false);
    let billing = common::connected(&sandbox).await;
    let queries_before = sandbox.product_queries();

    let err = billing
        .query_products(ItemType::Subscription, ["gold"])
        .await
        .unwrap_err();

    assert!(matches!(err, BillingError::FeatureNotSupported(_)));
    assert_eq!(sandbox.product_queries(), queries_before);
}

#[tokio::test]
async fn test_history_is_best_effort() {
    let sandbox = common::sandbox();
    sandbox.add_history_record(ItemType::Subscription, PurchaseRecord::new("gold", "tok-old"));
    let billing = common::connected(&sandbox).await;

    let history = billing
        .get_purchase_history(ItemType::Subscription)
        .await
        .unwrap();
    assert_eq!(history.len(), 1);

    sandbox.set_history_available(false);
    let history = billing
        .get_purchase_history(ItemType::Subscription)
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_finalize_reports_each_token() {
    let sandbox = common::sandbox();
    sandbox.add_owned_purchase(ItemType::InAppPurchase, PurchaseRecord::new("sku_a", "tok-a"));
    let billing = common::connected(&sandbox).await;

    let results = billing.finalize(["tok-a", "tok-unknown"]).await.unwrap();

    assert_eq!(
        results,
        vec![("tok-a".to_string(), true), ("tok-unknown".to_string(), false)]
    );
    let owned = billing.get_purchases(ItemType::InAppPurchase).await.unwrap();
    assert!(owned[0].acknowledged);
}

#[tokio::test]
async fn test_consumed_item_can_be_bought_again() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;

    let first = billing
        .purchase(PurchaseRequest::new("coins", ItemType::InAppPurchaseConsumable))
        .await
        .unwrap()
        .into_purchase()
        .unwrap();
    assert!(billing.consume("coins", &first.purchase_token).await.unwrap());
    assert_eq!(sandbox.last_consume_code(), Some(BillingResponseCode::Ok));

    let second = billing
        .purchase(PurchaseRequest::new("coins", ItemType::InAppPurchaseConsumable))
        .await
        .unwrap()
        .into_purchase()
        .unwrap();
    assert_ne!(first.purchase_token, second.purchase_token);
}

#[tokio::test]
async fn test_consume_rejects_blank_token_and_unknown_purchase() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;

    let err = billing.consume("coins", "").await.unwrap_err();
    assert!(matches!(err, BillingError::InvalidArgument(_)));

    let err = billing.consume("coins", "tok-missing").await.unwrap_err();
    assert!(matches!(err, BillingError::ItemNotOwned(_)));
}

#[tokio::test]
async fn test_queries_require_connection() {
    let sandbox = common::sandbox();
    let billing = common::connected(&sandbox).await;
    billing.disconnect();

    assert_eq!(
        billing.get_purchases(ItemType::InAppPurchase).await.unwrap_err(),
        BillingError::NotConnected
    );
    assert_eq!(
        billing.finalize(["tok"]).await.unwrap_err(),
        BillingError::NotConnected
    );
}
