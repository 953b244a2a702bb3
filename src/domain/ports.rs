use super::product::{ProductRecord, ProductType};
use super::purchase::{BillingFlowParams, PurchaseRecord};
use super::response::{BackendResponse, BillingFeature, BillingResult};
use crate::error::BackendError;
use async_trait::async_trait;
use std::sync::Arc;

/// Receives connection lifecycle callbacks from a backend client.
pub trait ConnectionStateListener: Send + Sync {
    /// Called once the connection handshake finished, successfully or not.
    fn on_setup_finished(&self, result: BillingResult);
    /// Called when the backend dropped an established connection.
    fn on_disconnected(&self);
}

/// Receives purchase-update notifications from a backend client.
///
/// Notifications may arrive on any thread and for reasons unrelated to the
/// purchase currently in flight, such as restored purchases.
pub trait PurchasesUpdatedListener: Send + Sync {
    fn on_purchases_updated(&self, result: BillingResult, purchases: Vec<PurchaseRecord>);
}

/// Configuration handed to the backend when a client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub enable_pending_purchases: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            enable_pending_purchases: true,
        }
    }
}

/// Capability surface of the billing backend.
#[async_trait]
pub trait BillingClient: Send + Sync {
    fn start_connection(&self, listener: Arc<dyn ConnectionStateListener>);
    fn end_connection(&self) -> Result<(), BackendError>;
    fn is_feature_supported(&self, feature: BillingFeature) -> Option<BillingResult>;
    async fn query_product_details(
        &self,
        product_type: ProductType,
        product_ids: &[String],
    ) -> BackendResponse<ProductRecord>;
    async fn query_purchases(&self, product_type: ProductType) -> BackendResponse<PurchaseRecord>;
    /// Most recent purchase per product; `None` when the backend had nothing to say.
    async fn query_purchase_history(&self, product_type: ProductType)
    -> Option<Vec<PurchaseRecord>>;
    /// Presents the purchase screen. The final result arrives through the
    /// registered [`PurchasesUpdatedListener`].
    fn launch_billing_flow(&self, params: BillingFlowParams) -> Option<BillingResult>;
    async fn acknowledge_purchase(&self, purchase_token: &str) -> Option<BillingResult>;
    async fn consume(&self, purchase_token: &str) -> Option<BillingResult>;
}

/// Builds backend clients bound to a purchase-update listener.
pub trait BillingClientFactory: Send + Sync {
    fn create(
        &self,
        options: ClientOptions,
        listener: Arc<dyn PurchasesUpdatedListener>,
    ) -> Arc<dyn BillingClient>;
}

pub type BillingClientFactoryBox = Box<dyn BillingClientFactory>;

/// Out-of-band observer for notifications no pending purchase is waiting on.
pub trait PurchaseObserver: Send + Sync {
    fn on_unsolicited_purchases(&self, result: &BillingResult, purchases: &[PurchaseRecord]);
}

impl<F> PurchaseObserver for F
where
    F: Fn(&BillingResult, &[PurchaseRecord]) + Send + Sync,
{
    fn on_unsolicited_purchases(&self, result: &BillingResult, purchases: &[PurchaseRecord]) {
        self(result, purchases)
    }
}
