use super::bridge::PurchaseSlot;
use super::connection::{ConnectionManager, ConnectionState};
use super::orchestrator::{PurchaseOrchestrator, PurchaseRequest};
use super::queries;
use super::translator::InvalidProductPolicy;
use crate::config::BillingConfig;
use crate::domain::ports::{BillingClientFactoryBox, PurchaseObserver};
use crate::domain::product::{ItemType, ProductRecord};
use crate::domain::purchase::{ProrationMode, PurchaseOutcome, PurchaseRecord};
use crate::error::Result;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// The main entry point of the billing layer.
///
/// `InAppBilling` exposes a request/response API over a callback-driven
/// backend: connect first, then query, purchase, and finalize. Every
/// operation except `connect` requires a live connection and fails fast
/// with `NotConnected` otherwise.
pub struct InAppBilling {
    connection: Arc<ConnectionManager>,
    orchestrator: PurchaseOrchestrator,
    ignore_invalid_products: AtomicBool,
    config: BillingConfig,
}

impl InAppBilling {
    /// Creates a new `InAppBilling` instance.
    ///
    /// # Arguments
    ///
    /// * `factory` - Builds backend clients on `connect`.
    /// * `config` - Timeouts and catalog policy.
    pub fn new(factory: BillingClientFactoryBox, config: BillingConfig) -> Self {
        Self::build(factory, config, None)
    }

    /// Like [`InAppBilling::new`], additionally forwarding purchase updates
    /// that no pending purchase is waiting for (e.g. restored purchases).
    pub fn with_observer(
        factory: BillingClientFactoryBox,
        config: BillingConfig,
        observer: Arc<dyn PurchaseObserver>,
    ) -> Self {
        Self::build(factory, config, Some(observer))
    }

    fn build(
        factory: BillingClientFactoryBox,
        config: BillingConfig,
        observer: Option<Arc<dyn PurchaseObserver>>,
    ) -> Self {
        let slot = PurchaseSlot::new();
        let connection = Arc::new(ConnectionManager::new(
            factory,
            Arc::clone(&slot),
            observer,
            config.connect_timeout(),
        ));
        let orchestrator =
            PurchaseOrchestrator::new(Arc::clone(&connection), slot, config.purchase_timeout());
        Self {
            connection,
            orchestrator,
            ignore_invalid_products: AtomicBool::new(config.ignore_invalid_products),
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    /// Connects using `enable_pending_purchases` from the configuration.
    pub async fn connect_default(&self) -> Result<bool> {
        self.connect(self.config.enable_pending_purchases).await
    }

    pub async fn connect(&self, enable_pending_purchases: bool) -> Result<bool> {
        self.connection.connect(enable_pending_purchases).await
    }

    pub fn disconnect(&self) {
        self.connection.disconnect();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn is_purchase_pending(&self) -> bool {
        self.orchestrator.is_purchase_pending()
    }

    pub fn set_ignore_invalid_products(&self, ignore: bool) {
        self.ignore_invalid_products.store(ignore, Ordering::Relaxed);
    }

    fn invalid_product_policy(&self) -> InvalidProductPolicy {
        InvalidProductPolicy::from_ignore_flag(self.ignore_invalid_products.load(Ordering::Relaxed))
    }

    pub async fn query_products<I, S>(&self, item_type: ItemType, product_ids: I) -> Result<Vec<ProductRecord>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = self.connection.client()?;
        let ids: Vec<String> = product_ids.into_iter().map(Into::into).collect();
        queries::query_products(client.as_ref(), item_type, &ids, self.invalid_product_policy()).await
    }

    pub async fn get_purchases(&self, item_type: ItemType) -> Result<Vec<PurchaseRecord>> {
        let client = self.connection.client()?;
        queries::query_purchases(client.as_ref(), item_type).await
    }

    pub async fn get_purchase_history(&self, item_type: ItemType) -> Result<Vec<PurchaseRecord>> {
        let client = self.connection.client()?;
        Ok(queries::query_purchase_history(client.as_ref(), item_type).await)
    }

    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome> {
        self.orchestrator.purchase(request).await
    }

    pub async fn upgrade_subscription(
        &self,
        new_product_id: &str,
        old_purchase_token: &str,
        proration_mode: ProrationMode,
    ) -> Result<PurchaseOutcome> {
        self.orchestrator
            .upgrade_subscription(new_product_id, old_purchase_token, proration_mode)
            .await
    }

    /// Acknowledges each token; one failure does not stop the others.
    pub async fn finalize<I, S>(&self, tokens: I) -> Result<Vec<(String, bool)>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let client = self.connection.client()?;
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        Ok(queries::finalize(client.as_ref(), &tokens).await)
    }

    pub async fn consume(&self, product_id: &str, purchase_token: &str) -> Result<bool> {
        let client = self.connection.client()?;
        queries::consume(client.as_ref(), product_id, purchase_token).await
    }
}
