use crate::domain::ports::{
    BillingClient, BillingClientFactory, ClientOptions, ConnectionStateListener,
    PurchasesUpdatedListener,
};
use crate::domain::product::{ItemType, ProductRecord, ProductType};
use crate::domain::purchase::{BillingFlowParams, PurchaseRecord, PurchaseState};
use crate::domain::response::{BackendResponse, BillingFeature, BillingResponseCode, BillingResult};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// How the sandbox answers a connection handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupMode {
    /// Finish setup immediately with the given code.
    Respond(BillingResponseCode),
    /// Leave setup pending until [`SandboxBackend::finish_setup`] is called.
    Manual,
}

/// How the sandbox reacts to a launched purchase flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowBehavior {
    /// Record the purchase and report it in the callback.
    Complete,
    /// Record the purchase but deliver an empty callback payload.
    CompleteWithoutPayload,
    /// Report that the user backed out.
    Cancel,
    /// Deliver the given failure code through the callback.
    Fail(BillingResponseCode),
    /// Refuse to launch, returning the given code immediately.
    LaunchFails(BillingResponseCode),
    /// Never call back on its own; see [`SandboxBackend::deliver_purchases_updated`].
    Manual,
}

struct SandboxState {
    catalog: HashMap<String, ProductRecord>,
    owned: Vec<(ProductType, PurchaseRecord)>,
    history: Vec<(ProductType, PurchaseRecord)>,
    setup_mode: SetupMode,
    flow_behavior: FlowBehavior,
    subscriptions_supported: bool,
    history_available: bool,
    fail_teardown: bool,
    connection_listeners: Vec<Arc<dyn ConnectionStateListener>>,
    purchase_listener: Option<Arc<dyn PurchasesUpdatedListener>>,
    last_options: Option<ClientOptions>,
    launched: Vec<BillingFlowParams>,
    clients_created: usize,
    teardowns: usize,
    backend_calls: usize,
    product_queries: usize,
    purchase_queries: usize,
    last_consume_code: Option<BillingResponseCode>,
    next_order: u64,
}

impl Default for SandboxState {
    fn default() -> Self {
        Self {
            catalog: HashMap::new(),
            owned: Vec::new(),
            history: Vec::new(),
            setup_mode: SetupMode::Respond(BillingResponseCode::Ok),
            flow_behavior: FlowBehavior::Complete,
            subscriptions_supported: true,
            history_available: true,
            fail_teardown: false,
            connection_listeners: Vec::new(),
            purchase_listener: None,
            last_options: None,
            launched: Vec::new(),
            clients_created: 0,
            teardowns: 0,
            backend_calls: 0,
            product_queries: 0,
            purchase_queries: 0,
            last_consume_code: None,
            next_order: 1,
        }
    }
}

impl SandboxState {
    /// Applies a launched flow to the store and returns what the purchase
    /// callback should carry.
    fn complete_flow(
        &mut self,
        params: &BillingFlowParams,
        include_payload: bool,
    ) -> (BillingResult, Vec<PurchaseRecord>) {
        let product_type = params.product.item_type.product_type();
        let product_id = params.product.product_id.as_str();

        if product_type == ProductType::InApp
            && self.owned.iter().any(|(_, p)| p.covers(product_id))
        {
            return (
                BillingResult::new(BillingResponseCode::ItemAlreadyOwned, "item already owned"),
                Vec::new(),
            );
        }

        if let Some(update) = &params.subscription_update {
            self.owned
                .retain(|(_, p)| p.purchase_token != update.old_purchase_token);
        }

        let order = self.next_order;
        self.next_order += 1;
        let purchase_time_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or_default();

        let mut record = PurchaseRecord::new(product_id, format!("sandbox-token-{order}"));
        record.order_id = Some(format!("GPA.SANDBOX-{order:04}"));
        record.state = PurchaseState::Purchased;
        record.auto_renewing = product_type == ProductType::Subs;
        record.purchase_time_ms = purchase_time_ms;
        record.obfuscated_account_id = params.obfuscated_account_id.clone();
        record.obfuscated_profile_id = params.obfuscated_profile_id.clone();

        self.owned.push((product_type, record.clone()));
        self.history.retain(|(_, p)| !p.covers(product_id));
        self.history.push((product_type, record.clone()));

        let payload = if include_payload {
            vec![record]
        } else {
            Vec::new()
        };
        (BillingResult::ok(), payload)
    }
}

/// An in-memory billing backend.
///
/// Acts as both client factory and client. Clones share one store, so a test
/// can keep a handle to script responses and inspect calls while the billing
/// layer owns another.
#[derive(Clone, Default)]
pub struct SandboxBackend {
    state: Arc<Mutex<SandboxState>>,
}

impl SandboxBackend {
    /// Creates an empty sandbox that accepts connections and completes flows.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(products: impl IntoIterator<Item = ProductRecord>) -> Self {
        let sandbox = Self::new();
        for product in products {
            sandbox.add_product(product);
        }
        sandbox
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut SandboxState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn add_product(&self, product: ProductRecord) {
        self.with_state(|s| {
            s.catalog.insert(product.product_id.clone(), product);
        });
    }

    pub fn add_owned_purchase(&self, item_type: ItemType, purchase: PurchaseRecord) {
        self.with_state(|s| s.owned.push((item_type.product_type(), purchase)));
    }

    pub fn add_history_record(&self, item_type: ItemType, purchase: PurchaseRecord) {
        self.with_state(|s| s.history.push((item_type.product_type(), purchase)));
    }

    pub fn set_setup_mode(&self, mode: SetupMode) {
        self.with_state(|s| s.setup_mode = mode);
    }

    pub fn set_flow_behavior(&self, behavior: FlowBehavior) {
        self.with_state(|s| s.flow_behavior = behavior);
    }

    pub fn set_subscriptions_supported(&self, supported: bool) {
        self.with_state(|s| s.subscriptions_supported = supported);
    }

    pub fn set_history_available(&self, available: bool) {
        self.with_state(|s| s.history_available = available);
    }

    pub fn set_fail_teardown(&self, fail: bool) {
        self.with_state(|s| s.fail_teardown = fail);
    }

    /// Completes the most recent pending handshake.
    pub fn finish_setup(&self, code: BillingResponseCode) {
        let listener = self.with_state(|s| s.connection_listeners.last().cloned());
        if let Some(listener) = listener {
            listener.on_setup_finished(BillingResult::from_code(code));
        }
    }

    /// Connection listener registered by the `index`-th handshake.
    pub fn connection_listener(&self, index: usize) -> Option<Arc<dyn ConnectionStateListener>> {
        self.with_state(|s| s.connection_listeners.get(index).cloned())
    }

    pub fn connection_attempts(&self) -> usize {
        self.with_state(|s| s.connection_listeners.len())
    }

    /// Drops the current connection from the backend side.
    pub fn simulate_disconnect(&self) {
        let listener = self.with_state(|s| s.connection_listeners.last().cloned());
        if let Some(listener) = listener {
            listener.on_disconnected();
        }
    }

    /// Pushes a purchase-update notification to the most recent client.
    pub fn deliver_purchases_updated(&self, result: BillingResult, purchases: Vec<PurchaseRecord>) {
        let listener = self.with_state(|s| s.purchase_listener.clone());
        if let Some(listener) = listener {
            listener.on_purchases_updated(result, purchases);
        }
    }

    pub fn clients_created(&self) -> usize {
        self.with_state(|s| s.clients_created)
    }

    pub fn last_options(&self) -> Option<ClientOptions> {
        self.with_state(|s| s.last_options)
    }

    pub fn teardowns(&self) -> usize {
        self.with_state(|s| s.teardowns)
    }

    /// Number of calls made against any client, handshakes included.
    pub fn backend_calls(&self) -> usize {
        self.with_state(|s| s.backend_calls)
    }

    pub fn product_queries(&self) -> usize {
        self.with_state(|s| s.product_queries)
    }

    pub fn purchase_queries(&self) -> usize {
        self.with_state(|s| s.purchase_queries)
    }

    pub fn launched_flows(&self) -> Vec<BillingFlowParams> {
        self.with_state(|s| s.launched.clone())
    }

    pub fn last_consume_code(&self) -> Option<BillingResponseCode> {
        self.with_state(|s| s.last_consume_code)
    }

    pub fn owned_purchases(&self, item_type: ItemType) -> Vec<PurchaseRecord> {
        let product_type = item_type.product_type();
        self.with_state(|s| {
            s.owned
                .iter()
                .filter(|(t, _)| *t == product_type)
                .map(|(_, p)| p.clone())
                .collect()
        })
    }
}

impl BillingClientFactory for SandboxBackend {
    fn create(
        &self,
        options: ClientOptions,
        listener: Arc<dyn PurchasesUpdatedListener>,
    ) -> Arc<dyn BillingClient> {
        self.with_state(|s| {
            s.clients_created += 1;
            s.last_options = Some(options);
            s.purchase_listener = Some(Arc::clone(&listener));
        });
        Arc::new(SandboxClient {
            backend: self.clone(),
            listener,
        })
    }
}

/// A client handed out by [`SandboxBackend`].
struct SandboxClient {
    backend: SandboxBackend,
    listener: Arc<dyn PurchasesUpdatedListener>,
}

impl SandboxClient {
    /// Delivers a purchase callback from outside the caller's task, the way
    /// a real backend calls back from its own thread.
    fn notify(&self, result: BillingResult, purchases: Vec<PurchaseRecord>) {
        let listener = Arc::clone(&self.listener);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    listener.on_purchases_updated(result, purchases);
                });
            }
            Err(_) => listener.on_purchases_updated(result, purchases),
        }
    }
}

#[async_trait]
impl BillingClient for SandboxClient {
    fn start_connection(&self, listener: Arc<dyn ConnectionStateListener>) {
        let mode = self.backend.with_state(|s| {
            s.backend_calls += 1;
            s.connection_listeners.push(Arc::clone(&listener));
            s.setup_mode
        });
        if let SetupMode::Respond(code) = mode {
            listener.on_setup_finished(BillingResult::new(code, "sandbox setup"));
        }
    }

    fn end_connection(&self) -> Result<(), BackendError> {
        let fail = self.backend.with_state(|s| {
            s.teardowns += 1;
            s.fail_teardown
        });
        if fail {
            Err(BackendError("sandbox refused to end the connection".to_string()))
        } else {
            Ok(())
        }
    }

    fn is_feature_supported(&self, feature: BillingFeature) -> Option<BillingResult> {
        let supported = self.backend.with_state(|s| {
            s.backend_calls += 1;
            match feature {
                BillingFeature::Subscriptions | BillingFeature::SubscriptionsUpdate => {
                    s.subscriptions_supported
                }
            }
        });
        Some(if supported {
            BillingResult::ok()
        } else {
            BillingResult::new(BillingResponseCode::FeatureNotSupported, "subscriptions disabled")
        })
    }

    async fn query_product_details(
        &self,
        product_type: ProductType,
        product_ids: &[String],
    ) -> BackendResponse<ProductRecord> {
        self.backend.with_state(|s| {
            s.backend_calls += 1;
            s.product_queries += 1;
            let found: Vec<ProductRecord> = product_ids
                .iter()
                .filter_map(|id| s.catalog.get(id))
                .filter(|p| p.item_type.product_type() == product_type)
                .cloned()
                .collect();
            let status = if found.len() == product_ids.len() {
                BillingResult::ok()
            } else {
                BillingResult::new(BillingResponseCode::ItemUnavailable, "unknown product id")
            };
            BackendResponse::new(status, found)
        })
    }

    async fn query_purchases(&self, product_type: ProductType) -> BackendResponse<PurchaseRecord> {
        self.backend.with_state(|s| {
            s.backend_calls += 1;
            s.purchase_queries += 1;
            let owned = s
                .owned
                .iter()
                .filter(|(t, _)| *t == product_type)
                .map(|(_, p)| p.clone())
                .collect();
            BackendResponse::new(BillingResult::ok(), owned)
        })
    }

    async fn query_purchase_history(
        &self,
        product_type: ProductType,
    ) -> Option<Vec<PurchaseRecord>> {
        self.backend.with_state(|s| {
            s.backend_calls += 1;
            s.history_available.then(|| {
                s.history
                    .iter()
                    .filter(|(t, _)| *t == product_type)
                    .map(|(_, p)| p.clone())
                    .collect()
            })
        })
    }

    fn launch_billing_flow(&self, params: BillingFlowParams) -> Option<BillingResult> {
        let (behavior, notification) = self.backend.with_state(|s| {
            s.backend_calls += 1;
            s.launched.push(params.clone());
            let behavior = s.flow_behavior;
            let notification = match behavior {
                FlowBehavior::Complete => Some(s.complete_flow(&params, true)),
                FlowBehavior::CompleteWithoutPayload => Some(s.complete_flow(&params, false)),
                FlowBehavior::Cancel => Some((
                    BillingResult::new(BillingResponseCode::UserCancelled, "user cancelled"),
                    Vec::new(),
                )),
                FlowBehavior::Fail(code) => Some((BillingResult::from_code(code), Vec::new())),
                FlowBehavior::LaunchFails(_) | FlowBehavior::Manual => None,
            };
            (behavior, notification)
        });

        debug!(product_id = %params.product.product_id, ?behavior, "sandbox purchase flow");
        if let FlowBehavior::LaunchFails(code) = behavior {
            return Some(BillingResult::new(code, "sandbox launch refused"));
        }
        if let Some((result, purchases)) = notification {
            self.notify(result, purchases);
        }
        Some(BillingResult::ok())
    }

    async fn acknowledge_purchase(&self, purchase_token: &str) -> Option<BillingResult> {
        self.backend.with_state(|s| {
            s.backend_calls += 1;
            let code = match s
                .owned
                .iter_mut()
                .find(|(_, p)| p.purchase_token == purchase_token)
            {
                Some((_, purchase)) => {
                    purchase.acknowledged = true;
                    BillingResponseCode::Ok
                }
                None => BillingResponseCode::ItemNotOwned,
            };
            Some(BillingResult::from_code(code))
        })
    }

    async fn consume(&self, purchase_token: &str) -> Option<BillingResult> {
        self.backend.with_state(|s| {
            s.backend_calls += 1;
            let before = s.owned.len();
            s.owned.retain(|(_, p)| p.purchase_token != purchase_token);
            let code = if s.owned.len() < before {
                BillingResponseCode::Ok
            } else {
                BillingResponseCode::ItemNotOwned
            };
            s.last_consume_code = Some(code);
            Some(BillingResult::from_code(code))
        })
    }
}
