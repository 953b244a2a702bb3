use super::bridge::{PurchaseIntent, PurchaseNotification, PurchaseSlot};
use super::connection::ConnectionManager;
use super::queries;
use super::slot::PendingTicket;
use super::translator::{InvalidProductPolicy, translate};
use crate::domain::ports::BillingClient;
use crate::domain::product::{ItemType, ProductRecord};
use crate::domain::purchase::{
    BillingFlowParams, ProrationMode, PurchaseOutcome, PurchaseRecord, SubscriptionUpdate,
};
use crate::domain::response::BillingResult;
use crate::error::{BillingError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

type PurchaseTicket = PendingTicket<PurchaseIntent, PurchaseNotification>;

/// Arguments of a single purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseRequest {
    pub product_id: String,
    pub item_type: ItemType,
    pub obfuscated_account_id: Option<String>,
    pub obfuscated_profile_id: Option<String>,
    /// Subscription offer to buy; defaults to the product's first offer.
    pub offer_token: Option<String>,
}

impl PurchaseRequest {
    pub fn new(product_id: impl Into<String>, item_type: ItemType) -> Self {
        Self {
            product_id: product_id.into(),
            item_type,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
            offer_token: None,
        }
    }

    pub fn with_account_id(mut self, account_id: impl Into<String>) -> Self {
        self.obfuscated_account_id = Some(account_id.into());
        self
    }

    pub fn with_profile_id(mut self, profile_id: impl Into<String>) -> Self {
        self.obfuscated_profile_id = Some(profile_id.into());
        self
    }

    pub fn with_offer_token(mut self, offer_token: impl Into<String>) -> Self {
        self.offer_token = Some(offer_token.into());
        self
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Turns a translated status into "keep going" or a final outcome.
fn gate(status: Option<&BillingResult>, stage: &str) -> Result<Option<PurchaseOutcome>> {
    match translate(status, InvalidProductPolicy::Fail) {
        Ok(true) => Ok(None),
        Ok(false) => Err(BillingError::GeneralError(format!(
            "{stage} returned a non-success status"
        ))),
        Err(BillingError::UserCancelled) => Ok(Some(PurchaseOutcome::UserCancelled)),
        Err(err) => Err(err),
    }
}

/// Drives purchases end to end and keeps them single-flight.
///
/// A purchase reserves the shared slot before anything else happens; a
/// second purchase while the slot is taken returns
/// [`PurchaseOutcome::AlreadyInProgress`] without touching the backend.
pub struct PurchaseOrchestrator {
    connection: Arc<ConnectionManager>,
    slot: Arc<PurchaseSlot>,
    purchase_timeout: Duration,
}

impl PurchaseOrchestrator {
    pub fn new(
        connection: Arc<ConnectionManager>,
        slot: Arc<PurchaseSlot>,
        purchase_timeout: Duration,
    ) -> Self {
        Self {
            connection,
            slot,
            purchase_timeout,
        }
    }

    pub fn is_purchase_pending(&self) -> bool {
        self.slot.is_pending()
    }

    pub async fn purchase(&self, request: PurchaseRequest) -> Result<PurchaseOutcome> {
        let client = self.connection.client()?;
        let Some(ticket) = self.slot.try_reserve(PurchaseIntent {
            product_id: request.product_id.clone(),
            item_type: request.item_type,
        }) else {
            debug!(product_id = %request.product_id, "purchase already in progress");
            return Ok(PurchaseOutcome::AlreadyInProgress);
        };

        let account_id = non_blank(request.obfuscated_account_id);
        let profile_id = non_blank(request.obfuscated_profile_id);
        if profile_id.is_some() && account_id.is_none() {
            return Err(BillingError::InvalidArgument(
                "an account id must be set when a profile id is set".to_string(),
            ));
        }

        let product = self
            .lookup_product(client.as_ref(), &request.product_id, request.item_type)
            .await?;
        let offer_token = match request.item_type {
            ItemType::Subscription => non_blank(request.offer_token)
                .or_else(|| product.first_offer_token().map(str::to_string)),
            _ => None,
        };

        let params = BillingFlowParams {
            product,
            offer_token,
            obfuscated_account_id: account_id,
            obfuscated_profile_id: profile_id,
            subscription_update: None,
        };
        self.run_flow(client.as_ref(), ticket, params, &request.product_id, request.item_type)
            .await
    }

    /// Replaces the subscription bought with `old_purchase_token` by
    /// `new_product_id`.
    pub async fn upgrade_subscription(
        &self,
        new_product_id: &str,
        old_purchase_token: &str,
        proration_mode: ProrationMode,
    ) -> Result<PurchaseOutcome> {
        let client = self.connection.client()?;
        let Some(ticket) = self.slot.try_reserve(PurchaseIntent {
            product_id: new_product_id.to_string(),
            item_type: ItemType::Subscription,
        }) else {
            debug!(product_id = new_product_id, "purchase already in progress");
            return Ok(PurchaseOutcome::AlreadyInProgress);
        };

        if old_purchase_token.trim().is_empty() {
            return Err(BillingError::InvalidArgument(
                "the purchase token of the original subscription is required".to_string(),
            ));
        }

        let product = self
            .lookup_product(client.as_ref(), new_product_id, ItemType::Subscription)
            .await?;
        let params = BillingFlowParams {
            offer_token: product.first_offer_token().map(str::to_string),
            product,
            obfuscated_account_id: None,
            obfuscated_profile_id: None,
            subscription_update: Some(SubscriptionUpdate {
                old_purchase_token: old_purchase_token.to_string(),
                proration_mode,
            }),
        };
        self.run_flow(
            client.as_ref(),
            ticket,
            params,
            new_product_id,
            ItemType::Subscription,
        )
        .await
    }

    async fn lookup_product(
        &self,
        client: &dyn BillingClient,
        product_id: &str,
        item_type: ItemType,
    ) -> Result<ProductRecord> {
        let ids = [product_id.to_string()];
        queries::query_products(client, item_type, &ids, InvalidProductPolicy::Ignore)
            .await?
            .into_iter()
            .find(|product| product.product_id == product_id)
            .ok_or_else(|| BillingError::ItemNotFound(format!("{product_id} does not exist")))
    }

    /// Launches the purchase screen and waits for the bridged result. The
    /// ticket is held until the outcome is known, so the slot stays taken
    /// through reconciliation and is freed on every exit path.
    async fn run_flow(
        &self,
        client: &dyn BillingClient,
        ticket: PurchaseTicket,
        params: BillingFlowParams,
        product_id: &str,
        item_type: ItemType,
    ) -> Result<PurchaseOutcome> {
        let Some(rx) = ticket.arm() else {
            return Err(BillingError::Superseded);
        };

        info!(product_id, item_type = ?item_type, "launching purchase flow");
        let launch = client.launch_billing_flow(params);
        if let Some(outcome) = gate(launch.as_ref(), "purchase flow launch")? {
            return Ok(outcome);
        }

        let notification = match tokio::time::timeout(self.purchase_timeout, rx).await {
            Ok(Ok(notification)) => notification,
            Ok(Err(_)) => return Err(BillingError::Superseded),
            Err(_) => {
                warn!(
                    product_id,
                    waited = ?self.slot.pending_for(),
                    "no purchase callback received"
                );
                return Err(BillingError::ServiceTimeout(format!(
                    "no purchase result for {product_id} within {:?}",
                    self.purchase_timeout
                )));
            }
        };

        if let Some(outcome) = gate(Some(&notification.result), "purchase flow")? {
            info!(product_id, "purchase cancelled by user");
            return Ok(outcome);
        }

        let outcome = self
            .reconcile(client, product_id, item_type, notification.purchases)
            .await;
        drop(ticket);
        outcome
    }

    /// Picks the purchase for `product_id` out of the callback payload, or
    /// re-queries owned purchases when the payload came back without it.
    async fn reconcile(
        &self,
        client: &dyn BillingClient,
        product_id: &str,
        item_type: ItemType,
        delivered: Vec<PurchaseRecord>,
    ) -> Result<PurchaseOutcome> {
        if let Some(record) = delivered.into_iter().find(|p| p.covers(product_id)) {
            return Ok(PurchaseOutcome::Purchased(record));
        }

        debug!(product_id, "purchase missing from callback, re-querying owned purchases");
        let owned =
            queries::query_purchases(client, item_type.product_type().item_type()).await?;
        Ok(owned
            .into_iter()
            .find(|p| p.product_id() == product_id)
            .map(PurchaseOutcome::Purchased)
            .unwrap_or(PurchaseOutcome::NoResult))
    }
}
