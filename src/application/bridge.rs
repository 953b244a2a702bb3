use super::slot::{Delivery, PendingSlot};
use crate::domain::ports::{PurchaseObserver, PurchasesUpdatedListener};
use crate::domain::product::ItemType;
use crate::domain::purchase::PurchaseRecord;
use crate::domain::response::BillingResult;
use std::sync::Arc;
use tracing::{debug, trace};

/// What an in-flight purchase is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseIntent {
    pub product_id: String,
    pub item_type: ItemType,
}

/// A purchase-update notification as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurchaseNotification {
    pub result: BillingResult,
    pub purchases: Vec<PurchaseRecord>,
}

pub type PurchaseSlot = PendingSlot<PurchaseIntent, PurchaseNotification>;

/// Routes backend purchase-update notifications to the awaiting purchase.
///
/// Notifications nobody waits for go to the optional observer; duplicates
/// for an already-resolved purchase are dropped.
pub struct CallbackBridge {
    slot: Arc<PurchaseSlot>,
    observer: Option<Arc<dyn PurchaseObserver>>,
}

impl CallbackBridge {
    pub fn new(slot: Arc<PurchaseSlot>, observer: Option<Arc<dyn PurchaseObserver>>) -> Self {
        Self { slot, observer }
    }

    pub fn on_notification(&self, result: BillingResult, purchases: Vec<PurchaseRecord>) {
        let notification = PurchaseNotification { result, purchases };
        match self.slot.resolve(notification) {
            Delivery::Delivered => {
                debug!(intent = ?self.slot.pending_intent(), "purchase notification delivered");
            }
            Delivery::Duplicate => {
                trace!("duplicate purchase notification ignored");
            }
            Delivery::NoWaiter(notification) => {
                debug!(
                    code = %notification.result.response_code,
                    purchases = notification.purchases.len(),
                    "unsolicited purchase notification"
                );
                if let Some(observer) = &self.observer {
                    observer.on_unsolicited_purchases(&notification.result, &notification.purchases);
                }
            }
        }
    }
}

impl PurchasesUpdatedListener for CallbackBridge {
    fn on_purchases_updated(&self, result: BillingResult, purchases: Vec<PurchaseRecord>) {
        self.on_notification(result, purchases);
    }
}
