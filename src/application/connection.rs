use super::bridge::{CallbackBridge, PurchaseSlot};
use super::slot::PendingSlot;
use crate::domain::ports::{
    BillingClient, BillingClientFactoryBox, ClientOptions, ConnectionStateListener,
    PurchaseObserver,
};
use crate::domain::response::BillingResult;
use crate::error::{BillingError, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

/// The connect slot is keyed by connection generation and yields "connected?".
type ConnectSlot = PendingSlot<u64, bool>;

/// State shared with the callbacks of the current backend client.
struct ConnectionShared {
    state: Mutex<ConnectionState>,
    generation: AtomicU64,
    connect_slot: Arc<ConnectSlot>,
}

impl ConnectionShared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != next {
            debug!(from = ?*state, to = ?next, "connection state changed");
            *state = next;
        }
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }
}

/// Connection callbacks bound to one client generation. Callbacks from a
/// client that has since been replaced or torn down are ignored.
struct GenerationListener {
    generation: u64,
    request_id: u64,
    shared: Weak<ConnectionShared>,
}

impl ConnectionStateListener for GenerationListener {
    fn on_setup_finished(&self, result: BillingResult) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if !shared.is_current(self.generation) {
            debug!(generation = self.generation, "ignoring setup result of stale client");
            return;
        }

        let connected = result.is_ok();
        info!(
            generation = self.generation,
            code = %result.response_code,
            message = %result.debug_message,
            "billing setup finished"
        );
        shared.set_state(if connected {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        });
        shared.connect_slot.resolve_id(self.request_id, connected);
    }

    fn on_disconnected(&self) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if shared.is_current(self.generation) {
            warn!(generation = self.generation, "billing service disconnected");
            shared.set_state(ConnectionState::Disconnected);
        }
    }
}

/// Owns the backend client and its connection lifecycle.
pub struct ConnectionManager {
    factory: BillingClientFactoryBox,
    shared: Arc<ConnectionShared>,
    client: RwLock<Option<Arc<dyn BillingClient>>>,
    purchase_slot: Arc<PurchaseSlot>,
    observer: Option<Arc<dyn PurchaseObserver>>,
    connect_timeout: Duration,
    /// Held across the synchronous part of `connect` and `disconnect` so
    /// generation, connect slot and installed client always agree.
    lifecycle: Mutex<()>,
}

impl ConnectionManager {
    /// Creates a disconnected manager.
    ///
    /// # Arguments
    ///
    /// * `factory` - Builds a fresh backend client on every `connect`.
    /// * `purchase_slot` - Slot of the in-flight purchase, cancelled on reconnect.
    /// * `observer` - Receives notifications no purchase is waiting on.
    /// * `connect_timeout` - Upper bound on the connection handshake.
    pub fn new(
        factory: BillingClientFactoryBox,
        purchase_slot: Arc<PurchaseSlot>,
        observer: Option<Arc<dyn PurchaseObserver>>,
        connect_timeout: Duration,
    ) -> Self {
        Self {
            factory,
            shared: Arc::new(ConnectionShared {
                state: Mutex::new(ConnectionState::Disconnected),
                generation: AtomicU64::new(0),
                connect_slot: PendingSlot::new(),
            }),
            client: RwLock::new(None),
            purchase_slot,
            observer,
            connect_timeout,
            lifecycle: Mutex::new(()),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Returns the live client, or `NotConnected` without touching the backend.
    pub fn client(&self) -> Result<Arc<dyn BillingClient>> {
        if !self.is_connected() {
            return Err(BillingError::NotConnected);
        }
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(BillingError::NotConnected)
    }

    /// Builds a new backend client and performs the connection handshake.
    ///
    /// Any pending connect or purchase is cancelled first. Returns whether the
    /// backend reported a successful setup; a handshake that does not finish
    /// within the connect timeout counts as a failed one. Fails with
    /// `Superseded` only when a newer `connect` or a `disconnect` cancelled
    /// this one.
    pub async fn connect(&self, enable_pending_purchases: bool) -> Result<bool> {
        let (generation, _ticket, rx) = {
            let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
            if self.purchase_slot.cancel() {
                info!("cancelled pending purchase in favour of a new connection");
            }

            let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let (ticket, rx) = self.shared.connect_slot.replace(generation);
            self.shared.set_state(ConnectionState::Connecting);
            self.teardown_client();

            let bridge = Arc::new(CallbackBridge::new(
                Arc::clone(&self.purchase_slot),
                self.observer.clone(),
            ));
            let client = self.factory.create(
                ClientOptions {
                    enable_pending_purchases,
                },
                bridge,
            );
            *self.client.write().unwrap_or_else(PoisonError::into_inner) =
                Some(Arc::clone(&client));

            debug!(generation, enable_pending_purchases, "starting billing connection");
            client.start_connection(Arc::new(GenerationListener {
                generation,
                request_id: ticket.id(),
                shared: Arc::downgrade(&self.shared),
            }));
            (generation, ticket, rx)
        };

        match tokio::time::timeout(self.connect_timeout, rx).await {
            Ok(Ok(connected)) => Ok(connected),
            Ok(Err(_)) => {
                debug!(generation, "connect superseded");
                Err(BillingError::Superseded)
            }
            Err(_) => {
                warn!(generation, timeout = ?self.connect_timeout, "billing setup timed out");
                if self.shared.is_current(generation) {
                    self.shared.set_state(ConnectionState::Disconnected);
                }
                Ok(false)
            }
        }
    }

    /// Tears the backend client down. Safe to call repeatedly; teardown
    /// failures are logged and swallowed.
    pub fn disconnect(&self) {
        let _lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        self.shared.generation.fetch_add(1, Ordering::SeqCst);
        self.shared.connect_slot.cancel();
        self.teardown_client();
        self.shared.set_state(ConnectionState::Disconnected);
    }

    fn teardown_client(&self) {
        let previous = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(client) = previous {
            match client.end_connection() {
                Ok(()) => debug!("billing client torn down"),
                Err(err) => warn!(error = %err, "unable to disconnect billing client"),
            }
        }
    }
}
