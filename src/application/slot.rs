use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

/// Result of offering a value to a [`PendingSlot`].
#[derive(Debug, PartialEq, Eq)]
pub enum Delivery<T> {
    /// The waiting request received the value.
    Delivered,
    /// The request was already resolved; the value was dropped.
    Duplicate,
    /// Nothing is waiting; the value is handed back.
    NoWaiter(T),
}

enum Phase<T> {
    Reserved,
    Armed(oneshot::Sender<T>),
    Resolved,
}

struct Entry<I, T> {
    id: u64,
    intent: I,
    created_at: Instant,
    phase: Phase<T>,
}

/// Single-result slot holding at most one pending request.
///
/// A request moves through reserved -> armed -> resolved and leaves the slot
/// when its [`PendingTicket`] is dropped or when the slot is cancelled.
/// Every transition happens under one mutex, so callback delivery,
/// cancellation and release race safely against each other.
pub struct PendingSlot<I, T> {
    next_id: AtomicU64,
    entry: Mutex<Option<Entry<I, T>>>,
}

impl<I, T> Default for PendingSlot<I, T> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entry: Mutex::new(None),
        }
    }
}

impl<I: Clone, T> PendingSlot<I, T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Entry<I, T>>> {
        self.entry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_entry(&self, intent: I, phase: Phase<T>) -> Entry<I, T> {
        Entry {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            intent,
            created_at: Instant::now(),
            phase,
        }
    }

    /// Claims the slot if it is empty. Never waits and never evicts.
    pub fn try_reserve(self: &Arc<Self>, intent: I) -> Option<PendingTicket<I, T>> {
        let mut guard = self.lock();
        if guard.is_some() {
            return None;
        }
        let entry = self.fresh_entry(intent, Phase::Reserved);
        let id = entry.id;
        *guard = Some(entry);
        Some(PendingTicket {
            slot: Arc::clone(self),
            id,
        })
    }

    /// Claims the slot unconditionally, cancelling whatever was pending.
    pub fn replace(self: &Arc<Self>, intent: I) -> (PendingTicket<I, T>, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        let entry = self.fresh_entry(intent, Phase::Armed(tx));
        let id = entry.id;
        // The previous sender is dropped here; its waiter sees cancellation.
        let _previous = self.lock().replace(entry);
        (
            PendingTicket {
                slot: Arc::clone(self),
                id,
            },
            rx,
        )
    }

    /// Hands `value` to whichever request is armed.
    pub fn resolve(&self, value: T) -> Delivery<T> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(entry) => Self::resolve_entry(entry, value),
            None => Delivery::NoWaiter(value),
        }
    }

    /// Hands `value` to the request `id` only.
    pub fn resolve_id(&self, id: u64, value: T) -> Delivery<T> {
        let mut guard = self.lock();
        match guard.as_mut() {
            Some(entry) if entry.id == id => Self::resolve_entry(entry, value),
            _ => Delivery::NoWaiter(value),
        }
    }

    fn resolve_entry(entry: &mut Entry<I, T>, value: T) -> Delivery<T> {
        match std::mem::replace(&mut entry.phase, Phase::Resolved) {
            Phase::Armed(tx) => {
                // A dropped receiver means the waiter gave up; the request is
                // resolved all the same.
                let _ = tx.send(value);
                Delivery::Delivered
            }
            Phase::Resolved => Delivery::Duplicate,
            Phase::Reserved => {
                entry.phase = Phase::Reserved;
                Delivery::NoWaiter(value)
            }
        }
    }

    /// Drops the pending request, if any. Its waiter observes cancellation.
    pub fn cancel(&self) -> bool {
        self.lock().take().is_some()
    }

    pub fn is_pending(&self) -> bool {
        self.lock().is_some()
    }

    pub fn pending_intent(&self) -> Option<I> {
        self.lock().as_ref().map(|entry| entry.intent.clone())
    }

    /// How long the current request has been outstanding.
    pub fn pending_for(&self) -> Option<Duration> {
        self.lock().as_ref().map(|entry| entry.created_at.elapsed())
    }

    fn arm(&self, id: u64) -> Option<oneshot::Receiver<T>> {
        let mut guard = self.lock();
        let entry = guard.as_mut().filter(|entry| entry.id == id)?;
        if !matches!(entry.phase, Phase::Reserved) {
            return None;
        }
        let (tx, rx) = oneshot::channel();
        entry.phase = Phase::Armed(tx);
        Some(rx)
    }

    fn release(&self, id: u64) -> bool {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|entry| entry.id == id) {
            *guard = None;
            true
        } else {
            false
        }
    }
}

/// Ownership of one request in a [`PendingSlot`]. Dropping it frees the slot
/// unless a newer request already took it over.
pub struct PendingTicket<I: Clone, T> {
    slot: Arc<PendingSlot<I, T>>,
    id: u64,
}

impl<I: Clone, T> PendingTicket<I, T> {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Starts waiting for a value. `None` if the request was cancelled or
    /// armed already.
    pub fn arm(&self) -> Option<oneshot::Receiver<T>> {
        self.slot.arm(self.id)
    }
}

impl<I: Clone, T> Drop for PendingTicket<I, T> {
    fn drop(&mut self) {
        self.slot.release(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_is_exclusive() {
        let slot: Arc<PendingSlot<&str, u32>> = PendingSlot::new();
        let first = slot.try_reserve("sku_a");
        assert!(first.is_some());
        assert!(slot.try_reserve("sku_b").is_none());
        assert_eq!(slot.pending_intent(), Some("sku_a"));

        drop(first);
        assert!(!slot.is_pending());
        assert!(slot.try_reserve("sku_b").is_some());
    }

    #[test]
    fn test_reserved_but_unarmed_slot_does_not_accept_values() {
        let slot: Arc<PendingSlot<&str, u32>> = PendingSlot::new();
        let _ticket = slot.try_reserve("sku_a").unwrap();
        assert_eq!(slot.resolve(7), Delivery::NoWaiter(7));
    }

    #[tokio::test]
    async fn test_resolution_is_exactly_once() {
        let slot: Arc<PendingSlot<&str, u32>> = PendingSlot::new();
        let ticket = slot.try_reserve("sku_a").unwrap();
        let rx = ticket.arm().unwrap();

        assert_eq!(slot.resolve(1), Delivery::Delivered);
        assert_eq!(slot.resolve(2), Delivery::Duplicate);
        assert_eq!(rx.await.unwrap(), 1);

        // Still owned until the ticket goes away.
        assert!(slot.is_pending());
        drop(ticket);
        assert_eq!(slot.resolve(3), Delivery::NoWaiter(3));
    }

    #[tokio::test]
    async fn test_replace_cancels_previous_waiter() {
        let slot: Arc<PendingSlot<u8, bool>> = PendingSlot::new();
        let (first, first_rx) = slot.replace(1);
        let first_id = first.id();
        let (second, second_rx) = slot.replace(2);

        assert!(first_rx.await.is_err());
        drop(first);
        assert!(slot.is_pending(), "stale ticket must not free the slot");

        assert_eq!(slot.resolve_id(first_id, true), Delivery::NoWaiter(true));
        assert_eq!(slot.resolve_id(second.id(), true), Delivery::Delivered);
        assert!(second_rx.await.unwrap());
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let slot: Arc<PendingSlot<&str, u32>> = PendingSlot::new();
        let ticket = slot.try_reserve("sku_a").unwrap();
        let rx = ticket.arm().unwrap();

        assert!(slot.cancel());
        assert!(rx.await.is_err());
        assert!(ticket.arm().is_none());
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_pending_for_tracks_age() {
        let slot: Arc<PendingSlot<&str, u32>> = PendingSlot::new();
        assert!(slot.pending_for().is_none());
        let _ticket = slot.try_reserve("sku_a").unwrap();
        assert!(slot.pending_for().is_some());
    }
}
