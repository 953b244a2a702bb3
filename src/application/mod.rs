//! Application layer containing the purchase-session orchestration.
//!
//! `InAppBilling` is the entry point. It owns a `ConnectionManager` for the
//! backend client lifecycle and a `PurchaseOrchestrator` that bridges the
//! backend's purchase callbacks into awaitable, single-flight purchases.

pub mod billing;
pub mod bridge;
pub mod connection;
pub mod orchestrator;
pub mod queries;
pub mod slot;
pub mod translator;
