//! Single-flight in-app billing layer over an asynchronous store backend.
//!
//! [`application::billing::InAppBilling`] is the entry point. Backends plug in
//! through the traits in [`domain::ports`]; [`infrastructure::sandbox`] ships a
//! scriptable in-process backend.

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod interfaces;
pub mod logging;
