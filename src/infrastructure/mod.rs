//! Backend implementations behind the domain ports.

pub mod sandbox;
