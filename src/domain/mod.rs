//! Domain layer: value types exchanged with the billing backend and the
//! ports through which the backend is reached.

pub mod ports;
pub mod product;
pub mod purchase;
pub mod response;
