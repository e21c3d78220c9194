//! HTTP handlers for the MRP Back Office

pub mod health;
pub mod plan;
pub mod stock;

pub use health::*;
pub use plan::*;
pub use stock::*;
