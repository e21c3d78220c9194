//! Domain models for the MRP Back Office

mod allocation;
mod plan;
mod requirement;
mod transaction;

pub use allocation::*;
pub use plan::*;
pub use requirement::*;
pub use transaction::*;
