//! Shared types and domain logic for the MRP Back Office
//!
//! This crate contains the pure, database-free core of the production
//! planning and inventory engine: the plan lifecycle state machine,
//! ledger transaction classification, requirement arithmetic, and the
//! FEFO lot allocation planner. The backend wraps these in sqlx
//! transactions; tests exercise them directly.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
