//! Business logic services for the MRP Back Office

pub mod allocation;
pub mod audit;
pub mod bom;
pub mod material;
pub mod plan;
pub mod requirement;
pub mod stock;
pub mod warehouse;

pub use allocation::AllocationEngine;
pub use audit::AuditService;
pub use bom::BomService;
pub use material::MaterialService;
pub use plan::PlanService;
pub use requirement::RequirementService;
pub use stock::StockService;
pub use warehouse::WarehouseService;
