// src/services.rs

pub mod allocation;
pub mod amendment_service;
pub mod contract_service;
pub mod inventory_service;

pub use amendment_service::AmendmentService;
pub use contract_service::ContractService;
pub use inventory_service::InventoryService;
