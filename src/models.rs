pub mod amendments;
pub mod contracts;
pub mod inventory;
