// src/db.rs

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryStorage;
pub use postgres::PgStorage;
pub use store::{RentalStore, Storage};
