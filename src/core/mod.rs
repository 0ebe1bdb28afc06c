//! Core job engine: identifiers, drivers, resources, jobs, transactions.

pub mod driver;
pub mod job;
pub mod resource;
pub mod txn;
pub mod types;
