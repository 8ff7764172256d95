//! Domain model: documents, payments, and the pure arithmetic over them.

pub mod allocation;
pub mod document;
pub mod money;
pub mod payment;
pub mod ports;
pub mod totals;
