//! Application layer orchestrating the allocation engine over storage.
//!
//! [`service::AllocationService`] loads a counterparty's documents, runs the
//! pure engine from [`crate::domain::allocation`], and persists the result.

pub mod service;
