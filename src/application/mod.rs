//! Application layer: settlement policy and orchestration over the domain ports.
//!
//! [`settlement::SettlementEngine`] is the entry point for money movements;
//! [`sweeper::LoanSweeper`] is the batch operation driven by a scheduler and
//! [`registry::Registry`] manages the records both of them settle against.

pub mod currency;
pub mod effects;
pub mod fees;
pub mod fraud;
pub mod registry;
pub mod settlement;
pub mod sweeper;
pub mod trust;
