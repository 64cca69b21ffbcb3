//! Adapters for the domain ports: storage backends, the HTTP exchange-rate
//! provider, notification delivery and audit sinks.

pub mod audit;
pub mod exchange_rates;
pub mod in_memory;
pub mod ledger;
pub mod notifications;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
