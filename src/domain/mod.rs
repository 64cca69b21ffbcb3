//! Domain layer: records, value objects and the ports the application layer
//! depends on.

pub mod account;
pub mod audit;
pub mod beneficiary;
pub mod holder;
pub mod ids;
pub mod insurance;
pub mod ledger;
pub mod loan;
pub mod merchant;
pub mod money;
pub mod notification;
pub mod ports;
pub mod trust;
