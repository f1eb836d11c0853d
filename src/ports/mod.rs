//! Port traits: the seams between domain logic and the outside world.

pub mod config_port;
pub mod data_port;
pub mod exchange_port;
pub mod ledger_store;
pub mod notifier_port;
