//! coinbot: RSI/MA position-trading bot with an offline backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], and the async live-trading loops
//! in [`trading`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod trading;
pub mod cli;
