//! Core domain types and logic.

pub mod ohlcv;
pub mod position;
pub mod indicator;
pub mod signal;
pub mod strategy;
pub mod ledger;
pub mod accounting;
pub mod backtest;
pub mod universe;
pub mod config_validation;
pub mod error;
