//! Concrete adapter implementations for ports.

pub mod console;
pub mod csv_adapter;
pub mod file_config_adapter;
pub mod json_ledger_adapter;
pub mod paper_exchange;
