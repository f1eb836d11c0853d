//! Ledger persistence port.

use std::collections::BTreeMap;

use crate::domain::error::CoinbotError;
use crate::domain::position::Position;

/// Whole-snapshot persistence for the open-position ledger. `save` always
/// receives the complete map; there are no incremental writes.
pub trait LedgerStore: Send {
    fn load(&self) -> Result<BTreeMap<String, Position>, CoinbotError>;

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), CoinbotError>;
}
