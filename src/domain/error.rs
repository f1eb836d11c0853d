//! Domain error types.

/// Top-level error type for coinbot.
#[derive(Debug, thiserror::Error)]
pub enum CoinbotError {
    #[error("no bar data for {ticker} ({interval})")]
    DataUnavailable { ticker: String, interval: String },

    #[error("balance query failed for {asset}: {reason}")]
    BalanceQuery { asset: String, reason: String },

    #[error("price query failed for {ticker}: {reason}")]
    PriceQuery { ticker: String, reason: String },

    #[error("order failed for {ticker}: {reason}")]
    OrderExecution { ticker: String, reason: String },

    #[error("notification failed: {reason}")]
    Notification { reason: String },

    #[error("{operation} timed out after {seconds}s")]
    Timeout { operation: String, seconds: u64 },

    #[error("ledger persistence failed at {path}: {reason}")]
    Persistence { path: String, reason: String },

    #[error("invalid ledger operation for {ticker}: {reason}")]
    LedgerInvalid { ticker: String, reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("insufficient data for {ticker}: have {bars} bars, need {minimum}")]
    InsufficientData {
        ticker: String,
        bars: usize,
        minimum: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoinbotError {
    /// True for failures of a single exchange round-trip; the caller skips the
    /// ticker for this cycle and tries again on the next one.
    pub fn is_exchange_failure(&self) -> bool {
        matches!(
            self,
            CoinbotError::DataUnavailable { .. }
                | CoinbotError::BalanceQuery { .. }
                | CoinbotError::PriceQuery { .. }
                | CoinbotError::OrderExecution { .. }
                | CoinbotError::Timeout { .. }
        )
    }
}

impl From<&CoinbotError> for std::process::ExitCode {
    fn from(err: &CoinbotError) -> Self {
        let code: u8 = match err {
            CoinbotError::Io(_) => 1,
            CoinbotError::ConfigParse { .. }
            | CoinbotError::ConfigMissing { .. }
            | CoinbotError::ConfigInvalid { .. } => 2,
            CoinbotError::Persistence { .. } | CoinbotError::LedgerInvalid { .. } => 3,
            CoinbotError::DataUnavailable { .. } | CoinbotError::InsufficientData { .. } => 5,
            CoinbotError::BalanceQuery { .. }
            | CoinbotError::PriceQuery { .. }
            | CoinbotError::OrderExecution { .. }
            | CoinbotError::Timeout { .. }
            | CoinbotError::Notification { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = CoinbotError::OrderExecution {
            ticker: "KRW-BTC".into(),
            reason: "insufficient funds".into(),
        };
        assert_eq!(err.to_string(), "order failed for KRW-BTC: insufficient funds");
    }

    #[test]
    fn exchange_failures_are_classified() {
        let timeout = CoinbotError::Timeout {
            operation: "get_bars".into(),
            seconds: 10,
        };
        assert!(timeout.is_exchange_failure());

        let persistence = CoinbotError::Persistence {
            path: "buy_log.json".into(),
            reason: "disk full".into(),
        };
        assert!(!persistence.is_exchange_failure());
    }

    #[test]
    fn exit_code_for_config_errors() {
        let err = CoinbotError::ConfigMissing {
            section: "bot".into(),
            key: "fee_rate".into(),
        };
        assert_eq!(
            std::process::ExitCode::from(&err),
            std::process::ExitCode::from(2)
        );
    }
}
