//! Outbound notifications and the inbound command channel.

use async_trait::async_trait;

use crate::domain::error::CoinbotError;

#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Best effort; callers log a failure and carry on.
    async fn send(&self, text: &str) -> Result<(), CoinbotError>;
}

/// A raw inbound message, before command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub id: String,
    pub text: String,
}

#[async_trait]
pub trait CommandSource: Send {
    /// Next inbound event, or `None` once the channel is closed.
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoinbotError>;

    async fn acknowledge(&mut self, id: &str) -> Result<(), CoinbotError>;
}
