//! Terminal transports: notifications to stdout, commands from stdin.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};

use crate::domain::error::CoinbotError;
use crate::ports::notifier_port::{CommandSource, InboundEvent, NotifierPort};

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl NotifierPort for ConsoleNotifier {
    async fn send(&self, text: &str) -> Result<(), CoinbotError> {
        tracing::info!(target: "coinbot::notify", "{text}");
        println!("{text}");
        Ok(())
    }
}

/// Reads one command per line. Event ids are line numbers.
pub struct LineCommandSource<R> {
    lines: Lines<BufReader<R>>,
    line_no: u64,
}

impl<R: AsyncRead + Unpin + Send> LineCommandSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
            line_no: 0,
        }
    }
}

impl LineCommandSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> CommandSource for LineCommandSource<R> {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoinbotError> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            self.line_no += 1;
            let text = line.trim();
            if text.is_empty() {
                continue;
            }
            return Ok(Some(InboundEvent {
                id: self.line_no.to_string(),
                text: text.to_string(),
            }));
        }
    }

    async fn acknowledge(&mut self, id: &str) -> Result<(), CoinbotError> {
        tracing::debug!(%id, "command acknowledged");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_non_blank_lines_with_ids() {
        let mut source = LineCommandSource::new(&b"start\n\n  stop  \n"[..]);

        let first = source.next_event().await.unwrap().unwrap();
        assert_eq!(first, InboundEvent { id: "1".into(), text: "start".into() });

        let second = source.next_event().await.unwrap().unwrap();
        assert_eq!(second, InboundEvent { id: "3".into(), text: "stop".into() });

        assert!(source.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn console_notifier_never_fails() {
        assert!(ConsoleNotifier.send("hello").await.is_ok());
    }
}
