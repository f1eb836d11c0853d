//! Buy loop, sell loop and the command gate that starts and stops them.
//!
//! The run status lives in a `watch` channel. The buy loop is spawned once
//! and idles while stopped. The sell loop is spawned on each Start and gets
//! its own stop signal, which it observes at its next poll boundary.

use chrono::Local;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::domain::error::CoinbotError;
use crate::ports::notifier_port::CommandSource;
use crate::trading::command::Command;
use crate::trading::coordinator::{BuyOutcome, ExecutionCoordinator, SellOutcome};
use crate::trading::schedule::{ScheduleConfig, next_candle_boundary, wait_until};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Stopped,
    Running,
}

struct SellTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

pub struct LoopScheduler {
    coordinator: Arc<ExecutionCoordinator>,
    schedule: ScheduleConfig,
    status: watch::Sender<RunStatus>,
    buy_task: Option<JoinHandle<()>>,
    sell_task: Option<SellTask>,
}

impl LoopScheduler {
    pub fn new(coordinator: Arc<ExecutionCoordinator>, schedule: ScheduleConfig) -> Self {
        let (status, _) = watch::channel(RunStatus::Stopped);
        Self {
            coordinator,
            schedule,
            status,
            buy_task: None,
            sell_task: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status.subscribe()
    }

    /// Spawn the buy loop if it is not already running.
    pub fn spawn_buy_loop(&mut self) {
        if self.buy_task.is_some() {
            return;
        }
        let coordinator = Arc::clone(&self.coordinator);
        let schedule = self.schedule.clone();
        let status = self.status.subscribe();
        self.buy_task = Some(tokio::spawn(buy_loop(coordinator, schedule, status)));
    }

    /// Apply one command and return the reply, if any.
    pub async fn apply(&mut self, command: Command) -> Option<String> {
        match command {
            Command::Start => {
                if self.status() == RunStatus::Running {
                    return Some("already running".into());
                }
                if let Some(previous) = self.sell_task.take() {
                    if let Err(e) = previous.handle.await {
                        tracing::error!(error = %e, "previous sell loop panicked");
                    }
                }
                self.status.send_replace(RunStatus::Running);
                self.sell_task = Some(self.spawn_sell_loop());
                tracing::info!("trading started");
                Some("trading started".into())
            }
            Command::Stop => {
                if self.status() == RunStatus::Stopped {
                    return Some("already stopped".into());
                }
                self.status.send_replace(RunStatus::Stopped);
                if let Some(task) = &self.sell_task {
                    task.stop.send_replace(true);
                }
                tracing::info!("trading stopping");
                Some("trading stopping; in-flight orders will complete".into())
            }
            Command::Status => Some(
                self.coordinator
                    .status_report(self.status() == RunStatus::Running),
            ),
            Command::Unknown(text) => {
                tracing::warn!(%text, "ignoring unknown command");
                None
            }
        }
    }

    fn spawn_sell_loop(&self) -> SellTask {
        let (stop, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sell_loop(
            Arc::clone(&self.coordinator),
            self.schedule.clone(),
            stop_rx,
        ));
        SellTask { stop, handle }
    }

    /// Drive the command gate until the source closes, then shut down.
    pub async fn run<S>(mut self, source: &mut S) -> Result<(), CoinbotError>
    where
        S: CommandSource + ?Sized,
    {
        self.spawn_buy_loop();

        loop {
            let event = match source.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(e) => {
                    tracing::error!(error = %e, "command source failed");
                    self.coordinator
                        .notify(&format!("command channel error: {e}"))
                        .await;
                    sleep(self.schedule.error_backoff).await;
                    continue;
                }
            };

            if let Err(e) = source.acknowledge(&event.id).await {
                tracing::warn!(id = %event.id, error = %e, "acknowledge failed");
            }

            let command = Command::parse(&event.text);
            tracing::debug!(id = %event.id, ?command, "command received");
            if let Some(reply) = self.apply(command).await {
                self.coordinator.notify(&reply).await;
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Stop both loops and wait for them to finish their current cycle.
    pub async fn shutdown(mut self) {
        self.status.send_replace(RunStatus::Stopped);
        if let Some(task) = self.sell_task.take() {
            task.stop.send_replace(true);
            if let Err(e) = task.handle.await {
                tracing::error!(error = %e, "sell loop panicked");
            }
        }
        let buy_task = self.buy_task.take();
        // closing the status channel ends the buy loop
        drop(self.status);
        if let Some(handle) = buy_task {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "buy loop panicked");
            }
        }
        tracing::info!("scheduler shut down");
    }
}

fn is_running(status: &watch::Receiver<RunStatus>) -> bool {
    *status.borrow() == RunStatus::Running
}

async fn buy_loop(
    coordinator: Arc<ExecutionCoordinator>,
    schedule: ScheduleConfig,
    mut status: watch::Receiver<RunStatus>,
) {
    loop {
        if !is_running(&status) {
            tokio::select! {
                _ = sleep(schedule.stopped_poll) => {}
                changed = status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
            continue;
        }

        let now = Local::now().naive_local();
        let wake = next_candle_boundary(now, schedule.buy_interval_hours, schedule.buy_settle);
        tracing::debug!(%wake, "buy loop waiting for next candle");
        tokio::select! {
            _ = sleep(wait_until(now, wake)) => {}
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        }

        if !is_running(&status) {
            continue;
        }
        if run_buy_cycle(&coordinator, &status).await {
            sleep(schedule.error_backoff).await;
        }
    }
    tracing::info!("buy loop stopped");
}

/// One pass over the configured tickers. Returns true if an unexpected
/// failure asks for a backoff.
async fn run_buy_cycle(
    coordinator: &ExecutionCoordinator,
    status: &watch::Receiver<RunStatus>,
) -> bool {
    let mut failed = false;
    for ticker in &coordinator.strategy().tickers {
        if !is_running(status) {
            tracing::info!("stopped during buy cycle");
            break;
        }
        match coordinator.try_buy(&ticker.ticker, &ticker.params).await {
            Ok(BuyOutcome::Bought { amount_krw, .. }) => {
                tracing::info!(ticker = %ticker.ticker, amount_krw, "buy cycle: bought");
            }
            Ok(outcome) => {
                tracing::debug!(ticker = %ticker.ticker, ?outcome, "buy cycle: no order");
            }
            Err(e) => failed |= report_failure(coordinator, &ticker.ticker, "buy", &e).await,
        }
    }
    failed
}

async fn sell_loop(
    coordinator: Arc<ExecutionCoordinator>,
    schedule: ScheduleConfig,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }

        let open = coordinator.open_tickers();
        let wait = if open.is_empty() {
            schedule.sell_idle
        } else if run_sell_cycle(&coordinator, &open).await {
            schedule.error_backoff
        } else {
            schedule.sell_interval
        };

        tokio::select! {
            _ = sleep(wait) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    tracing::info!("sell loop stopped");
}

async fn run_sell_cycle(coordinator: &ExecutionCoordinator, open: &[String]) -> bool {
    let mut failed = false;
    for ticker in open {
        let Some(params) = coordinator.strategy().params_for(ticker).copied() else {
            tracing::warn!(%ticker, "open position for unconfigured ticker, skipping");
            continue;
        };
        match coordinator.try_sell(ticker, &params).await {
            Ok(SellOutcome::Sold { trade, reason }) => {
                tracing::info!(%ticker, %reason, realized_pnl = trade.realized_pnl, "sell cycle: sold");
            }
            Ok(outcome) => tracing::debug!(%ticker, ?outcome, "sell cycle: no order"),
            Err(e) => failed |= report_failure(coordinator, ticker, "sell", &e).await,
        }
    }
    failed
}

/// Log and notify a per-ticker failure. Exchange failures only skip the
/// ticker; anything else is reported as unexpected.
async fn report_failure(
    coordinator: &ExecutionCoordinator,
    ticker: &str,
    action: &str,
    error: &CoinbotError,
) -> bool {
    if error.is_exchange_failure() {
        tracing::warn!(%ticker, action, %error, "skipping ticker this cycle");
        coordinator
            .notify(&format!("[{ticker}] {action} skipped: {error}"))
            .await;
        false
    } else {
        tracing::error!(%ticker, action, %error, "unexpected failure");
        coordinator
            .notify(&format!("[{ticker}] {action} failed unexpectedly: {error}"))
            .await;
        true
    }
}
