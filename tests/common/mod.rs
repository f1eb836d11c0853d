#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use coinbot::domain::accounting::Accounting;
use coinbot::domain::error::CoinbotError;
use coinbot::domain::ledger::PositionLedger;
pub use coinbot::domain::ohlcv::{Bar, BarInterval};
use coinbot::domain::position::Position;
use coinbot::domain::strategy::{Strategy, StrategyParams, TickerConfig};
use coinbot::ports::exchange_port::{CASH_ASSET, ExchangePort, OrderReceipt};
use coinbot::ports::ledger_store::LedgerStore;
use coinbot::ports::notifier_port::{CommandSource, InboundEvent, NotifierPort};
use coinbot::trading::coordinator::{ExecutionCoordinator, TradingConfig};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const TICKER: &str = "KRW-BTC";

pub fn ts(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(i as i64)
}

pub fn make_bar(i: usize, open: f64, high: f64, low: f64, close: f64) -> Bar {
    Bar {
        timestamp: ts(i),
        open,
        high,
        low,
        close,
        volume: 1.0,
    }
}

pub fn flat_bar(i: usize, close: f64) -> Bar {
    make_bar(i, close, close, close, close)
}

/// Closes 100, 102, 101, 104: with MA(3) and RSI(2) the last bar has
/// close 104 > MA 102.33 and RSI 75.
pub fn entry_bars() -> Vec<Bar> {
    [100.0, 102.0, 101.0, 104.0]
        .iter()
        .enumerate()
        .map(|(i, c)| flat_bar(i, *c))
        .collect()
}

pub fn params(rsi_limit: f64, risk_ratio: f64) -> StrategyParams {
    StrategyParams {
        rsi_limit,
        take_profit_ratio: 1.10,
        stop_loss_ratio: 0.95,
        risk_ratio,
    }
}

pub fn strategy(params: StrategyParams) -> Strategy {
    Strategy {
        ma_window: 3,
        rsi_period: 2,
        tickers: vec![TickerConfig {
            ticker: TICKER.to_string(),
            params,
        }],
    }
}

#[derive(Default)]
pub struct MockState {
    pub bars: HashMap<(String, BarInterval), Vec<Bar>>,
    pub balances: HashMap<String, f64>,
    pub prices: HashMap<String, f64>,
    pub fill_price: Option<f64>,
    pub failing_balances: HashSet<String>,
    pub fail_orders: bool,
    pub fail_price: bool,
    pub delay: Option<Duration>,
    pub bar_calls: HashMap<BarInterval, usize>,
    pub buys: Vec<(String, f64)>,
    pub sells: Vec<(String, f64)>,
}

/// Scriptable exchange that records every order.
#[derive(Default)]
pub struct MockExchange {
    pub state: Mutex<MockState>,
}

impl MockExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(self, ticker: &str, interval: BarInterval, bars: Vec<Bar>) -> Self {
        self.state
            .lock()
            .unwrap()
            .bars
            .insert((ticker.to_string(), interval), bars);
        self
    }

    pub fn with_balance(self, asset: &str, amount: f64) -> Self {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(asset.to_string(), amount);
        self
    }

    pub fn with_price(self, ticker: &str, price: f64) -> Self {
        self.state
            .lock()
            .unwrap()
            .prices
            .insert(ticker.to_string(), price);
        self
    }

    pub fn with_fill_price(self, price: Option<f64>) -> Self {
        self.state.lock().unwrap().fill_price = price;
        self
    }

    pub fn failing_orders(self) -> Self {
        self.state.lock().unwrap().fail_orders = true;
        self
    }

    pub fn failing_price(self) -> Self {
        self.state.lock().unwrap().fail_price = true;
        self
    }

    pub fn failing_balance(self, asset: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_balances
            .insert(asset.to_string());
        self
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    pub fn bar_calls(&self, interval: BarInterval) -> usize {
        self.state
            .lock()
            .unwrap()
            .bar_calls
            .get(&interval)
            .copied()
            .unwrap_or(0)
    }

    pub fn buys(&self) -> Vec<(String, f64)> {
        self.state.lock().unwrap().buys.clone()
    }

    pub fn sells(&self) -> Vec<(String, f64)> {
        self.state.lock().unwrap().sells.clone()
    }

    pub fn set_bars(&self, ticker: &str, interval: BarInterval, bars: Vec<Bar>) {
        self.state
            .lock()
            .unwrap()
            .bars
            .insert((ticker.to_string(), interval), bars);
    }

    fn receipt(state: &MockState, volume: f64) -> OrderReceipt {
        OrderReceipt {
            order_id: format!("mock-{}", state.buys.len() + state.sells.len()),
            avg_price: state.fill_price,
            executed_volume: Some(volume),
        }
    }
}

#[async_trait]
impl ExchangePort for MockExchange {
    async fn get_bars(
        &self,
        ticker: &str,
        interval: BarInterval,
        count: usize,
    ) -> Result<Vec<Bar>, CoinbotError> {
        let delay = self.state.lock().unwrap().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().unwrap();
        *state.bar_calls.entry(interval).or_insert(0) += 1;
        let mut bars = state
            .bars
            .get(&(ticker.to_string(), interval))
            .cloned()
            .unwrap_or_default();
        let skip = bars.len().saturating_sub(count);
        Ok(bars.split_off(skip))
    }

    async fn get_balance(&self, asset: &str) -> Result<f64, CoinbotError> {
        let state = self.state.lock().unwrap();
        if state.failing_balances.contains(asset) {
            return Err(CoinbotError::BalanceQuery {
                asset: asset.to_string(),
                reason: "mock failure".into(),
            });
        }
        Ok(state.balances.get(asset).copied().unwrap_or(0.0))
    }

    async fn get_current_price(&self, ticker: &str) -> Result<f64, CoinbotError> {
        let state = self.state.lock().unwrap();
        if state.fail_price {
            return Err(CoinbotError::PriceQuery {
                ticker: ticker.to_string(),
                reason: "mock failure".into(),
            });
        }
        state
            .prices
            .get(ticker)
            .copied()
            .ok_or_else(|| CoinbotError::PriceQuery {
                ticker: ticker.to_string(),
                reason: "no price".into(),
            })
    }

    async fn get_current_prices(
        &self,
        tickers: &[String],
    ) -> Result<HashMap<String, f64>, CoinbotError> {
        let state = self.state.lock().unwrap();
        Ok(tickers
            .iter()
            .filter_map(|t| state.prices.get(t).map(|p| (t.clone(), *p)))
            .collect())
    }

    async fn submit_market_buy(
        &self,
        ticker: &str,
        krw_amount: f64,
    ) -> Result<OrderReceipt, CoinbotError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_orders {
            return Err(CoinbotError::OrderExecution {
                ticker: ticker.to_string(),
                reason: "mock rejection".into(),
            });
        }
        let price = state
            .fill_price
            .or_else(|| state.prices.get(ticker).copied())
            .unwrap_or(1.0);
        let volume = krw_amount / price;
        *state.balances.entry(CASH_ASSET.to_string()).or_insert(0.0) -= krw_amount;
        *state.balances.entry(ticker.to_string()).or_insert(0.0) += volume;
        state.buys.push((ticker.to_string(), krw_amount));
        Ok(Self::receipt(&state, volume))
    }

    async fn submit_market_sell(
        &self,
        ticker: &str,
        volume: f64,
    ) -> Result<OrderReceipt, CoinbotError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_orders {
            return Err(CoinbotError::OrderExecution {
                ticker: ticker.to_string(),
                reason: "mock rejection".into(),
            });
        }
        state.balances.insert(ticker.to_string(), 0.0);
        state.sells.push((ticker.to_string(), volume));
        Ok(Self::receipt(&state, volume))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn any_contains(&self, needle: &str) -> bool {
        self.messages().iter().any(|m| m.contains(needle))
    }
}

#[async_trait]
impl NotifierPort for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<(), CoinbotError> {
        self.messages.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

/// In-memory ledger store; clones share the same map.
#[derive(Default, Clone)]
pub struct MemoryLedgerStore {
    pub saved: Arc<Mutex<BTreeMap<String, Position>>>,
    pub saves: Arc<Mutex<usize>>,
}

impl MemoryLedgerStore {
    pub fn with_position(self, position: Position) -> Self {
        self.saved
            .lock()
            .unwrap()
            .insert(position.ticker.clone(), position);
        self
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap()
    }

    pub fn persisted(&self) -> BTreeMap<String, Position> {
        self.saved.lock().unwrap().clone()
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn load(&self) -> Result<BTreeMap<String, Position>, CoinbotError> {
        Ok(self.saved.lock().unwrap().clone())
    }

    fn save(&self, positions: &BTreeMap<String, Position>) -> Result<(), CoinbotError> {
        *self.saved.lock().unwrap() = positions.clone();
        *self.saves.lock().unwrap() += 1;
        Ok(())
    }
}

pub struct Harness {
    pub exchange: Arc<MockExchange>,
    pub notifier: Arc<RecordingNotifier>,
    pub store: MemoryLedgerStore,
    pub coordinator: Arc<ExecutionCoordinator>,
}

pub fn harness(
    exchange: MockExchange,
    store: MemoryLedgerStore,
    strategy: Strategy,
    start_cash: f64,
) -> Harness {
    let exchange = Arc::new(exchange);
    let notifier = Arc::new(RecordingNotifier::default());
    let ledger = PositionLedger::load(Box::new(store.clone())).unwrap();
    let coordinator = Arc::new(ExecutionCoordinator::new(
        exchange.clone(),
        notifier.clone(),
        ledger,
        Accounting::new(start_cash, 0.0005),
        strategy,
        TradingConfig::default(),
    ));
    Harness {
        exchange,
        notifier,
        store,
        coordinator,
    }
}

/// Command source fed from a fixed script; records acknowledgements.
pub struct ScriptedSource {
    pub events: VecDeque<InboundEvent>,
    pub acknowledged: Arc<Mutex<Vec<String>>>,
}

impl ScriptedSource {
    pub fn new(texts: &[&str]) -> Self {
        Self {
            events: texts
                .iter()
                .enumerate()
                .map(|(i, t)| InboundEvent {
                    id: format!("evt-{i}"),
                    text: t.to_string(),
                })
                .collect(),
            acknowledged: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CommandSource for ScriptedSource {
    async fn next_event(&mut self) -> Result<Option<InboundEvent>, CoinbotError> {
        Ok(self.events.pop_front())
    }

    async fn acknowledge(&mut self, id: &str) -> Result<(), CoinbotError> {
        self.acknowledged.lock().unwrap().push(id.to_string());
        Ok(())
    }
}
