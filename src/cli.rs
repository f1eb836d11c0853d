//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::console::{ConsoleNotifier, LineCommandSource};
use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_ledger_adapter::JsonLedgerStore;
use crate::adapters::paper_exchange::PaperExchange;
use crate::domain::accounting::Accounting;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{
    configured_tickers, validate_backtest_config, validate_bot_config, validate_strategy_config,
};
use crate::domain::error::CoinbotError;
use crate::domain::ledger::PositionLedger;
use crate::domain::ohlcv::BarInterval;
use crate::domain::strategy::{Strategy, StrategyParams, TickerConfig};
use crate::domain::universe::{ScreenConfig, SkipReason, screen_universe};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::exchange_port::{CASH_ASSET, ExchangePort};
use crate::ports::notifier_port::NotifierPort;
use crate::trading::command::Command as BotCommand;
use crate::trading::coordinator::{ExecutionCoordinator, TradingConfig};
use crate::trading::schedule::ScheduleConfig;
use crate::trading::scheduler::LoopScheduler;

#[derive(Parser, Debug)]
#[command(name = "coinbot", about = "RSI/MA position-trading bot and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the trading loops against the paper exchange, commands on stdin
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Start trading immediately instead of waiting for a start command
        #[arg(long)]
        start: bool,
    },
    /// Replay stored bars through the strategy
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ticker: Option<String>,
    },
    /// List high-volume tickers trading near their moving average
    Screen {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        ratio: Option<f64>,
        #[arg(long)]
        band: Option<f64>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Run { config, start } => run_live(&config, start),
        Command::Backtest { config, ticker } => run_backtest(&config, ticker.as_deref()),
        Command::Screen {
            config,
            ratio,
            band,
        } => run_screen(&config, ratio, band),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &CoinbotError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| fail(&e))
}

fn parse_interval(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: BarInterval,
) -> Result<BarInterval, CoinbotError> {
    match config.get_string(section, key) {
        None => Ok(default),
        Some(raw) => BarInterval::parse(&raw).ok_or_else(|| CoinbotError::ConfigInvalid {
            section: section.into(),
            key: key.into(),
            reason: format!("unknown interval '{raw}'"),
        }),
    }
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<Strategy, CoinbotError> {
    validate_strategy_config(config)?;

    let tickers = configured_tickers(config)?
        .into_iter()
        .map(|ticker| TickerConfig {
            params: StrategyParams {
                rsi_limit: config.get_double(&ticker, "rsi_limit", 0.0),
                take_profit_ratio: config.get_double(&ticker, "take_profit_ratio", 0.0),
                stop_loss_ratio: config.get_double(&ticker, "stop_loss_ratio", 0.0),
                risk_ratio: config.get_double(&ticker, "risk_ratio", 0.0),
            },
            ticker,
        })
        .collect();

    Ok(Strategy {
        ma_window: config.get_int("indicators", "ma_window", 20) as usize,
        rsi_period: config.get_int("indicators", "rsi_period", 14) as usize,
        tickers,
    })
}

pub fn build_trading_config(config: &dyn ConfigPort) -> Result<TradingConfig, CoinbotError> {
    let defaults = TradingConfig::default();
    Ok(TradingConfig {
        fee_rate: config.get_double("bot", "fee_rate", defaults.fee_rate),
        min_order_krw: config.get_double("bot", "min_order_krw", defaults.min_order_krw),
        fee_buffer: config.get_double("bot", "fee_buffer", defaults.fee_buffer),
        allocation_guard: config.get_double("bot", "allocation_guard", defaults.allocation_guard),
        request_timeout: config.get_secs("bot", "request_timeout_secs", 10),
        buy_bar_interval: parse_interval(
            config,
            "indicators",
            "buy_bar_interval",
            defaults.buy_bar_interval,
        )?,
        buy_bar_count: config.get_int("indicators", "buy_bar_count", 50).max(1) as usize,
        sell_bar_interval: parse_interval(
            config,
            "indicators",
            "sell_bar_interval",
            defaults.sell_bar_interval,
        )?,
        sell_bar_count: config.get_int("indicators", "sell_bar_count", 1).max(1) as usize,
    })
}

pub fn build_schedule_config(config: &dyn ConfigPort) -> ScheduleConfig {
    ScheduleConfig {
        buy_interval_hours: config.get_int("schedule", "buy_interval_hours", 4).clamp(1, 24) as u32,
        buy_settle: config.get_secs("schedule", "buy_settle_secs", 60),
        stopped_poll: config.get_secs("schedule", "stopped_poll_secs", 5),
        sell_interval: config.get_secs("schedule", "sell_interval_secs", 300),
        sell_idle: config.get_secs("schedule", "sell_idle_secs", 600),
        error_backoff: config.get_secs("schedule", "error_backoff_secs", 60),
    }
}

/// Per-ticker backtest setup: start cash is the ticker's share of the total.
pub fn build_backtest_config(
    config: &dyn ConfigPort,
    strategy: &Strategy,
    ticker: &str,
) -> BacktestConfig {
    let total = config.get_double("backtest", "total_investment", 1_000_000.0);
    let allocation = config.get_double(ticker, "allocation", 1.0);
    BacktestConfig {
        start_cash: total * allocation,
        fee_rate: config.get_double("bot", "fee_rate", 0.0005),
        ma_window: strategy.ma_window,
        rsi_period: strategy.rsi_period,
    }
}

fn data_dir(config: &dyn ConfigPort) -> PathBuf {
    PathBuf::from(
        config
            .get_string("data", "dir")
            .unwrap_or_else(|| "data".to_string()),
    )
}

fn run_live(config_path: &Path, start: bool) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_bot_config(&adapter) {
        return fail(&e);
    }
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let trading = match build_trading_config(&adapter) {
        Ok(t) => t,
        Err(e) => return fail(&e),
    };
    let schedule = build_schedule_config(&adapter);

    let ledger_path = PathBuf::from(
        adapter
            .get_string("bot", "ledger_path")
            .unwrap_or_else(|| "buy_log.json".to_string()),
    );
    let ledger = match PositionLedger::load(Box::new(JsonLedgerStore::new(ledger_path))) {
        Ok(l) => l,
        Err(e) => return fail(&e),
    };

    // restored positions are seeded into the paper book so they can be sold
    let mut exchange = PaperExchange::new(
        Box::new(CsvAdapter::new(data_dir(&adapter))),
        adapter.get_double("paper", "initial_krw", 1_000_000.0),
        trading.fee_rate,
        trading.sell_bar_interval,
    );
    for position in ledger.snapshot().values() {
        exchange = exchange.with_holding(
            &position.ticker,
            position.invested_amount / position.avg_buy_price,
        );
    }
    let exchange: Arc<dyn ExchangePort> = Arc::new(exchange);
    let notifier: Arc<dyn NotifierPort> = Arc::new(ConsoleNotifier);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => return fail(&CoinbotError::Io(e)),
    };

    let result = runtime.block_on(async move {
        let start_cash = match adapter.get_string("bot", "start_cash") {
            Some(_) => adapter.get_double("bot", "start_cash", 0.0),
            None => exchange.get_balance(CASH_ASSET).await?,
        };
        tracing::info!(
            tickers = ?strategy.ticker_names(),
            open_positions = ledger.len(),
            start_cash,
            "coinbot starting"
        );

        let coordinator = Arc::new(ExecutionCoordinator::new(
            exchange,
            notifier,
            ledger,
            Accounting::new(start_cash, trading.fee_rate),
            strategy,
            trading,
        ));
        coordinator
            .notify("coinbot ready: type start, stop or status")
            .await;

        let mut scheduler = LoopScheduler::new(Arc::clone(&coordinator), schedule);
        if start {
            if let Some(reply) = scheduler.apply(BotCommand::Start).await {
                coordinator.notify(&reply).await;
            }
        }

        let mut source = LineCommandSource::stdin();
        scheduler.run(&mut source).await?;

        eprintln!("\n=== Session Summary ===");
        eprintln!("{}", coordinator.status_report(false));
        Ok::<(), CoinbotError>(())
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_backtest(config_path: &Path, ticker_override: Option<&str>) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    if let Err(e) = validate_backtest_config(&adapter) {
        return fail(&e);
    }
    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let interval = match parse_interval(&adapter, "backtest", "interval", BarInterval::Minute240) {
        Ok(i) => i,
        Err(e) => return fail(&e),
    };

    let tickers: Vec<&TickerConfig> = match ticker_override {
        Some(t) => {
            let wanted = t.trim().to_uppercase();
            match strategy.tickers.iter().find(|c| c.ticker == wanted) {
                Some(c) => vec![c],
                None => {
                    eprintln!("error: {wanted} is not configured under [trading] tickers");
                    return ExitCode::from(2);
                }
            }
        }
        None => strategy.tickers.iter().collect(),
    };

    let data_port = CsvAdapter::new(data_dir(&adapter));
    let mut results = Vec::new();

    for ticker in tickers {
        let bt_config = build_backtest_config(&adapter, &strategy, &ticker.ticker);
        if bt_config.start_cash <= 0.0 {
            eprintln!("Skipping {}: no allocation", ticker.ticker);
            continue;
        }

        let bars = match data_port.fetch_bars(&ticker.ticker, interval) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("warning: skipping {} ({})", ticker.ticker, e);
                continue;
            }
        };
        eprintln!(
            "Running backtest: {} ({} bars, {}, start cash {:.0} KRW)",
            ticker.ticker,
            bars.len(),
            interval,
            bt_config.start_cash
        );

        match backtest_engine::run_backtest(&ticker.ticker, &bars, &ticker.params, &bt_config) {
            Ok(result) => results.push(result),
            Err(e) => eprintln!("warning: skipping {} ({})", ticker.ticker, e),
        }
    }

    if results.is_empty() {
        eprintln!("error: no tickers with enough data to backtest");
        return ExitCode::from(5);
    }

    print_backtest_summary(&results);
    ExitCode::SUCCESS
}

fn print_backtest_summary(results: &[BacktestResult]) {
    for result in results {
        eprintln!("\n=== {} ===", result.ticker);
        eprintln!("Bars Processed:   {}", result.bars_processed);
        eprintln!("{}", result.run_state());
    }

    if results.len() > 1 {
        let start: f64 = results.iter().map(|r| r.run_state().start_cash).sum();
        let end: f64 = results.iter().map(|r| r.run_state().current_cash).sum();
        let trades: usize = results.iter().map(|r| r.trades.len()).sum();
        let fees: f64 = results.iter().map(|r| r.run_state().total_fee_paid).sum();
        eprintln!("\n=== Aggregate ===");
        eprintln!("Trades:           {}", trades);
        eprintln!("Start Cash:       {:.0} KRW", start);
        eprintln!("End Cash:         {:.0} KRW", end);
        eprintln!("Profit:           {:.0} KRW", end - start);
        eprintln!("Fees Paid:        {:.0} KRW", fees);
    }
}

pub fn build_screen_config(
    config: &dyn ConfigPort,
    ratio: Option<f64>,
    band: Option<f64>,
) -> Result<ScreenConfig, CoinbotError> {
    let volume_ratio = ratio.unwrap_or_else(|| config.get_double("screen", "volume_ratio", 0.1));
    if !(volume_ratio > 0.0 && volume_ratio <= 1.0) {
        return Err(CoinbotError::ConfigInvalid {
            section: "screen".into(),
            key: "volume_ratio".into(),
            reason: "volume_ratio must be in (0, 1]".into(),
        });
    }
    let band = band.unwrap_or_else(|| config.get_double("screen", "band", 0.05));
    if !(0.0..1.0).contains(&band) {
        return Err(CoinbotError::ConfigInvalid {
            section: "screen".into(),
            key: "band".into(),
            reason: "band must be in [0, 1)".into(),
        });
    }
    Ok(ScreenConfig {
        volume_ratio,
        band,
        ma_window: config.get_int("indicators", "ma_window", 20).max(1) as usize,
        rsi_period: config.get_int("indicators", "rsi_period", 14).max(1) as usize,
        interval: parse_interval(config, "screen", "interval", BarInterval::Minute60)?,
    })
}

fn run_screen(config_path: &Path, ratio: Option<f64>, band: Option<f64>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let screen = match build_screen_config(&adapter, ratio, band) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let data_port = CsvAdapter::new(data_dir(&adapter));
    let result = match screen_universe(&data_port, &screen) {
        Ok(r) => r,
        Err(e) => return fail(&e),
    };

    eprintln!(
        "Screening top {:.0}% by volume: {} candidates",
        screen.volume_ratio * 100.0,
        result.candidates.len()
    );
    for hit in &result.hits {
        let rsi = hit
            .rsi
            .map(|r| format!("{r:.2}"))
            .unwrap_or_else(|| "n/a".into());
        println!(
            "{} | close {:.2} | MA{} {:.2} (±{:.0}%) | RSI {}",
            hit.ticker,
            hit.close,
            screen.ma_window,
            hit.ma,
            screen.band * 100.0,
            rsi
        );
    }
    for skipped in &result.skipped {
        match &skipped.reason {
            SkipReason::NoData => eprintln!("  {}: no {} bars", skipped.ticker, screen.interval),
            SkipReason::InsufficientBars { bars } => {
                eprintln!("  {}: only {} bars", skipped.ticker, bars)
            }
            SkipReason::OutsideBand => {}
        }
    }
    eprintln!("{} tickers inside the band", result.hits.len());
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let checks: [fn(&dyn ConfigPort) -> Result<(), CoinbotError>; 3] = [
        validate_bot_config,
        validate_strategy_config,
        validate_backtest_config,
    ];
    for check in checks {
        if let Err(e) = check(&adapter) {
            return fail(&e);
        }
    }

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    if let Err(e) = build_trading_config(&adapter) {
        return fail(&e);
    }

    eprintln!(
        "\nIndicators: MA({}) RSI({})",
        strategy.ma_window, strategy.rsi_period
    );
    eprintln!("Tickers:");
    for t in &strategy.tickers {
        eprintln!(
            "  {}: rsi < {}, take-profit x{}, stop-loss x{}, risk {}",
            t.ticker,
            t.params.rsi_limit,
            t.params.take_profit_ratio,
            t.params.stop_loss_ratio,
            t.params.risk_ratio
        );
    }

    eprintln!("\nConfiguration is valid.");
    ExitCode::SUCCESS
}
