//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{self, DataSettings};
use crate::domain::error::EvotraderError;
use crate::domain::expr::ExprEvaluator;
use crate::domain::indicator::compute_indicators;
use crate::domain::metrics::{Performance, max_drawdown};
use crate::domain::optimizer::de::DifferentialEvolution;
use crate::domain::optimizer::ga::GeneticAlgorithm;
use crate::domain::optimizer::gp::GeneticProgramming;
use crate::domain::optimizer::OptimizationReport;
use crate::domain::params::{ParamCandidate, ParamEvaluator};
use crate::domain::price_series::PriceSeries;
use crate::domain::simulator::SimulationConfig;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;

#[derive(Parser, Debug)]
#[command(name = "evotrader", about = "Evolutionary trading strategy search and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay the fixed [backtest] strategy over the configured symbol
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Search for a strategy with one of the optimizers
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long, value_enum, default_value_t = Method::Ga)]
        method: Method,
        #[arg(long)]
        symbol: Option<String>,
        /// Override the seed of the chosen method
        #[arg(long)]
        seed: Option<u64>,
        /// Score each population with rayon
        #[arg(long)]
        parallel: bool,
    },
    /// Validate a configuration without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Show available symbols, or the data range and latest indicators of one
    Info {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Generational genetic algorithm over MACD/RSI parameters
    Ga,
    /// Differential evolution with Gaussian local search
    De,
    /// Genetic programming over buy/sell expressions
    Gp,
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest { config, symbol } => run_backtest(&config, symbol),
        Command::Optimize {
            config,
            method,
            symbol,
            seed,
            parallel,
        } => run_optimize(&config, method, symbol, seed, parallel),
        Command::Validate { config } => run_validate(&config),
        Command::Info { config, symbol } => run_info(&config, symbol.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, EvotraderError> {
    eprintln!("Loading config from {}", path.display());
    FileConfigAdapter::from_file(path)
}

/// Reads the configured symbol, failing when it has fewer than `min_bars` bars.
pub fn load_series(
    data_port: &dyn DataPort,
    settings: &DataSettings,
) -> Result<PriceSeries, EvotraderError> {
    let series = data_port.fetch_ohlcv(&settings.symbol)?;
    if series.len() < settings.min_bars {
        return Err(EvotraderError::InsufficientData {
            symbol: settings.symbol.clone(),
            bars: series.len(),
            minimum: settings.min_bars,
        });
    }
    eprintln!("Loaded {} bars for {}", series.len(), settings.symbol);
    Ok(series)
}

fn data_settings(
    config: &dyn ConfigPort,
    symbol_override: Option<String>,
) -> Result<DataSettings, EvotraderError> {
    let mut settings = config_validation::build_data_settings(config)?;
    if let Some(symbol) = symbol_override {
        settings.symbol = symbol;
    }
    Ok(settings)
}

fn run_backtest(config_path: &PathBuf, symbol: Option<String>) -> Result<(), EvotraderError> {
    let config = load_config(config_path)?;
    let settings = data_settings(&config, symbol)?;
    let sim = config_validation::build_simulation_config(&config)?;
    let strategy = config_validation::build_backtest_strategy(&config)?;

    let data_port = CsvAdapter::new(settings.path.clone());
    let series = load_series(&data_port, &settings)?;

    eprintln!("Backtesting {}", strategy);
    let (result, perf) = strategy.backtest(&series, &sim)?;
    print_performance(&perf, &result.equity_curve);
    Ok(())
}

fn run_optimize(
    config_path: &PathBuf,
    method: Method,
    symbol: Option<String>,
    seed: Option<u64>,
    parallel: bool,
) -> Result<(), EvotraderError> {
    let config = load_config(config_path)?;
    let settings = data_settings(&config, symbol)?;
    let sim = config_validation::build_simulation_config(&config)?;

    match method {
        Method::Ga => {
            let mut ga_config = config_validation::build_ga_config(&config)?;
            ga_config.seed = seed.unwrap_or(ga_config.seed);
            ga_config.parallel |= parallel;
            let ga = GeneticAlgorithm::new(ga_config, config_validation::build_gene_bounds(&config)?)?;

            let series = load_series(&CsvAdapter::new(settings.path.clone()), &settings)?;
            let evaluator = ParamEvaluator::new(&series, sim)?;
            let report = ga.run(&evaluator)?;
            finish_param_search(&report, &series, &sim)
        }
        Method::De => {
            let mut de_config = config_validation::build_de_config(&config)?;
            de_config.seed = seed.unwrap_or(de_config.seed);
            de_config.parallel |= parallel;
            let de =
                DifferentialEvolution::new(de_config, config_validation::build_gene_bounds(&config)?)?;

            let series = load_series(&CsvAdapter::new(settings.path.clone()), &settings)?;
            let evaluator = ParamEvaluator::new(&series, sim)?;
            let report = de.run(&evaluator)?;
            finish_param_search(&report, &series, &sim)
        }
        Method::Gp => {
            let mut gp_config = config_validation::build_gp_config(&config)?;
            gp_config.seed = seed.unwrap_or(gp_config.seed);
            gp_config.parallel |= parallel;
            let windows = config_validation::build_indicator_windows(&config)?;
            let mode = gp_config.fitness_mode;
            let target = gp_config.target;
            let max_height = gp_config.max_height;
            let gp = GeneticProgramming::new(gp_config)?;

            let series = load_series(&CsvAdapter::new(settings.path.clone()), &settings)?;
            let annotated = compute_indicators(&series, &windows)?;
            let evaluator = ExprEvaluator::new(&annotated, sim, mode, target, max_height)?;
            let report = gp.run(&evaluator)?;
            print_report_header(&report);
            let perf = evaluator.performance(&report.best)?;
            print_performance(&perf, &[]);
            Ok(())
        }
    }
}

fn finish_param_search(
    report: &OptimizationReport<ParamCandidate>,
    series: &PriceSeries,
    sim: &SimulationConfig,
) -> Result<(), EvotraderError> {
    print_report_header(report);
    let (result, perf) = report.best.backtest(series, sim)?;
    print_performance(&perf, &result.equity_curve);
    Ok(())
}

fn print_report_header<C: std::fmt::Display>(report: &OptimizationReport<C>) {
    eprintln!("\n=== Optimization ===");
    eprintln!("Evaluations:      {}", report.evaluations);
    eprintln!("Generations:      {}", report.history.len());
    if let (Some(first), Some(last)) = (report.history.first(), report.history.last()) {
        eprintln!(
            "Best per gen:     {:.2} -> {:.2} (mean {:.2} -> {:.2})",
            first.max, last.max, first.mean, last.mean
        );
    }
    eprintln!("Best fitness:     {}", report.best_score);
    eprintln!("Best candidate:   {}", report.best);
}

fn print_performance(perf: &Performance, equity_curve: &[f64]) {
    eprintln!("\n=== Results ===");
    eprintln!("Net Profit:       {:.4}", perf.net_profit);
    eprintln!("Return:           {:.2}%", perf.return_pct);
    eprintln!("Total Trades:     {}", perf.total_trades);
    eprintln!("Average Profit:   {:.4}", perf.average_profit);
    eprintln!("Win Rate:         {:.1}%", perf.win_rate * 100.0);
    eprintln!(
        "Won/Lost/Even:    {}/{}/{}",
        perf.trades_won, perf.trades_lost, perf.trades_breakeven
    );
    eprintln!("Profit Factor:    {:.2}", perf.profit_factor);
    eprintln!("Largest Win:      {:.4}", perf.largest_win);
    eprintln!("Largest Loss:     {:.4}", perf.largest_loss);
    eprintln!("Avg Holding:      {:.1} bars", perf.avg_holding_bars);
    if !equity_curve.is_empty() {
        let (drawdown, duration) = max_drawdown(equity_curve);
        eprintln!(
            "Max Drawdown:     -{:.1}% over {} bars",
            drawdown * 100.0,
            duration
        );
    }
}

fn run_validate(config_path: &PathBuf) -> Result<(), EvotraderError> {
    let config = load_config(config_path)?;
    config_validation::validate_config(&config)?;

    let data = config_validation::build_data_settings(&config)?;
    let sim = config_validation::build_simulation_config(&config)?;
    let gp = config_validation::build_gp_config(&config)?;
    eprintln!("Config validated successfully");
    eprintln!("  data:       {} in {}", data.symbol, data.path.display());
    eprintln!(
        "  simulation: balance {}, fee {}",
        sim.starting_balance, sim.fee_rate
    );
    eprintln!(
        "  backtest:   {}",
        config_validation::build_backtest_strategy(&config)?
    );
    eprintln!("  gp:         mode {}, target {}", gp.fitness_mode, gp.target);
    Ok(())
}

fn run_info(config_path: &PathBuf, symbol: Option<&str>) -> Result<(), EvotraderError> {
    let config = load_config(config_path)?;
    let path = config
        .get_string("data", "path")
        .ok_or_else(|| EvotraderError::ConfigMissing {
            section: "data".to_string(),
            key: "path".to_string(),
        })?;
    let data_port = CsvAdapter::new(PathBuf::from(path.trim()));

    let Some(symbol) = symbol
        .map(str::to_string)
        .or_else(|| config.get_string("data", "symbol"))
    else {
        let symbols = data_port.list_symbols()?;
        if symbols.is_empty() {
            eprintln!("No symbols found");
        }
        for symbol in &symbols {
            println!("{}", symbol);
        }
        return Ok(());
    };

    match data_port.get_data_range(&symbol)? {
        None => eprintln!("{}: no data", symbol),
        Some((first, last, count)) => {
            println!("{}: {} bars, {} to {}", symbol, count, first, last);
            let windows = config_validation::build_indicator_windows(&config)?;
            let series = compute_indicators(&data_port.fetch_ohlcv(&symbol)?, &windows)?;
            let last_index = series.len().saturating_sub(1);
            for name in series.column_names() {
                match series.value(name, last_index) {
                    Some(v) => println!("  {:<10} {:.4}", name, v),
                    None => println!("  {:<10} warming up", name),
                }
            }
        }
    }
    Ok(())
}
