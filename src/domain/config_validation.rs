//! Configuration validation.
//!
//! Turns `[section] key` values from a [`ConfigPort`] into the typed configs of
//! the simulator and the optimizers. Missing keys take the documented defaults;
//! present but malformed keys fail fast with `ConfigInvalid`.
//!
//! | section         | keys                                                                 |
//! |-----------------|----------------------------------------------------------------------|
//! | `[data]`        | `path`, `symbol` (required), `min_bars`                              |
//! | `[simulation]`  | `starting_balance`, `fee_rate`                                       |
//! | `[indicators]`  | `macd_fast`, `macd_slow`, `macd_signal`, `rsi`, `sma`, `ema` (lists)  |
//! | `[backtest]`    | `strategy` (`params` or `crossover`) and its settings                |
//! | `[ga]`          | GA settings plus the gene bounds shared with DE                      |
//! | `[de]`          | DE settings                                                          |
//! | `[gp]`          | GP settings, `fitness_mode`, `net_weight`, `average_weight`, `target` |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::crossover::CrossoverRule;
use crate::domain::error::EvotraderError;
use crate::domain::expr::{DepthRange, GpTarget};
use crate::domain::fitness::FitnessMode;
use crate::domain::indicator::IndicatorWindows;
use crate::domain::metrics::Performance;
use crate::domain::optimizer::de::DeConfig;
use crate::domain::optimizer::ga::GaConfig;
use crate::domain::optimizer::gp::GpConfig;
use crate::domain::params::{GeneBounds, ParamCandidate};
use crate::domain::price_series::PriceSeries;
use crate::domain::simulator::{SimulationConfig, SimulationResult};
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_MIN_BARS: usize = 50;

/// Where the bars of the traded symbol come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSettings {
    pub path: PathBuf,
    pub symbol: String,
    /// Runs on shorter series fail with `InsufficientData`.
    pub min_bars: usize,
}

/// Builds every section, so a bad key anywhere is reported before any work starts.
pub fn validate_config(config: &dyn ConfigPort) -> Result<(), EvotraderError> {
    build_data_settings(config)?;
    build_simulation_config(config)?;
    build_indicator_windows(config)?;
    build_backtest_strategy(config)?;
    build_gene_bounds(config)?;
    build_ga_config(config)?;
    build_de_config(config)?;
    build_gp_config(config)?;
    Ok(())
}

pub fn build_data_settings(config: &dyn ConfigPort) -> Result<DataSettings, EvotraderError> {
    let path = required(config, "data", "path")?;
    let symbol = required(config, "data", "symbol")?;
    let min_bars = read_usize(config, "data", "min_bars", DEFAULT_MIN_BARS)?;
    Ok(DataSettings {
        path: PathBuf::from(path),
        symbol,
        min_bars,
    })
}

pub fn build_simulation_config(
    config: &dyn ConfigPort,
) -> Result<SimulationConfig, EvotraderError> {
    let defaults = SimulationConfig::default();
    let sim = SimulationConfig {
        starting_balance: read_f64(
            config,
            "simulation",
            "starting_balance",
            defaults.starting_balance,
        )?,
        fee_rate: read_f64(config, "simulation", "fee_rate", defaults.fee_rate)?,
    };
    sim.validate()?;
    Ok(sim)
}

pub fn build_indicator_windows(
    config: &dyn ConfigPort,
) -> Result<IndicatorWindows, EvotraderError> {
    let defaults = IndicatorWindows::default();
    let sma = match config.get_string("indicators", "sma") {
        Some(list) => parse_list(&list, "indicators", "sma")?,
        None => defaults.sma.clone(),
    };
    let ema = match config.get_string("indicators", "ema") {
        Some(list) => parse_list(&list, "indicators", "ema")?,
        None => defaults.ema.clone(),
    };
    let windows = IndicatorWindows {
        macd_fast: read_usize(config, "indicators", "macd_fast", defaults.macd_fast)?,
        macd_slow: read_usize(config, "indicators", "macd_slow", defaults.macd_slow)?,
        macd_signal: read_usize(config, "indicators", "macd_signal", defaults.macd_signal)?,
        rsi: read_usize(config, "indicators", "rsi", defaults.rsi)?,
        sma,
        ema,
    };
    windows.validate()?;
    Ok(windows)
}

/// The fixed candidate replayed by the `backtest` command.
pub fn build_backtest_candidate(
    config: &dyn ConfigPort,
) -> Result<ParamCandidate, EvotraderError> {
    ParamCandidate::new(
        read_usize(config, "backtest", "macd_fast", 12)?,
        read_usize(config, "backtest", "macd_slow", 26)?,
        read_usize(config, "backtest", "rsi_window", 14)?,
        read_f64(config, "backtest", "macd_threshold", 0.0)?,
        read_f64(config, "backtest", "rsi_buy", 30.0)?,
        read_f64(config, "backtest", "rsi_sell", 70.0)?,
    )
}

/// Fixed strategy replayed by the `backtest` command.
#[derive(Debug, Clone, PartialEq)]
pub enum BacktestStrategy {
    /// MACD/RSI thresholds, the encoding searched by GA and DE.
    Params(ParamCandidate),
    /// SMA crossover confirmed by RSI, firing on condition edges.
    Crossover(CrossoverRule),
}

impl BacktestStrategy {
    pub fn backtest(
        &self,
        series: &PriceSeries,
        config: &SimulationConfig,
    ) -> Result<(SimulationResult, Performance), EvotraderError> {
        match self {
            BacktestStrategy::Params(candidate) => candidate.backtest(series, config),
            BacktestStrategy::Crossover(rule) => rule.backtest(series, config),
        }
    }
}

impl fmt::Display for BacktestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BacktestStrategy::Params(candidate) => write!(f, "{}", candidate),
            BacktestStrategy::Crossover(rule) => write!(f, "{}", rule),
        }
    }
}

/// `[backtest] strategy`: `params` (default) reads the six genes, `crossover`
/// reads `short_window`, `long_window`, `rsi_window`, `rsi_buy` and `rsi_sell`.
pub fn build_backtest_strategy(
    config: &dyn ConfigPort,
) -> Result<BacktestStrategy, EvotraderError> {
    let strategy = config
        .get_string("backtest", "strategy")
        .map(|s| s.trim().to_lowercase());
    match strategy.as_deref() {
        None | Some("params") => Ok(BacktestStrategy::Params(build_backtest_candidate(config)?)),
        Some("crossover") => {
            let d = CrossoverRule::default();
            Ok(BacktestStrategy::Crossover(CrossoverRule::new(
                read_usize(config, "backtest", "short_window", d.short_window)?,
                read_usize(config, "backtest", "long_window", d.long_window)?,
                read_usize(config, "backtest", "rsi_window", d.rsi_window)?,
                read_f64(config, "backtest", "rsi_buy", d.rsi_buy)?,
                read_f64(config, "backtest", "rsi_sell", d.rsi_sell)?,
            )?))
        }
        Some(other) => Err(EvotraderError::invalid(
            "backtest",
            "strategy",
            format!("unknown strategy '{}', expected params or crossover", other),
        )),
    }
}

pub fn build_gene_bounds(config: &dyn ConfigPort) -> Result<GeneBounds, EvotraderError> {
    let d = GeneBounds::default();
    let limit = read_i64(config, "ga", "macd_threshold_limit", d.macd_threshold_limit.into())?;
    let bounds = GeneBounds {
        macd_fast_min: read_usize(config, "ga", "macd_fast_min", d.macd_fast_min)?,
        macd_fast_max: read_usize(config, "ga", "macd_fast_max", d.macd_fast_max)?,
        macd_slow_max: read_usize(config, "ga", "macd_slow_max", d.macd_slow_max)?,
        rsi_window_min: read_usize(config, "ga", "rsi_window_min", d.rsi_window_min)?,
        rsi_window_max: read_usize(config, "ga", "rsi_window_max", d.rsi_window_max)?,
        macd_threshold_limit: i32::try_from(limit).map_err(|_| {
            EvotraderError::invalid("ga", "macd_threshold_limit", format!("{} is too large", limit))
        })?,
        rsi_buy_min: read_u32(config, "ga", "rsi_buy_min", d.rsi_buy_min)?,
        rsi_buy_max: read_u32(config, "ga", "rsi_buy_max", d.rsi_buy_max)?,
        rsi_sell_min: read_u32(config, "ga", "rsi_sell_min", d.rsi_sell_min)?,
        rsi_sell_max: read_u32(config, "ga", "rsi_sell_max", d.rsi_sell_max)?,
    };
    bounds.validate()?;
    Ok(bounds)
}

pub fn build_ga_config(config: &dyn ConfigPort) -> Result<GaConfig, EvotraderError> {
    let d = GaConfig::default();
    let ga = GaConfig {
        population_size: read_usize(config, "ga", "population_size", d.population_size)?,
        survivors: read_usize(config, "ga", "survivors", d.survivors)?,
        offspring: read_usize(config, "ga", "offspring", d.offspring)?,
        generations: read_usize(config, "ga", "generations", d.generations)?,
        external_mutation_rate: read_f64(
            config,
            "ga",
            "external_mutation_rate",
            d.external_mutation_rate,
        )?,
        internal_mutation_rate: read_f64(
            config,
            "ga",
            "internal_mutation_rate",
            d.internal_mutation_rate,
        )?,
        seed: read_u64(config, "ga", "seed", d.seed)?,
        parallel: read_bool(config, "ga", "parallel", d.parallel)?,
        max_evaluations: read_optional_usize(config, "ga", "max_evaluations")?,
    };
    ga.validate()?;
    Ok(ga)
}

pub fn build_de_config(config: &dyn ConfigPort) -> Result<DeConfig, EvotraderError> {
    let d = DeConfig::default();
    let de = DeConfig {
        population_size: read_usize(config, "de", "population_size", d.population_size)?,
        max_evaluations: read_usize(config, "de", "max_evaluations", d.max_evaluations)?,
        differential_weight: read_f64(
            config,
            "de",
            "differential_weight",
            d.differential_weight,
        )?,
        crossover_rate: read_f64(config, "de", "crossover_rate", d.crossover_rate)?,
        initial_sigma: read_f64(config, "de", "initial_sigma", d.initial_sigma)?,
        final_sigma: read_f64(config, "de", "final_sigma", d.final_sigma)?,
        seed: read_u64(config, "de", "seed", d.seed)?,
        parallel: read_bool(config, "de", "parallel", d.parallel)?,
    };
    de.validate()?;
    Ok(de)
}

pub fn build_gp_config(config: &dyn ConfigPort) -> Result<GpConfig, EvotraderError> {
    let d = GpConfig::default();
    let gp = GpConfig {
        population_size: read_usize(config, "gp", "population_size", d.population_size)?,
        generations: read_usize(config, "gp", "generations", d.generations)?,
        crossover_rate: read_f64(config, "gp", "crossover_rate", d.crossover_rate)?,
        mutation_rate: read_f64(config, "gp", "mutation_rate", d.mutation_rate)?,
        tournament_size: read_usize(config, "gp", "tournament_size", d.tournament_size)?,
        elite_fraction: read_f64(config, "gp", "elite_fraction", d.elite_fraction)?,
        max_height: read_usize(config, "gp", "max_height", d.max_height)?,
        init_depth: DepthRange::new(
            read_usize(config, "gp", "init_depth_min", d.init_depth.min)?,
            read_usize(config, "gp", "init_depth_max", d.init_depth.max)?,
        ),
        fitness_mode: build_fitness_mode(config)?,
        target: build_gp_target(config)?,
        seed: read_u64(config, "gp", "seed", d.seed)?,
        parallel: read_bool(config, "gp", "parallel", d.parallel)?,
        max_evaluations: read_optional_usize(config, "gp", "max_evaluations")?,
    };
    gp.validate()?;
    Ok(gp)
}

fn build_fitness_mode(config: &dyn ConfigPort) -> Result<FitnessMode, EvotraderError> {
    let mode = config
        .get_string("gp", "fitness_mode")
        .map(|s| s.trim().to_lowercase());
    match mode.as_deref() {
        None | Some("canonical") => Ok(FitnessMode::Canonical),
        Some("weighted") => Ok(FitnessMode::Weighted {
            net_weight: read_f64(config, "gp", "net_weight", 1.0)?,
            average_weight: read_f64(config, "gp", "average_weight", 1.0)?,
        }),
        Some("pareto") => Ok(FitnessMode::Pareto),
        Some(other) => Err(EvotraderError::invalid(
            "gp",
            "fitness_mode",
            format!("unknown mode '{}', expected canonical, weighted or pareto", other),
        )),
    }
}

fn build_gp_target(config: &dyn ConfigPort) -> Result<GpTarget, EvotraderError> {
    let target = config
        .get_string("gp", "target")
        .map(|s| s.trim().to_lowercase());
    match target.as_deref() {
        None | Some("both") => Ok(GpTarget::Both),
        Some("buy") => Ok(GpTarget::BuyOnly),
        Some("sell") => Ok(GpTarget::SellOnly),
        Some(other) => Err(EvotraderError::invalid(
            "gp",
            "target",
            format!("unknown target '{}', expected both, buy or sell", other),
        )),
    }
}

fn required(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, EvotraderError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        _ => Err(EvotraderError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

/// Rejects a present value that does not parse as `T`.
fn ensure_parses<T: FromStr>(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    expected: &str,
) -> Result<(), EvotraderError> {
    match config.get_string(section, key) {
        Some(raw) if raw.trim().parse::<T>().is_err() => Err(EvotraderError::invalid(
            section,
            key,
            format!("'{}' is not {}", raw.trim(), expected),
        )),
        _ => Ok(()),
    }
}

fn read_f64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: f64,
) -> Result<f64, EvotraderError> {
    ensure_parses::<f64>(config, section, key, "a number")?;
    let value = config.get_double(section, key, default);
    if !value.is_finite() {
        return Err(EvotraderError::invalid(section, key, "must be finite"));
    }
    Ok(value)
}

fn read_i64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: i64,
) -> Result<i64, EvotraderError> {
    ensure_parses::<i64>(config, section, key, "an integer")?;
    Ok(config.get_int(section, key, default))
}

fn read_u64(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u64,
) -> Result<u64, EvotraderError> {
    // seeds may use the full u64 range, beyond what get_int can return
    match config.get_string(section, key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            EvotraderError::invalid(
                section,
                key,
                format!("'{}' is not a non-negative integer", raw.trim()),
            )
        }),
        None => Ok(default),
    }
}

fn read_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, EvotraderError> {
    let fallback = i64::try_from(default).unwrap_or(i64::MAX);
    let value = read_i64(config, section, key, fallback)?;
    usize::try_from(value).map_err(|_| {
        EvotraderError::invalid(section, key, format!("must not be negative, got {}", value))
    })
}

fn read_u32(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: u32,
) -> Result<u32, EvotraderError> {
    let value = read_i64(config, section, key, default.into())?;
    u32::try_from(value).map_err(|_| {
        EvotraderError::invalid(section, key, format!("{} is out of range", value))
    })
}

fn read_optional_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<usize>, EvotraderError> {
    match config.get_string(section, key) {
        Some(raw) if !raw.trim().is_empty() => read_usize(config, section, key, 0).map(Some),
        _ => Ok(None),
    }
}

fn read_bool(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: bool,
) -> Result<bool, EvotraderError> {
    if let Some(raw) = config.get_string(section, key) {
        let known = ["true", "yes", "1", "false", "no", "0"];
        if !known.contains(&raw.trim().to_lowercase().as_str()) {
            return Err(EvotraderError::invalid(
                section,
                key,
                format!("'{}' is not a boolean", raw.trim()),
            ));
        }
    }
    Ok(config.get_bool(section, key, default))
}

fn parse_list(raw: &str, section: &str, key: &str) -> Result<Vec<usize>, EvotraderError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse().map_err(|_| {
                EvotraderError::invalid(section, key, format!("'{}' is not a window size", s))
            })
        })
        .collect()
}
