//! Moving-average crossover strategy confirmed by RSI.
//!
//! A buy is signalled on the bar where `sma_short > sma_long && rsi < rsi_buy`
//! becomes true, and a sell where `sma_short < sma_long && rsi > rsi_sell`
//! becomes true. A side whose condition switches on at the same bar as the
//! other side's is suppressed.

use std::fmt;

use crate::domain::error::EvotraderError;
use crate::domain::indicator::{self, IndicatorWindows};
use crate::domain::metrics::Performance;
use crate::domain::price_series::{PriceSeries, RSI, sma_column};
use crate::domain::simulator::{self, SimulationConfig, SimulationResult};
use crate::domain::trigger::{Condition, EdgeTrigger, ThresholdTrigger};

#[derive(Debug, Clone, PartialEq)]
pub struct CrossoverRule {
    pub short_window: usize,
    pub long_window: usize,
    pub rsi_window: usize,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
}

impl Default for CrossoverRule {
    fn default() -> Self {
        Self {
            short_window: 9,
            long_window: 21,
            rsi_window: 14,
            rsi_buy: 30.0,
            rsi_sell: 70.0,
        }
    }
}

impl CrossoverRule {
    pub fn new(
        short_window: usize,
        long_window: usize,
        rsi_window: usize,
        rsi_buy: f64,
        rsi_sell: f64,
    ) -> Result<Self, EvotraderError> {
        let rule = Self {
            short_window,
            long_window,
            rsi_window,
            rsi_buy,
            rsi_sell,
        };
        rule.validate()?;
        Ok(rule)
    }

    pub fn validate(&self) -> Result<(), EvotraderError> {
        if self.short_window == 0 || self.rsi_window == 0 {
            return Err(EvotraderError::invalid(
                "backtest",
                "window",
                "indicator windows must be positive",
            ));
        }
        if self.short_window >= self.long_window {
            return Err(EvotraderError::invalid(
                "backtest",
                "short_window",
                format!(
                    "short window {} must be below long window {}",
                    self.short_window, self.long_window
                ),
            ));
        }
        for (key, level) in [("rsi_buy", self.rsi_buy), ("rsi_sell", self.rsi_sell)] {
            if !(0.0..=100.0).contains(&level) {
                return Err(EvotraderError::invalid(
                    "backtest",
                    key,
                    format!("{} is outside 0..=100", level),
                ));
            }
        }
        Ok(())
    }

    pub fn indicator_windows(&self) -> IndicatorWindows {
        IndicatorWindows {
            rsi: self.rsi_window,
            sma: vec![self.short_window, self.long_window],
            ..IndicatorWindows::default()
        }
    }

    pub fn buy_conditions(&self) -> Vec<Condition> {
        vec![
            Condition::above_column(
                &sma_column(self.short_window),
                &sma_column(self.long_window),
            ),
            Condition::below(RSI, self.rsi_buy),
        ]
    }

    pub fn sell_conditions(&self) -> Vec<Condition> {
        vec![
            Condition::below_column(
                &sma_column(self.short_window),
                &sma_column(self.long_window),
            ),
            Condition::above(RSI, self.rsi_sell),
        ]
    }

    /// Computes the averages and RSI on `series` and replays the rule.
    pub fn backtest(
        &self,
        series: &PriceSeries,
        config: &SimulationConfig,
    ) -> Result<(SimulationResult, Performance), EvotraderError> {
        self.validate()?;
        let annotated = indicator::compute_indicators(series, &self.indicator_windows())?;
        let buy_level = ThresholdTrigger::new(&annotated, self.buy_conditions());
        let sell_level = ThresholdTrigger::new(&annotated, self.sell_conditions());
        let buy = EdgeTrigger::new(buy_level.clone(), sell_level.clone());
        let sell = EdgeTrigger::new(sell_level, buy_level);
        let result = simulator::simulate(&annotated, &buy, &sell, config)?;
        let perf = Performance::from_simulation(&result, config.starting_balance);
        Ok((result, perf))
    }
}

impl fmt::Display for CrossoverRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SMA({}/{}) crossover, RSI({}) buy<{} sell>{}",
            self.short_window, self.long_window, self.rsi_window, self.rsi_buy, self.rsi_sell
        )
    }
}
