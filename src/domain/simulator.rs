//! Trade-simulation engine.
//!
//! Replays a [`PriceSeries`] against a buy trigger and a sell trigger with a single
//! all-in/all-out position:
//!
//! - flat and buy fires: whole balance -> holdings at `close[t]`, minus fee
//! - long and sell fires: whole holdings -> balance at `close[t]`, minus fee
//! - still long after the last bar: force-closed at the last close
//!
//! Decisions and fills both use the same bar's close. This is a known
//! simplification (no next-bar-open execution) and is kept on purpose.
//!
//! No buy is opened on the final bar, since it could only be force-closed on that
//! same bar. Bars with a non-positive or non-finite close never open a position.

use crate::domain::error::EvotraderError;
use crate::domain::position::{Position, TradeLedger};
use crate::domain::price_series::PriceSeries;
use crate::domain::trigger::Trigger;

pub const DEFAULT_STARTING_BALANCE: f64 = 100.0;
pub const DEFAULT_FEE_RATE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationConfig {
    pub starting_balance: f64,
    pub fee_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_balance: DEFAULT_STARTING_BALANCE,
            fee_rate: DEFAULT_FEE_RATE,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), EvotraderError> {
        if !self.starting_balance.is_finite() || self.starting_balance <= 0.0 {
            return Err(EvotraderError::invalid(
                "simulation",
                "starting_balance",
                format!("must be positive, got {}", self.starting_balance),
            ));
        }
        if !self.fee_rate.is_finite() || !(0.0..1.0).contains(&self.fee_rate) {
            return Err(EvotraderError::invalid(
                "simulation",
                "fee_rate",
                format!("must be in [0, 1), got {}", self.fee_rate),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub ledger: TradeLedger,
    pub final_balance: f64,
    /// Mark-to-market value after each bar; the last point reflects the forced exit.
    pub equity_curve: Vec<f64>,
}

pub fn simulate<B, S>(
    series: &PriceSeries,
    buy: &B,
    sell: &S,
    config: &SimulationConfig,
) -> Result<SimulationResult, EvotraderError>
where
    B: Trigger + ?Sized,
    S: Trigger + ?Sized,
{
    config.validate()?;

    let mut position = Position::Flat {
        balance: config.starting_balance,
    };
    let mut ledger = TradeLedger::new();
    let mut equity_curve = Vec::with_capacity(series.len());

    let first_tradable = buy.warmup().max(sell.warmup());
    let last = series.len().saturating_sub(1);

    for (t, bar) in series.bars().iter().enumerate() {
        let price = bar.close;
        if t >= first_tradable {
            match position {
                Position::Flat { .. } => {
                    if t < last && price.is_finite() && price > 0.0 && buy.fires(t) {
                        position = position.buy(price, config.fee_rate);
                        ledger.open(t, bar.timestamp, price);
                    }
                }
                Position::Long { .. } => {
                    if sell.fires(t) {
                        position = position.sell(price, config.fee_rate);
                        ledger.close(t, bar.timestamp, price);
                    }
                }
            }
        }
        equity_curve.push(position.market_value(price));
    }

    if position.is_long() {
        if let Some(bar) = series.bar(last) {
            position = position.sell(bar.close, config.fee_rate);
            ledger.close(last, bar.timestamp, bar.close);
            if let Some(point) = equity_curve.last_mut() {
                *point = position.market_value(bar.close);
            }
        }
    }

    let final_balance = match position {
        Position::Flat { balance } => balance,
        Position::Long { .. } => 0.0,
    };

    Ok(SimulationResult {
        ledger,
        final_balance,
        equity_curve,
    })
}
