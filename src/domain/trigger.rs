//! Buy/sell trigger capability consumed by the simulator.
//!
//! A trigger is a pure predicate over a bar index. Triggers that read indicator
//! columns report "not fired" wherever a column is still warming up, and expose
//! the first index at which they can fire through [`Trigger::warmup`].

use crate::domain::price_series::PriceSeries;

pub trait Trigger {
    fn fires(&self, t: usize) -> bool;

    /// Number of leading bars on which this trigger is inert.
    fn warmup(&self) -> usize {
        0
    }
}

impl<F> Trigger for F
where
    F: Fn(usize) -> bool,
{
    fn fires(&self, t: usize) -> bool {
        self(t)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Above,
    Below,
}

/// Right-hand side of a [`Condition`].
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(f64),
    Column(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub comparison: Comparison,
    pub rhs: Operand,
}

impl Condition {
    pub fn above(column: &str, threshold: f64) -> Self {
        Self {
            column: column.to_string(),
            comparison: Comparison::Above,
            rhs: Operand::Value(threshold),
        }
    }

    pub fn below(column: &str, threshold: f64) -> Self {
        Self {
            column: column.to_string(),
            comparison: Comparison::Below,
            rhs: Operand::Value(threshold),
        }
    }

    /// `column > other` on the same bar.
    pub fn above_column(column: &str, other: &str) -> Self {
        Self {
            column: column.to_string(),
            comparison: Comparison::Above,
            rhs: Operand::Column(other.to_string()),
        }
    }

    /// `column < other` on the same bar.
    pub fn below_column(column: &str, other: &str) -> Self {
        Self {
            column: column.to_string(),
            comparison: Comparison::Below,
            rhs: Operand::Column(other.to_string()),
        }
    }

    /// False when either side is undefined at `t`.
    fn holds(&self, series: &PriceSeries, t: usize) -> bool {
        let Some(value) = series.value(&self.column, t) else {
            return false;
        };
        let rhs = match &self.rhs {
            Operand::Value(v) => *v,
            Operand::Column(name) => match series.value(name, t) {
                Some(v) => v,
                None => return false,
            },
        };
        match self.comparison {
            Comparison::Above => value > rhs,
            Comparison::Below => value < rhs,
        }
    }

    fn columns(&self) -> impl Iterator<Item = &str> {
        let rhs = match &self.rhs {
            Operand::Column(name) => Some(name.as_str()),
            Operand::Value(_) => None,
        };
        std::iter::once(self.column.as_str()).chain(rhs)
    }
}

/// Conjunction of column comparisons bound to one series.
#[derive(Debug, Clone)]
pub struct ThresholdTrigger<'a> {
    series: &'a PriceSeries,
    conditions: Vec<Condition>,
}

impl<'a> ThresholdTrigger<'a> {
    pub fn new(series: &'a PriceSeries, conditions: Vec<Condition>) -> Self {
        Self { series, conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }
}

impl Trigger for ThresholdTrigger<'_> {
    fn fires(&self, t: usize) -> bool {
        !self.conditions.is_empty() && self.conditions.iter().all(|c| c.holds(self.series, t))
    }

    fn warmup(&self) -> usize {
        self.conditions
            .iter()
            .flat_map(Condition::columns)
            .map(|name| self.series.first_defined(name).unwrap_or(self.series.len()))
            .max()
            .unwrap_or(0)
    }
}

/// Fires on the bar where `signal` switches on, unless `opposite` switches on
/// at the same bar.
#[derive(Debug, Clone)]
pub struct EdgeTrigger<S, O> {
    signal: S,
    opposite: O,
}

impl<S: Trigger, O: Trigger> EdgeTrigger<S, O> {
    pub fn new(signal: S, opposite: O) -> Self {
        Self { signal, opposite }
    }
}

/// True at `t` when the trigger fires there but not at `t - 1`.
fn rises(trigger: &impl Trigger, t: usize) -> bool {
    trigger.fires(t) && (t == 0 || !trigger.fires(t - 1))
}

impl<S: Trigger, O: Trigger> Trigger for EdgeTrigger<S, O> {
    fn fires(&self, t: usize) -> bool {
        rises(&self.signal, t) && !rises(&self.opposite, t)
    }

    fn warmup(&self) -> usize {
        self.signal.warmup()
    }
}

/// Trigger that fires exactly on the given indices.
#[derive(Debug, Clone, Default)]
pub struct FixedSchedule {
    indices: Vec<usize>,
}

impl FixedSchedule {
    pub fn new(mut indices: Vec<usize>) -> Self {
        indices.sort_unstable();
        indices.dedup();
        Self { indices }
    }

    pub fn never() -> Self {
        Self::default()
    }
}

impl Trigger for FixedSchedule {
    fn fires(&self, t: usize) -> bool {
        self.indices.binary_search(&t).is_ok()
    }
}
