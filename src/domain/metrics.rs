//! Performance statistics of one simulation run.

use super::position::TradeLedger;
use super::simulator::SimulationResult;

#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    pub net_profit: f64,
    pub return_pct: f64,
    pub total_trades: usize,
    pub average_profit: f64,
    pub win_rate: f64,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub trades_breakeven: usize,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_bars: f64,
}

impl Performance {
    /// Scores a ledger. Only closed trades count; per-trade profit is the price
    /// difference `exit - entry`, while `net_profit` is measured on the balance.
    pub fn evaluate(ledger: &TradeLedger, final_balance: f64, starting_balance: f64) -> Self {
        let net_profit = final_balance - starting_balance;
        let return_pct = if starting_balance > 0.0 {
            net_profit / starting_balance * 100.0
        } else {
            0.0
        };

        let mut total_trades = 0usize;
        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut trades_breakeven = 0usize;
        let mut total_profit = 0.0_f64;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_holding = 0usize;

        for trade in ledger.closed_trades() {
            let (Some(profit), Some(bars)) = (trade.profit(), trade.holding_bars()) else {
                continue;
            };
            total_trades += 1;
            total_profit += profit;
            total_holding += bars;
            if profit > 0.0 {
                trades_won += 1;
                total_wins += profit;
                largest_win = largest_win.max(profit);
            } else if profit < 0.0 {
                trades_lost += 1;
                total_losses += profit.abs();
                largest_loss = largest_loss.max(profit.abs());
            } else {
                trades_breakeven += 1;
            }
        }

        let (average_profit, win_rate, avg_holding_bars) = if total_trades > 0 {
            let n = total_trades as f64;
            (total_profit / n, trades_won as f64 / n, total_holding as f64 / n)
        } else {
            (0.0, 0.0, 0.0)
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        Performance {
            net_profit,
            return_pct,
            total_trades,
            average_profit,
            win_rate,
            trades_won,
            trades_lost,
            trades_breakeven,
            profit_factor,
            largest_win,
            largest_loss,
            avg_holding_bars,
        }
    }

    pub fn from_simulation(result: &SimulationResult, starting_balance: f64) -> Self {
        Self::evaluate(&result.ledger, result.final_balance, starting_balance)
    }
}

/// Largest peak-to-trough decline as a fraction of the peak, and the longest
/// run of bars spent strictly below the running peak.
pub fn max_drawdown(equity_curve: &[f64]) -> (f64, usize) {
    let Some((&first, rest)) = equity_curve.split_first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_duration = 0usize;
    let mut current_duration = 0usize;

    for &equity in rest {
        if equity >= peak {
            peak = equity;
            current_duration = 0;
        } else if peak > 0.0 {
            max_dd = max_dd.max((peak - equity) / peak);
            current_duration += 1;
            max_duration = max_duration.max(current_duration);
        }
    }

    (max_dd, max_duration)
}
