//! Single-asset position state and the trade ledger.

use chrono::{DateTime, Utc};

/// All-in/all-out position: either cash or coin, never both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Position {
    Flat { balance: f64 },
    Long { holdings: f64 },
}

impl Position {
    pub fn is_long(&self) -> bool {
        matches!(self, Position::Long { .. })
    }

    /// Convert the whole balance into holdings at `price`, paying `fee_rate`.
    /// No-op when already long.
    pub fn buy(self, price: f64, fee_rate: f64) -> Self {
        match self {
            Position::Flat { balance } => Position::Long {
                holdings: balance * (1.0 - fee_rate) / price,
            },
            long => long,
        }
    }

    /// Convert all holdings back to balance at `price`, paying `fee_rate`.
    /// No-op when already flat.
    pub fn sell(self, price: f64, fee_rate: f64) -> Self {
        match self {
            Position::Long { holdings } => Position::Flat {
                balance: holdings * price * (1.0 - fee_rate),
            },
            flat => flat,
        }
    }

    pub fn market_value(&self, price: f64) -> f64 {
        match *self {
            Position::Flat { balance } => balance,
            Position::Long { holdings } => holdings * price,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeExit {
    pub index: usize,
    pub time: DateTime<Utc>,
    pub price: f64,
    pub profit: f64,
}

/// One entry/exit pair. `exit` is filled when the matching sell happens.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit: Option<TradeExit>,
}

impl Trade {
    pub fn is_closed(&self) -> bool {
        self.exit.is_some()
    }

    /// `exit_price - entry_price`, once closed.
    pub fn profit(&self) -> Option<f64> {
        self.exit.as_ref().map(|e| e.profit)
    }

    pub fn holding_bars(&self) -> Option<usize> {
        self.exit.as_ref().map(|e| e.index - self.entry_index)
    }
}

/// Append-only trade record of one simulation run; at most one open trade, always last.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeLedger {
    trades: Vec<Trade>,
}

impl TradeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn open_trade(&self) -> Option<&Trade> {
        self.trades.last().filter(|t| !t.is_closed())
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    /// Returns `false` (and records nothing) if a trade is already open.
    pub(crate) fn open(&mut self, index: usize, time: DateTime<Utc>, price: f64) -> bool {
        if self.open_trade().is_some() {
            return false;
        }
        self.trades.push(Trade {
            entry_index: index,
            entry_time: time,
            entry_price: price,
            exit: None,
        });
        true
    }

    /// Returns `false` if there is no open trade to close.
    pub(crate) fn close(&mut self, index: usize, time: DateTime<Utc>, price: f64) -> bool {
        match self.trades.last_mut() {
            Some(trade) if !trade.is_closed() => {
                trade.exit = Some(TradeExit {
                    index,
                    time,
                    price,
                    profit: price - trade.entry_price,
                });
                true
            }
            _ => false,
        }
    }
}
