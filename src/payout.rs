use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Linear shortfall cover: pays `ppa_rate` per MWh below `strike`, capped at
/// the `strike - exit` band.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoutSchedule {
    /// Production (MWh) below which the cover starts paying.
    pub strike: f64,
    /// Production (MWh) at which the payout reaches its cap.
    pub exit: f64,
    /// Price per MWh of shortfall.
    pub ppa_rate: f64,
}

impl PayoutSchedule {
    pub fn new(strike: f64, exit: f64, ppa_rate: f64) -> Result<Self> {
        for (name, v) in [("strike", strike), ("exit", exit), ("ppa_rate", ppa_rate)] {
            if !v.is_finite() {
                return Err(RiskError::invalid(name, format!("must be finite, got {v}")));
            }
        }
        if strike < exit {
            return Err(RiskError::invalid(
                "strike",
                format!("strike {strike} must be >= exit {exit}"),
            ));
        }
        if ppa_rate < 0.0 {
            return Err(RiskError::invalid("ppa_rate", format!("must be >= 0, got {ppa_rate}")));
        }
        Ok(PayoutSchedule { strike, exit, ppa_rate })
    }

    /// Largest amount payable for one period.
    pub fn limit(&self) -> f64 {
        (self.strike - self.exit) * self.ppa_rate
    }

    /// Payout for one observed period, capped at `limit`.
    pub fn payout(&self, value: f64, limit: f64) -> f64 {
        limit.min((self.strike - value).max(0.0) * self.ppa_rate)
    }

    /// Per-period payouts plus the limit they were capped at. Callers that go
    /// on to simulate must reuse the returned limit.
    pub fn payouts(&self, values: &[f64]) -> (Vec<f64>, f64) {
        let limit = self.limit();
        (values.iter().map(|&v| self.payout(v, limit)).collect(), limit)
    }
}

/// Mean payout over simulated production values.
///
/// The shortfall is clipped to the `[0, strike - exit]` band before pricing,
/// and the priced amount is capped again at `limit`.
pub fn expected_loss(values: &[f64], schedule: &PayoutSchedule, limit: f64) -> Result<f64> {
    if values.is_empty() {
        return Err(RiskError::InsufficientData { what: "expected loss", needed: 1, got: 0 });
    }
    let band = schedule.strike - schedule.exit;
    let total: f64 = values
        .iter()
        .map(|&v| {
            let shortfall = (schedule.strike - v).max(0.0).min(band);
            (shortfall * schedule.ppa_rate).min(limit)
        })
        .sum();
    Ok(total / values.len() as f64)
}

/// Historical burn cost: mean payout over trailing windows of the series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BurnCosts {
    pub last_5: f64,
    pub last_10: f64,
    pub last_20: f64,
    pub all: f64,
}

impl BurnCosts {
    /// `payouts` in chronological order. A window longer than the series
    /// covers the whole series; an empty series costs nothing.
    pub fn from_payouts(payouts: &[f64]) -> Self {
        let tail_mean = |n: usize| {
            let tail = &payouts[payouts.len().saturating_sub(n)..];
            if tail.is_empty() { 0.0 } else { tail.iter().sum::<f64>() / tail.len() as f64 }
        };
        BurnCosts {
            last_5: tail_mean(5),
            last_10: tail_mean(10),
            last_20: tail_mean(20),
            all: tail_mean(payouts.len()),
        }
    }
}
