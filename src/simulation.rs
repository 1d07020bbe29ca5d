use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::ContinuousCDF;
use tracing::{debug, info};

use crate::blow::BlowTransform;
use crate::error::{Result, RiskError};
use crate::gamma::GammaFit;
use crate::payout::{PayoutSchedule, expected_loss};

/// An externally supplied low-discrepancy sample: non-empty, every element in
/// `[0, 1]`. The only way to build one is through validation.
#[derive(Debug, Clone, PartialEq)]
pub struct QuasiRandomSequence(Vec<f64>);

impl QuasiRandomSequence {
    /// Rejects the whole input if any element is outside `[0, 1]` (NaN
    /// included); nothing is clamped.
    pub fn new(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(RiskError::InsufficientData {
                what: "quasi-random sequence",
                needed: 1,
                got: 0,
            });
        }
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        let count = values.iter().filter(|&&v| !in_range(v)).count();
        if let Some((index, &value)) = values.iter().enumerate().find(|&(_, &v)| !in_range(v)) {
            return Err(RiskError::QuasiRandomOutOfRange { index, value, count });
        }
        Ok(QuasiRandomSequence(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Result of one simulation pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationOutcome {
    pub expected_loss: f64,
    /// Blown gamma draws, one per quasi-random input, in input order.
    pub simulated: Vec<f64>,
}

/// Validate -> inverse gamma CDF -> blow -> expected loss, in one pass.
///
/// `limit` is the cap produced by the annual payout table and is used as
/// given so historical and simulated payouts share one cap.
#[derive(Debug, Clone, Copy)]
pub struct SimulationDriver {
    pub fit: GammaFit,
    pub blow: BlowTransform,
    pub schedule: PayoutSchedule,
    pub limit: f64,
}

impl SimulationDriver {
    pub fn new(fit: GammaFit, blow: BlowTransform, schedule: PayoutSchedule, limit: f64) -> Self {
        SimulationDriver { fit, blow, schedule, limit }
    }

    pub fn run(&self, raw: &[f64]) -> Result<SimulationOutcome> {
        let sequence = QuasiRandomSequence::new(raw.to_vec())?;
        self.run_sequence(&sequence)
    }

    pub fn run_sequence(&self, sequence: &QuasiRandomSequence) -> Result<SimulationOutcome> {
        let dist = self.fit.distribution()?;
        debug!(n = sequence.len(), shape = self.fit.shape, scale = self.fit.scale, "mapping sequence");

        let draws: Vec<f64> = sequence.as_slice().par_iter().map(|&u| dist.inverse_cdf(u)).collect();
        let simulated = self.blow.apply_all(&draws);
        let expected_loss = expected_loss(&simulated, &self.schedule, self.limit)?;

        info!(expected_loss, samples = simulated.len(), "simulation complete");
        Ok(SimulationOutcome { expected_loss, simulated })
    }
}
