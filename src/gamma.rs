use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Gamma};
use tracing::{debug, warn};

use crate::blow::BlowTransform;
use crate::error::{Result, RiskError};

/// Method-of-moments gamma fit of a production series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GammaFit {
    pub mean: f64,
    /// Sample standard deviation (n - 1 divisor).
    pub std: f64,
    /// k = (mean / std)².
    pub shape: f64,
    /// θ = std² / mean.
    pub scale: f64,
    /// Moments were unusable (mean or std not positive); shape and scale hold
    /// the unit sentinel.
    pub degenerate: bool,
}

impl GammaFit {
    pub const SENTINEL_SHAPE: f64 = 1.0;
    pub const SENTINEL_SCALE: f64 = 1.0;

    pub fn estimate(values: &[f64]) -> Result<Self> {
        let n = values.len();
        if n < 2 {
            return Err(RiskError::InsufficientData { what: "gamma fit", needed: 2, got: n });
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        let std = var.sqrt();

        if !(mean.is_finite() && std.is_finite() && mean > 0.0 && std > 0.0) {
            warn!(mean, std, "degenerate moments, falling back to unit gamma");
            return Ok(GammaFit {
                mean,
                std,
                shape: Self::SENTINEL_SHAPE,
                scale: Self::SENTINEL_SCALE,
                degenerate: true,
            });
        }

        let fit = GammaFit {
            mean,
            std,
            shape: (mean / std).powi(2),
            scale: std * std / mean,
            degenerate: false,
        };
        debug!(shape = fit.shape, scale = fit.scale, "gamma fitted");
        Ok(fit)
    }

    /// statrs parameterises by rate, the reciprocal of scale.
    pub fn distribution(&self) -> Result<Gamma> {
        Ok(Gamma::new(self.shape, 1.0 / self.scale)?)
    }

    /// Inverse CDF. `p` must lie in `[0, 1]`; 0 maps to 0 and 1 to +inf.
    pub fn quantile(&self, p: f64) -> Result<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(RiskError::invalid("p", format!("{p} is outside [0, 1]")));
        }
        Ok(self.distribution()?.inverse_cdf(p))
    }
}

/// Nearest-rank percentiles, spreadsheet style: `rank = ceil(p * n)` clamped
/// to `[1, n]`, no interpolation.
pub fn excel_percentile(values: &[f64], percentiles: &[f64]) -> Result<Vec<f64>> {
    if values.is_empty() {
        return Err(RiskError::InsufficientData { what: "percentile", needed: 1, got: 0 });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let n = sorted.len();

    Ok(percentiles
        .iter()
        .map(|&p| {
            let rank = ((p * n as f64).ceil().max(1.0) as usize).min(n);
            sorted[rank - 1]
        })
        .collect())
}

/// The 1 %..99 % grid the distribution comparison is drawn on.
pub fn percentile_grid() -> Vec<f64> {
    (1..100).map(|i| f64::from(i) / 100.0).collect()
}

/// Empirical, fitted and blown-fitted quantile curves on a common grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionCurves {
    pub percentiles: Vec<f64>,
    pub empirical: Vec<f64>,
    pub gamma: Vec<f64>,
    pub blown: Vec<f64>,
}

impl DistributionCurves {
    pub fn build(values: &[f64], fit: &GammaFit, blow: &BlowTransform) -> Result<Self> {
        let percentiles = percentile_grid();
        let empirical = excel_percentile(values, &percentiles)?;
        let dist = fit.distribution()?;
        let gamma: Vec<f64> = percentiles.iter().map(|&p| dist.inverse_cdf(p)).collect();
        let blown = blow.apply_all(&gamma);
        Ok(DistributionCurves { percentiles, empirical, gamma, blown })
    }
}
