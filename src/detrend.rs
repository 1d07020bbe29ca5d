use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Result, RiskError};

/// Trend-removal strategy for the annual production series.
///
/// Every strategy returns `anchor + (value - trend)` where `anchor` is the
/// trend at the most recent year, so the last detrended point equals the
/// last observed point and earlier years are restated at today's level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum Detrender {
    /// Ordinary least-squares line through (year, value).
    Linear,
    /// Gaussian-kernel (Nadaraya-Watson) smoothing with bandwidth in years.
    Kernel { bandwidth: f64 },
}

/// Output of a detrending pass, parallel to the input series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detrended {
    /// Fitted line or kernel-smoothed series.
    pub trend: Vec<f64>,
    pub detrended: Vec<f64>,
}

impl Detrender {
    pub fn kernel(bandwidth: f64) -> Result<Self> {
        let d = Detrender::Kernel { bandwidth };
        d.validate()?;
        Ok(d)
    }

    pub fn validate(&self) -> Result<()> {
        match *self {
            Detrender::Linear => Ok(()),
            Detrender::Kernel { bandwidth } if bandwidth.is_finite() && bandwidth > 0.0 => Ok(()),
            Detrender::Kernel { bandwidth } => Err(RiskError::invalid(
                "bandwidth",
                format!("must be finite and > 0, got {bandwidth}"),
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Detrender::Linear => "linear",
            Detrender::Kernel { .. } => "kernel",
        }
    }

    /// Empty input yields empty output. The kernel bandwidth is used as
    /// given; construct through [`Detrender::kernel`] to have it checked.
    pub fn detrend(&self, years: &[f64], values: &[f64]) -> Result<Detrended> {
        if years.len() != values.len() {
            return Err(RiskError::LengthMismatch { years: years.len(), values: values.len() });
        }
        if years.is_empty() {
            return Ok(Detrended { trend: Vec::new(), detrended: Vec::new() });
        }

        let trend = match *self {
            Detrender::Linear => {
                let (slope, intercept) = least_squares(years, values);
                years.iter().map(|&x| slope * x + intercept).collect::<Vec<f64>>()
            }
            Detrender::Kernel { bandwidth } => {
                let weights = kernel_weights(years, bandwidth);
                weights
                    .par_iter()
                    .map(|row| row.iter().zip(values).map(|(w, v)| w * v).sum::<f64>())
                    .collect()
            }
        };

        let anchor = trend[trend.len() - 1];
        let detrended = values.iter().zip(&trend).map(|(v, t)| anchor + (v - t)).collect();
        Ok(Detrended { trend, detrended })
    }
}

/// OLS slope and intercept. Zero spread in `x` gives a flat line at the mean.
fn least_squares(x: &[f64], y: &[f64]) -> (f64, f64) {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (sxy, sxx) = x.iter().zip(y).fold((0.0, 0.0), |(sxy, sxx), (&xi, &yi)| {
        let dx = xi - mean_x;
        (sxy + dx * (yi - mean_y), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return (0.0, mean_y);
    }
    let slope = sxy / sxx;
    (slope, mean_y - slope * mean_x)
}

/// Row-normalised Gaussian weights `exp(-(x_i - x_j)² / (2 bw²))`.
///
/// Rows are built in parallel; the result is identical for any thread count.
pub fn kernel_weights(x: &[f64], bandwidth: f64) -> Vec<Vec<f64>> {
    let denom = 2.0 * bandwidth * bandwidth;
    x.par_iter()
        .map(|&xi| {
            let mut row: Vec<f64> = x.iter().map(|&xj| (-(xi - xj).powi(2) / denom).exp()).collect();
            // The diagonal contributes exp(0) = 1, so the row sum is >= 1.
            let total: f64 = row.iter().sum();
            row.iter_mut().for_each(|w| *w /= total);
            row
        })
        .collect()
}
