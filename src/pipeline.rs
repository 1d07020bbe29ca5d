use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{RescaleConfig, RiskConfig};
use crate::detrend::Detrended;
use crate::energy::{annual_energy, hourly_energy, monthly_energy};
use crate::error::{Result, RiskError};
use crate::gamma::{DistributionCurves, GammaFit};
use crate::payout::{BurnCosts, PayoutSchedule};
use crate::simulation::{QuasiRandomSequence, SimulationDriver};
use crate::types::{AnnualAggregate, IrradianceSample, MonthlyAggregate};

/// Fiscal-year total before and after normalisation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualRow {
    pub fiscal_year: i32,
    pub energy_mwh: f64,
    pub rescaled_mwh: f64,
}

/// One year of the analysis window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub fiscal_year: i32,
    pub energy_mwh: f64,
    pub rescaled_mwh: f64,
    pub trend: f64,
    pub detrended: f64,
    pub payout_untrended: f64,
    pub payout_detrended: f64,
}

/// Everything one pipeline run produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    pub detrender: &'static str,
    pub rescale_factor: f64,
    pub monthly: Vec<MonthlyAggregate>,
    pub annual: Vec<AnnualRow>,
    pub analysis: Vec<AnalysisRow>,
    pub limit: f64,
    pub gamma: GammaFit,
    pub burn_costs: BurnCosts,
    pub expected_loss: f64,
    pub simulated: Vec<f64>,
    pub curves: DistributionCurves,
}

/// Irradiance + quasi-random sequence -> expected loss, end to end.
///
/// Holds only configuration; every run borrows its inputs and returns a fresh
/// report. A failure at any stage fails the whole run.
#[derive(Debug, Clone)]
pub struct RiskPipeline {
    config: RiskConfig,
}

impl RiskPipeline {
    pub fn new(config: RiskConfig) -> Result<Self> {
        config.validate()?;
        Ok(RiskPipeline { config })
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn run(&self, samples: &[IrradianceSample], quasi_random: &[f64]) -> Result<RiskReport> {
        // Reject a bad sequence before spending time on the series.
        let sequence = QuasiRandomSequence::new(quasi_random.to_vec())?;
        let cfg = &self.config;

        // ── Energy ──
        let hourly = hourly_energy(&cfg.panel, samples);
        let monthly = monthly_energy(&hourly);
        let annual = annual_energy(&hourly)?;
        debug!(hours = hourly.len(), months = monthly.len(), years = annual.len(), "energy aggregated");

        // ── Rescale ──
        let factor = rescale_factor(&cfg.rescale, &annual)?;
        let annual: Vec<AnnualRow> = annual
            .iter()
            .map(|a| AnnualRow {
                fiscal_year: a.fiscal_year,
                energy_mwh: a.energy_mwh,
                rescaled_mwh: a.energy_mwh * factor,
            })
            .collect();

        // ── Analysis window ──
        let window: Vec<&AnnualRow> =
            annual.iter().filter(|r| cfg.window.contains(r.fiscal_year)).collect();
        if window.is_empty() {
            return Err(RiskError::InsufficientData {
                what: "analysis window",
                needed: 1,
                got: 0,
            });
        }
        let years: Vec<f64> = window.iter().map(|r| f64::from(r.fiscal_year)).collect();
        let rescaled: Vec<f64> = window.iter().map(|r| r.rescaled_mwh).collect();

        // ── Detrend and historical payouts ──
        let Detrended { trend, detrended } = cfg.detrender.detrend(&years, &rescaled)?;
        let schedule = PayoutSchedule::new(cfg.payout.strike, cfg.payout.exit, cfg.payout.ppa_rate)?;
        let (payout_untrended, limit) = schedule.payouts(&rescaled);
        let (payout_detrended, _) = schedule.payouts(&detrended);
        info!(limit, detrender = cfg.detrender.name(), years = years.len(), "historical payouts");

        let analysis: Vec<AnalysisRow> = window
            .iter()
            .enumerate()
            .map(|(i, r)| AnalysisRow {
                fiscal_year: r.fiscal_year,
                energy_mwh: r.energy_mwh,
                rescaled_mwh: r.rescaled_mwh,
                trend: trend[i],
                detrended: detrended[i],
                payout_untrended: payout_untrended[i],
                payout_detrended: payout_detrended[i],
            })
            .collect();

        // ── Fit and simulate ──
        let gamma = GammaFit::estimate(&detrended)?;
        info!(shape = gamma.shape, scale = gamma.scale, degenerate = gamma.degenerate, "gamma fit");
        let outcome = SimulationDriver::new(gamma, cfg.blow, schedule, limit).run_sequence(&sequence)?;

        let burn_costs = BurnCosts::from_payouts(&payout_detrended);
        let curves = DistributionCurves::build(&detrended, &gamma, &cfg.blow)?;

        Ok(RiskReport {
            detrender: cfg.detrender.name(),
            rescale_factor: factor,
            monthly,
            annual,
            analysis,
            limit,
            gamma,
            burn_costs,
            expected_loss: outcome.expected_loss,
            simulated: outcome.simulated,
            curves,
        })
    }
}

/// `target / mean(reference years)`. 1.0 without a target or when the
/// reference mean is not positive.
pub fn rescale_factor(rescale: &RescaleConfig, annual: &[AnnualAggregate]) -> Result<f64> {
    let Some(target) = rescale.target_p50 else {
        warn!("no rescale target configured, annual series left unscaled");
        return Ok(1.0);
    };

    let reference: Vec<f64> = annual
        .iter()
        .filter(|a| (rescale.reference_start..=rescale.reference_end).contains(&a.fiscal_year))
        .map(|a| a.energy_mwh)
        .collect();
    if reference.is_empty() {
        return Err(RiskError::InsufficientData { what: "rescale reference years", needed: 1, got: 0 });
    }

    let mean = reference.iter().sum::<f64>() / reference.len() as f64;
    if !(mean.is_finite() && mean > 0.0) {
        warn!(target, reference_mean = mean, "reference mean unusable, annual series left unscaled");
        return Ok(1.0);
    }
    let factor = target / mean;
    info!(target, reference_mean = mean, factor, "rescaled annual series");
    Ok(factor)
}
