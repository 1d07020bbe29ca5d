use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::blow::{BlowDirection, BlowTransform};
use crate::detrend::Detrender;
use crate::error::{Result, RiskError};
use crate::payout::PayoutSchedule;

/// Plant characteristics used to turn irradiance into energy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelConfig {
    /// Total cell area in m².
    pub area_cells: f64,
    /// Module efficiency, 0..=1.
    pub efficiency_ratio: f64,
    /// Performance factor (losses other than module efficiency), 0..=1.
    pub performance_factor: f64,
    /// Irradiance unit -> kWh per m². 1 / 3_600_000 for J/m².
    pub unit_conversion: f64,
}

impl Default for PanelConfig {
    fn default() -> Self {
        PanelConfig {
            area_cells: 348_642.0,
            efficiency_ratio: 16.50 / 100.0,
            performance_factor: 79.69 / 100.0,
            unit_conversion: 1.0 / 3_600_000.0,
        }
    }
}

/// Normalisation of the annual series to a client-specified expected value.
///
/// `target_p50 = None` leaves the series unscaled; scaling the series to its
/// own mean is a no-op and is never done implicitly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescaleConfig {
    /// Client P50 annual production in MWh.
    pub target_p50: Option<f64>,
    /// Fiscal years whose mean is mapped onto `target_p50` (inclusive).
    pub reference_start: i32,
    pub reference_end: i32,
}

impl Default for RescaleConfig {
    fn default() -> Self {
        RescaleConfig { target_p50: Some(112_684.0), reference_start: 1980, reference_end: 2023 }
    }
}

/// Fiscal years fed to the detrender (inclusive on both ends).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisWindow {
    pub start_year: i32,
    pub end_year: i32,
}

impl AnalysisWindow {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start_year && year <= self.end_year
    }
}

impl Default for AnalysisWindow {
    fn default() -> Self {
        AnalysisWindow { start_year: 2000, end_year: 2024 }
    }
}

/// Everything a pipeline run needs besides its two data inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    pub panel: PanelConfig,
    pub rescale: RescaleConfig,
    pub detrender: Detrender,
    pub window: AnalysisWindow,
    pub payout: PayoutSchedule,
    pub blow: BlowTransform,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self::canonical()
    }
}

impl RiskConfig {
    /// Reference plant and contract terms.
    pub fn canonical() -> Self {
        RiskConfig {
            panel: PanelConfig::default(),
            rescale: RescaleConfig::default(),
            detrender: Detrender::Linear,
            window: AnalysisWindow::default(),
            // Strike at client P75, exit at 100 GWh; PPA in INR/MWh.
            payout: PayoutSchedule { strike: 110_193.0, exit: 100_000.0, ppa_rate: 5_000.0 },
            blow: BlowTransform {
                pivot: 107_000.0,
                factor_percent: -30.0,
                direction: BlowDirection::Down,
                shift: 0.0,
            },
        }
    }

    /// Load a (possibly partial) JSON config; absent fields keep their
    /// canonical values.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: RiskConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let p = &self.panel;
        for (name, v) in [
            ("area_cells", p.area_cells),
            ("efficiency_ratio", p.efficiency_ratio),
            ("performance_factor", p.performance_factor),
            ("unit_conversion", p.unit_conversion),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(RiskError::invalid(name, format!("must be finite and >= 0, got {v}")));
            }
        }
        if p.efficiency_ratio > 1.0 {
            return Err(RiskError::invalid("efficiency_ratio", "must be <= 1"));
        }
        if p.performance_factor > 1.0 {
            return Err(RiskError::invalid("performance_factor", "must be <= 1"));
        }

        if let Some(target) = self.rescale.target_p50
            && (!target.is_finite() || target <= 0.0)
        {
            return Err(RiskError::invalid("target_p50", format!("must be > 0, got {target}")));
        }
        if self.rescale.reference_start > self.rescale.reference_end {
            return Err(RiskError::invalid("reference_start", "must not exceed reference_end"));
        }
        if self.window.start_year > self.window.end_year {
            return Err(RiskError::invalid("analysis_start_year", "must not exceed analysis_end_year"));
        }

        self.detrender.validate()?;
        PayoutSchedule::new(self.payout.strike, self.payout.exit, self.payout.ppa_rate)?;
        self.blow.validate()?;
        Ok(())
    }
}
