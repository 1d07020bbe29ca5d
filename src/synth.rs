//! Seeded synthetic hourly SSRD for demos and benchmarks.

use std::f64::consts::PI;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use rand::Rng;
use rand::seq::SliceRandom;
use rand_distr::{Beta, Distribution, Normal};

use crate::error::{Result, RiskError};
use crate::types::IrradianceSample;

/// Shape of the synthetic climate. Values are J/m² per hour.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthConfig {
    /// First fiscal year; the series starts Sep 1 of this year.
    pub first_year: i32,
    pub years: u32,
    /// Clear-sky solar-noon irradiance at the summer solstice.
    pub peak_jm2: f64,
    /// Relative seasonal swing around the annual mean, 0..1.
    pub seasonal_amplitude: f64,
    /// Beta parameters of the daily clear-sky fraction.
    pub cloud_alpha: f64,
    pub cloud_beta: f64,
    /// Relative change in the yearly level per year (e.g. -0.002 for dimming).
    pub annual_drift: f64,
    /// Std dev of the yearly level around its drift line.
    pub year_sigma: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            first_year: 1980,
            years: 45,
            peak_jm2: 3_200_000.0,
            seasonal_amplitude: 0.25,
            cloud_alpha: 5.0,
            cloud_beta: 2.0,
            annual_drift: -0.002,
            year_sigma: 0.03,
        }
    }
}

/// Hourly samples from Sep 1 `first_year` until Sep 1 `first_year + years`.
pub fn generate_hourly_ssrd(cfg: &SynthConfig, rng: &mut impl Rng) -> Result<Vec<IrradianceSample>> {
    let clouds = Beta::new(cfg.cloud_alpha, cfg.cloud_beta)
        .map_err(|e| RiskError::invalid("cloud_alpha", e.to_string()))?;
    let level = Normal::new(0.0, cfg.year_sigma)
        .map_err(|e| RiskError::invalid("year_sigma", e.to_string()))?;
    let start = sep_first(cfg.first_year)?;
    let end = sep_first(cfg.first_year + cfg.years as i32)?;

    let mut out = Vec::new();
    let mut fiscal_index = -1i32;
    let mut year_factor = 1.0;
    let mut day = start;
    while day < end {
        if day.month() == 9 && day.day() == 1 {
            fiscal_index += 1;
            year_factor = (1.0 + cfg.annual_drift * f64::from(fiscal_index) + level.sample(rng)).max(0.0);
        }
        let clear_fraction = 0.3 + 0.7 * clouds.sample(rng);
        let season = 1.0 + cfg.seasonal_amplitude * (2.0 * PI * (f64::from(day.ordinal()) - 172.0) / 365.25).cos();

        for h in 0..24 {
            let ts = day + Duration::hours(h);
            let v = cfg.peak_jm2 * daylight(ts) * season * clear_fraction * year_factor;
            out.push(IrradianceSample::new(ts, v.max(0.0)));
        }
        day += Duration::days(1);
    }
    Ok(out)
}

/// Shuffled stratified sample: one draw inside each of `n` equal strata of
/// `(0, 1)`.
pub fn stratified_sequence(n: usize, rng: &mut impl Rng) -> Vec<f64> {
    let mut v: Vec<f64> = (0..n).map(|i| (i as f64 + rng.random::<f64>()) / n as f64).collect();
    v.shuffle(rng);
    v
}

/// Half-sine between 06:00 and 18:00, zero at night.
fn daylight(ts: NaiveDateTime) -> f64 {
    let h = f64::from(ts.hour()) + 0.5;
    if (6.0..18.0).contains(&h) { (PI * (h - 6.0) / 12.0).sin() } else { 0.0 }
}

fn sep_first(year: i32) -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, 9, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .ok_or_else(|| RiskError::invalid("first_year", format!("{year} is outside the calendar")))
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::config::PanelConfig;
    use crate::energy::{annual_energy, hourly_energy};

    fn small() -> SynthConfig {
        SynthConfig { first_year: 2000, years: 3, ..SynthConfig::default() }
    }

    #[test]
    fn covers_whole_fiscal_years_hourly() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let s = generate_hourly_ssrd(&small(), &mut rng).unwrap();
        // Sep 2000 .. Sep 2003 holds no Feb 29.
        assert_eq!(s.len(), (365 * 3) * 24);
        assert_eq!(s[0].timestamp, sep_first(2000).unwrap());
        assert!(s.windows(2).all(|w| w[1].timestamp - w[0].timestamp == Duration::hours(1)));
    }

    #[test]
    fn nights_are_dark_and_values_non_negative() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let s = generate_hourly_ssrd(&small(), &mut rng).unwrap();
        assert!(s.iter().all(|x| x.irradiance >= 0.0));
        assert!(s.iter().filter(|x| x.timestamp.hour() < 6).all(|x| x.irradiance == 0.0));
        assert!(s.iter().any(|x| x.irradiance > 1_000_000.0));
    }

    #[test]
    fn same_seed_same_series() {
        let a = generate_hourly_ssrd(&small(), &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let b = generate_hourly_ssrd(&small(), &mut ChaCha20Rng::seed_from_u64(1)).unwrap();
        let c = generate_hourly_ssrd(&small(), &mut ChaCha20Rng::seed_from_u64(2)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn one_annual_row_per_fiscal_year() {
        let mut rng = ChaCha20Rng::seed_from_u64(11);
        let s = generate_hourly_ssrd(&small(), &mut rng).unwrap();
        let annual = annual_energy(&hourly_energy(&PanelConfig::default(), &s)).unwrap();
        let years: Vec<i32> = annual.iter().map(|a| a.fiscal_year).collect();
        assert_eq!(years, vec![2000, 2001, 2002]);
        assert!(annual.iter().all(|a| a.energy_mwh > 10_000.0));
    }

    #[test]
    fn invalid_cloud_parameters_are_rejected() {
        let cfg = SynthConfig { cloud_alpha: 0.0, ..small() };
        assert!(generate_hourly_ssrd(&cfg, &mut ChaCha20Rng::seed_from_u64(0)).is_err());
    }

    #[test]
    fn stratified_sequence_hits_every_stratum() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let n = 50;
        let mut v = stratified_sequence(n, &mut rng);
        assert!(v.iter().all(|u| (0.0..1.0).contains(u)));
        v.sort_by(f64::total_cmp);
        for (i, u) in v.iter().enumerate() {
            assert_eq!((u * n as f64).floor() as usize, i);
        }
    }
}
