use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use tracing::debug;

use crate::config::PanelConfig;
use crate::error::{Result, RiskError};
use crate::types::{
    AnnualAggregate, FIRST_FISCAL_YEAR, HourlyEnergyRecord, IrradianceSample, KWH_PER_MWH,
    LAST_FISCAL_YEAR, MonthlyAggregate,
};

const FISCAL_START_MONTH: u32 = 9;
const FISCAL_DAYS: i64 = 365;

/// Convert one irradiance sample to the plant's energy output for that hour.
pub fn hourly_energy_record(panel: &PanelConfig, sample: &IrradianceSample) -> HourlyEnergyRecord {
    HourlyEnergyRecord {
        timestamp: sample.timestamp,
        energy_kwh: sample.irradiance
            * panel.area_cells
            * panel.efficiency_ratio
            * panel.performance_factor
            * panel.unit_conversion,
    }
}

pub fn hourly_energy(panel: &PanelConfig, samples: &[IrradianceSample]) -> Vec<HourlyEnergyRecord> {
    samples.iter().map(|s| hourly_energy_record(panel, s)).collect()
}

/// Sum hourly energy into calendar months (MWh).
///
/// Months are contiguous from the first to the last month observed; a gap
/// month inside that span reports zero rather than disappearing.
pub fn monthly_energy(records: &[HourlyEnergyRecord]) -> Vec<MonthlyAggregate> {
    let mut sums: BTreeMap<(i32, u32), f64> = BTreeMap::new();
    for r in records {
        *sums.entry((r.timestamp.year(), r.timestamp.month())).or_insert(0.0) += r.energy_kwh;
    }

    let (Some(&first), Some(&last)) = (sums.keys().next(), sums.keys().next_back()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let (mut year, mut month) = first;
    while (year, month) <= last {
        let kwh = sums.get(&(year, month)).copied().unwrap_or(0.0);
        out.push(MonthlyAggregate {
            period_end: month_end(year, month),
            energy_mwh: kwh / KWH_PER_MWH,
        });
        (year, month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    }
    out
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    let (ny, nm) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    // Day 1 of any month in chrono's supported range always exists.
    NaiveDate::from_ymd_opt(ny, nm, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

/// A fiscal-year accounting window: `[start, end)`.
///
/// Starts at 00:00 on Sep 1 of `fiscal_year` and spans 365 days, or 366 when
/// a Feb 29 falls inside the 365-day span. Consecutive windows are adjacent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiscalWindow {
    pub fiscal_year: i32,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl FiscalWindow {
    /// `None` only for years outside chrono's calendar.
    ///
    /// The leap day is the Feb 29 that falls inside the window itself, so
    /// fiscal 2003 (Sep 2003 to Aug 2004) has 366 days and fiscal 2000 has
    /// 365. Extending on the calendar year of `fiscal_year` instead would
    /// make fiscal 2000 overlap the first day of fiscal 2001.
    pub fn for_year(fiscal_year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(fiscal_year, FISCAL_START_MONTH, 1)?
            .and_time(NaiveTime::MIN);
        let mut end = start + Duration::days(FISCAL_DAYS);
        if leap_day_within(start, end) {
            end += Duration::days(1);
        }
        Some(FiscalWindow { fiscal_year, start, end })
    }

    pub fn contains(&self, timestamp: NaiveDateTime) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days()
    }
}

/// Whether any Feb 29 lies in `[start, end)`. Years without a Feb 29 simply
/// contribute nothing.
fn leap_day_within(start: NaiveDateTime, end: NaiveDateTime) -> bool {
    (start.year()..=end.year())
        .filter_map(|y| NaiveDate::from_ymd_opt(y, 2, 29))
        .map(|d| d.and_time(NaiveTime::MIN))
        .any(|leap| leap >= start && leap < end)
}

/// Sum hourly energy over fiscal-year windows (MWh).
///
/// One candidate per distinct calendar year in the input; candidates outside
/// `FIRST_FISCAL_YEAR..=LAST_FISCAL_YEAR` and windows without any record are
/// dropped, never zero-filled.
pub fn annual_energy(records: &[HourlyEnergyRecord]) -> Result<Vec<AnnualAggregate>> {
    if records.is_empty() {
        return Err(RiskError::NoValidDates);
    }

    let mut sorted: Vec<&HourlyEnergyRecord> = records.iter().collect();
    sorted.sort_by_key(|r| r.timestamp);

    let mut candidates: Vec<i32> = sorted.iter().map(|r| r.timestamp.year()).collect();
    candidates.dedup();

    let mut out = Vec::new();
    for year in candidates {
        if !(FIRST_FISCAL_YEAR..=LAST_FISCAL_YEAR).contains(&year) {
            debug!(year, "fiscal year outside retained range");
            continue;
        }
        let Some(window) = FiscalWindow::for_year(year) else {
            continue;
        };

        let lo = sorted.partition_point(|r| r.timestamp < window.start);
        let hi = sorted.partition_point(|r| r.timestamp < window.end);
        let inside = &sorted[lo..hi];
        if inside.is_empty() {
            debug!(year, "no records inside fiscal window");
            continue;
        }
        debug_assert!(inside.iter().all(|r| window.contains(r.timestamp)));

        let kwh: f64 = inside.iter().map(|r| r.energy_kwh).sum();
        out.push(AnnualAggregate { fiscal_year: year, energy_mwh: kwh / KWH_PER_MWH });
    }

    debug!(rows = out.len(), "annual energy aggregated");
    Ok(out)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    /// One record per hour from `from` (inclusive) to `to` (exclusive).
    fn hourly(from: NaiveDateTime, to: NaiveDateTime, kwh: f64) -> Vec<HourlyEnergyRecord> {
        let mut out = Vec::new();
        let mut t = from;
        while t < to {
            out.push(HourlyEnergyRecord { timestamp: t, energy_kwh: kwh });
            t += Duration::hours(1);
        }
        out
    }

    #[test]
    fn hourly_energy_multiplies_all_factors() {
        let panel = PanelConfig {
            area_cells: 2.0,
            efficiency_ratio: 0.5,
            performance_factor: 0.8,
            unit_conversion: 0.1,
        };
        let s = IrradianceSample::new(ts(2010, 1, 1, 12), 100.0);
        let r = hourly_energy_record(&panel, &s);
        assert_eq!(r.timestamp, s.timestamp);
        assert_relative_eq!(r.energy_kwh, 100.0 * 2.0 * 0.5 * 0.8 * 0.1, epsilon = 1e-12);
    }

    #[test]
    fn canonical_panel_converts_joules_to_kwh() {
        let panel = PanelConfig::default();
        let s = IrradianceSample::new(ts(2010, 6, 1, 12), 3_600_000.0);
        let r = hourly_energy_record(&panel, &s);
        assert_relative_eq!(r.energy_kwh, 348_642.0 * 0.165 * 0.7969, max_relative = 1e-12);
    }

    #[test]
    fn fiscal_window_containing_leap_day_spans_366_days() {
        let w = FiscalWindow::for_year(2003).unwrap();
        assert_eq!(w.start, ts(2003, 9, 1, 0));
        assert_eq!(w.end, ts(2004, 9, 1, 0));
        assert_eq!(w.days(), 366);
    }

    #[test]
    fn fiscal_window_without_leap_day_spans_365_days() {
        for year in [2000, 2001, 2002] {
            let w = FiscalWindow::for_year(year).unwrap();
            assert_eq!(w.days(), 365, "fiscal {year}");
            assert_eq!(w.end, ts(year + 1, 9, 1, 0), "fiscal {year}");
        }
    }

    #[test]
    fn consecutive_windows_are_adjacent() {
        for year in 1980..2024 {
            let a = FiscalWindow::for_year(year).unwrap();
            let b = FiscalWindow::for_year(year + 1).unwrap();
            assert_eq!(a.end, b.start, "fiscal {year}");
            assert!(!a.contains(b.start));
        }
    }

    #[test]
    fn window_membership_is_half_open() {
        let w = FiscalWindow::for_year(2010).unwrap();
        assert!(w.contains(ts(2010, 9, 1, 0)));
        assert!(w.contains(ts(2011, 8, 31, 23)));
        assert!(!w.contains(ts(2011, 9, 1, 0)));
        assert!(!w.contains(ts(2010, 8, 31, 23)));
    }

    #[test]
    fn annual_energy_sums_complete_fiscal_year() {
        let records = hourly(ts(2003, 9, 1, 0), ts(2004, 9, 1, 0), 2.0);
        assert_eq!(records.len(), 366 * 24);
        let annual = annual_energy(&records).unwrap();
        // Candidate 2004 opens Sep 1 2004: no records, so no row.
        assert_eq!(annual.len(), 1);
        assert_eq!(annual[0].fiscal_year, 2003);
        assert_relative_eq!(annual[0].energy_mwh, 366.0 * 24.0 * 2.0 / 1_000.0, epsilon = 1e-9);
    }

    #[test]
    fn annual_energy_splits_at_september_first() {
        let records = hourly(ts(2010, 1, 1, 0), ts(2012, 1, 1, 0), 1.0);
        let annual = annual_energy(&records).unwrap();
        let years: Vec<i32> = annual.iter().map(|a| a.fiscal_year).collect();
        assert_eq!(years, vec![2010, 2011]);
        // Fiscal 2010: Sep 1 2010 .. Sep 1 2011, 365 days (no Feb 29).
        assert_relative_eq!(annual[0].energy_mwh, 365.0 * 24.0 / 1_000.0, epsilon = 1e-9);
        // Fiscal 2011: Sep 1 2011 .. Jan 1 2012, partial.
        assert_relative_eq!(annual[1].energy_mwh, 122.0 * 24.0 / 1_000.0, epsilon = 1e-9);
    }

    #[test]
    fn annual_energy_drops_years_outside_range() {
        let mut records = hourly(ts(1979, 1, 1, 0), ts(1979, 1, 2, 0), 1.0);
        records.extend(hourly(ts(2020, 10, 1, 0), ts(2020, 10, 2, 0), 1.0));
        records.extend(hourly(ts(2025, 10, 1, 0), ts(2025, 10, 2, 0), 1.0));
        records.extend(hourly(ts(2030, 10, 1, 0), ts(2030, 10, 2, 0), 1.0));
        let annual = annual_energy(&records).unwrap();
        let years: Vec<i32> = annual.iter().map(|a| a.fiscal_year).collect();
        assert_eq!(years, vec![2020]);
        assert!(annual.iter().all(|a| a.energy_mwh > 0.0));
    }

    #[test]
    fn annual_energy_is_independent_of_input_order() {
        let mut records = hourly(ts(2015, 1, 1, 0), ts(2016, 12, 31, 0), 1.5);
        let forward = annual_energy(&records).unwrap();
        records.reverse();
        let backward = annual_energy(&records).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn annual_energy_rejects_empty_input() {
        assert!(matches!(annual_energy(&[]), Err(RiskError::NoValidDates)));
    }

    #[test]
    fn monthly_energy_groups_by_month_end() {
        let records = hourly(ts(2012, 1, 1, 0), ts(2012, 3, 1, 0), 1.0);
        let monthly = monthly_energy(&records);
        assert_eq!(monthly.len(), 2);
        assert_eq!(monthly[0].period_end, NaiveDate::from_ymd_opt(2012, 1, 31).unwrap());
        assert_eq!(monthly[1].period_end, NaiveDate::from_ymd_opt(2012, 2, 29).unwrap());
        assert_relative_eq!(monthly[0].energy_mwh, 31.0 * 24.0 / 1_000.0, epsilon = 1e-9);
        assert_relative_eq!(monthly[1].energy_mwh, 29.0 * 24.0 / 1_000.0, epsilon = 1e-9);
    }

    #[test]
    fn monthly_energy_zero_fills_gap_months() {
        let mut records = hourly(ts(2012, 11, 1, 0), ts(2012, 11, 2, 0), 1.0);
        records.extend(hourly(ts(2013, 2, 1, 0), ts(2013, 2, 2, 0), 1.0));
        let monthly = monthly_energy(&records);
        let ends: Vec<(i32, u32)> =
            monthly.iter().map(|m| (m.period_end.year(), m.period_end.month())).collect();
        assert_eq!(ends, vec![(2012, 11), (2012, 12), (2013, 1), (2013, 2)]);
        assert_eq!(monthly[1].energy_mwh, 0.0);
        assert_eq!(monthly[2].energy_mwh, 0.0);
    }

    #[test]
    fn monthly_energy_of_nothing_is_empty() {
        assert!(monthly_energy(&[]).is_empty());
    }
}
