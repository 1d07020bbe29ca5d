use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One irradiance observation (SSRD, J/m² per hour unless converted).
/// Owned by whoever loaded it; the pipeline only borrows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IrradianceSample {
    pub timestamp: NaiveDateTime,
    pub irradiance: f64,
}

impl IrradianceSample {
    pub fn new(timestamp: NaiveDateTime, irradiance: f64) -> Self {
        IrradianceSample { timestamp, irradiance }
    }
}

/// Energy produced in the hour ending at `timestamp`, one-to-one with an
/// `IrradianceSample`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HourlyEnergyRecord {
    pub timestamp: NaiveDateTime,
    pub energy_kwh: f64,
}

/// Calendar-month total, keyed by the last day of the month.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyAggregate {
    pub period_end: NaiveDate,
    pub energy_mwh: f64,
}

/// Fiscal-year total. `fiscal_year` is the calendar year the window opens in
/// (Sep 1 of that year).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnnualAggregate {
    pub fiscal_year: i32,
    pub energy_mwh: f64,
}

pub const KWH_PER_MWH: f64 = 1_000.0;

/// Inclusive range of fiscal years the annual aggregation retains.
pub const FIRST_FISCAL_YEAR: i32 = 1980;
pub const LAST_FISCAL_YEAR: i32 = 2024;
