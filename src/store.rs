//! Point series out of a gridded irradiance source, with a bounded cache.
//!
//! The store is an owned value: callers create one, keep it for as long as
//! they want cached cells to live, and pass it by `&mut` to queries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RiskError};
use crate::types::IrradianceSample;

/// A lat/lon grid of hourly SSRD series in J/m².
pub trait GridSource {
    fn latitudes(&self) -> &[f64];
    /// Either `-180..180` or `0..360`; the store adapts queries to whichever
    /// the grid uses.
    fn longitudes(&self) -> &[f64];
    fn read_cell(&mut self, ilat: usize, ilon: usize) -> Result<Vec<IrradianceSample>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrradianceUnit {
    /// Accumulated J/m² over the hour, as stored.
    Jm2,
    /// Mean W/m² over the hour.
    Wm2,
    KWhM2,
}

impl IrradianceUnit {
    pub fn convert_joules(&self, jm2: f64) -> f64 {
        match self {
            IrradianceUnit::Jm2 => jm2,
            IrradianceUnit::Wm2 => jm2 / 3_600.0,
            IrradianceUnit::KWhM2 => jm2 / 3_600_000.0,
        }
    }
}

impl FromStr for IrradianceUnit {
    type Err = RiskError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "jm2" | "j/m2" => Ok(IrradianceUnit::Jm2),
            "wm2" | "w/m2" => Ok(IrradianceUnit::Wm2),
            "kwhm2" | "kwh/m2" => Ok(IrradianceUnit::KWhM2),
            other => Err(RiskError::invalid("unit", format!("unknown irradiance unit '{other}'"))),
        }
    }
}

impl fmt::Display for IrradianceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IrradianceUnit::Jm2 => "J/m2",
            IrradianceUnit::Wm2 => "W/m2",
            IrradianceUnit::KWhM2 => "kWh/m2",
        };
        f.write_str(s)
    }
}

// ── LRU cache ──

/// Least-recently-used map with a fixed capacity.
///
/// Recency is a monotonically increasing tick; `order` maps tick -> key so the
/// oldest entry is always the first one.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, (u64, V)>,
    order: BTreeMap<u64, K>,
}

impl<K: Eq + Hash + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(RiskError::invalid("cache_capacity", "must be at least 1"));
        }
        Ok(LruCache { capacity, tick: 0, entries: HashMap::new(), order: BTreeMap::new() })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Marks the entry as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        let (used, value) = self.entries.get_mut(key)?;
        self.order.remove(&*used);
        self.order.insert(tick, key.clone());
        *used = tick;
        Some(value)
    }

    /// Inserts or replaces; returns the key evicted to make room, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        self.tick += 1;
        if let Some((used, _)) = self.entries.remove(&key) {
            self.order.remove(&used);
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity
            && let Some((_, oldest)) = self.order.pop_first()
        {
            self.entries.remove(&oldest);
            evicted = Some(oldest);
        }

        self.order.insert(self.tick, key.clone());
        self.entries.insert(key, (self.tick, value));
        evicted
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }
}

// ── Series store ──

type CellKey = (usize, usize, IrradianceUnit);

/// Nearest-cell series lookup over a [`GridSource`].
pub struct SeriesStore<S> {
    source: S,
    cache: LruCache<CellKey, Vec<IrradianceSample>>,
}

impl<S: GridSource> SeriesStore<S> {
    pub fn new(source: S, capacity: usize) -> Result<Self> {
        Ok(SeriesStore { source, cache: LruCache::new(capacity)? })
    }

    pub fn cached_cells(&self) -> usize {
        self.cache.len()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Grid indices nearest to `(lat, lon)`.
    pub fn nearest(&self, lat: f64, lon: f64) -> Result<(usize, usize)> {
        let lats = self.source.latitudes();
        let lons = self.source.longitudes();
        let lon = if lon < 0.0 && lons.iter().any(|&l| l > 180.0) { lon + 360.0 } else { lon };
        let ilat = nearest_index(lats, lat).ok_or(RiskError::InsufficientData {
            what: "grid latitudes",
            needed: 1,
            got: 0,
        })?;
        let ilon = nearest_index(lons, lon).ok_or(RiskError::InsufficientData {
            what: "grid longitudes",
            needed: 1,
            got: 0,
        })?;
        Ok((ilat, ilon))
    }

    /// Hourly series at the cell nearest `(lat, lon)`, converted to `unit`
    /// and optionally clipped to `[from, to]` (both inclusive).
    pub fn series(
        &mut self,
        lat: f64,
        lon: f64,
        unit: IrradianceUnit,
        clip: Option<(NaiveDateTime, NaiveDateTime)>,
    ) -> Result<Vec<IrradianceSample>> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(RiskError::invalid("latitude", format!("must be within [-90, 90], got {lat}")));
        }
        if !lon.is_finite() {
            return Err(RiskError::invalid("longitude", format!("must be finite, got {lon}")));
        }
        let (ilat, ilon) = self.nearest(lat, lon)?;
        let key = (ilat, ilon, unit);

        if self.cache.get(&key).is_none() {
            let raw = self.source.read_cell(ilat, ilon)?;
            let converted: Vec<IrradianceSample> = raw
                .into_iter()
                .map(|s| IrradianceSample::new(s.timestamp, unit.convert_joules(s.irradiance)))
                .collect();
            debug!(ilat, ilon, %unit, rows = converted.len(), "cell loaded");
            if let Some((elat, elon, eunit)) = self.cache.put(key, converted) {
                debug!(ilat = elat, ilon = elon, unit = %eunit, "cell evicted");
            }
        }

        let cached = self.cache.get(&key).map(Vec::as_slice).unwrap_or(&[]);
        Ok(match clip {
            Some((from, to)) => cached
                .iter()
                .filter(|s| s.timestamp >= from && s.timestamp <= to)
                .copied()
                .collect(),
            None => cached.to_vec(),
        })
    }
}

fn nearest_index(grid: &[f64], x: f64) -> Option<usize> {
    grid.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - x).abs().total_cmp(&(*b - x).abs()))
        .map(|(i, _)| i)
}

// ── In-memory grid ──

/// Grid held entirely in memory, row-major by latitude. Counts reads so
/// cache behaviour can be observed.
#[derive(Debug, Clone, Default)]
pub struct MemoryGrid {
    latitudes: Vec<f64>,
    longitudes: Vec<f64>,
    cells: Vec<Vec<IrradianceSample>>,
    reads: usize,
}

impl MemoryGrid {
    pub fn new(latitudes: Vec<f64>, longitudes: Vec<f64>) -> Self {
        let cells = vec![Vec::new(); latitudes.len() * longitudes.len()];
        MemoryGrid { latitudes, longitudes, cells, reads: 0 }
    }

    pub fn set_cell(&mut self, ilat: usize, ilon: usize, series: Vec<IrradianceSample>) -> Result<()> {
        let idx = self.index(ilat, ilon)?;
        self.cells[idx] = series;
        Ok(())
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn index(&self, ilat: usize, ilon: usize) -> Result<usize> {
        if ilat >= self.latitudes.len() || ilon >= self.longitudes.len() {
            return Err(RiskError::invalid(
                "cell",
                format!("({ilat}, {ilon}) outside {}x{} grid", self.latitudes.len(), self.longitudes.len()),
            ));
        }
        Ok(ilat * self.longitudes.len() + ilon)
    }
}

impl GridSource for MemoryGrid {
    fn latitudes(&self) -> &[f64] {
        &self.latitudes
    }

    fn longitudes(&self) -> &[f64] {
        &self.longitudes
    }

    fn read_cell(&mut self, ilat: usize, ilon: usize) -> Result<Vec<IrradianceSample>> {
        let idx = self.index(ilat, ilon)?;
        self.reads += 1;
        Ok(self.cells[idx].clone())
    }
}
