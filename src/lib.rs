//! Solar production shortfall cover: irradiance -> fiscal-year energy ->
//! detrended history -> gamma fit -> quasi-random simulation -> expected loss.

pub mod blow;
pub mod config;
pub mod detrend;
pub mod energy;
pub mod error;
pub mod gamma;
pub mod ingest;
pub mod payout;
pub mod pipeline;
pub mod report;
pub mod simulation;
pub mod store;
pub mod synth;
pub mod types;

pub use error::{Result, RiskError};
pub use pipeline::{RiskPipeline, RiskReport};
