use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::error::Result;
use crate::pipeline::RiskReport;

/// Pretty JSON of the whole report.
pub fn write_json<W: Write>(report: &RiskReport, writer: W) -> Result<()> {
    serde_json::to_writer_pretty(writer, report)?;
    Ok(())
}

pub fn write_json_file(report: &RiskReport, path: impl AsRef<Path>) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_json(report, &mut writer)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// One CSV row per analysis year.
pub fn write_analysis_csv(report: &RiskReport, path: impl AsRef<Path>) -> Result<()> {
    let mut w = csv::Writer::from_path(path)?;
    for row in &report.analysis {
        w.serialize(row)?;
    }
    w.flush()?;
    Ok(())
}

/// Console tables: annual production, the analysis window, fit and losses.
pub fn write_summary<W: Write>(report: &RiskReport, out: &mut W) -> io::Result<()> {
    // ── Annual production ──
    writeln!(out, "\n=== Annual production (rescale factor {:.6}) ===", report.rescale_factor)?;
    writeln!(out, "{:>6} | {:>12} | {:>12}", "FY", "Energy MWh", "Rescaled MWh")?;
    writeln!(out, "{}", "-".repeat(36))?;
    for r in &report.annual {
        writeln!(out, "{:>6} | {:>12.1} | {:>12.1}", r.fiscal_year, r.energy_mwh, r.rescaled_mwh)?;
    }

    // ── Analysis window ──
    writeln!(out, "\n=== Analysis window ({} detrend, limit {:.0}) ===", report.detrender, report.limit)?;
    writeln!(
        out,
        "{:>6} | {:>12} | {:>12} | {:>12} | {:>12} | {:>12}",
        "FY", "Rescaled", "Trend", "Detrended", "Payout", "Payout(det)"
    )?;
    writeln!(out, "{}", "-".repeat(6 + 5 * 15))?;
    for r in &report.analysis {
        writeln!(
            out,
            "{:>6} | {:>12.1} | {:>12.1} | {:>12.1} | {:>12.0} | {:>12.0}",
            r.fiscal_year, r.rescaled_mwh, r.trend, r.detrended, r.payout_untrended, r.payout_detrended,
        )?;
    }

    // ── Fit and losses ──
    let g = &report.gamma;
    writeln!(out, "\n=== Gamma fit ===")?;
    writeln!(out, "  mean {:.1}  std {:.1}  shape {:.4}  scale {:.4}", g.mean, g.std, g.shape, g.scale)?;
    if g.degenerate {
        writeln!(out, "  WARNING: degenerate moments, unit sentinel in use")?;
    }

    let b = &report.burn_costs;
    writeln!(out, "\n=== Burn costs (detrended) ===")?;
    writeln!(out, "{:>10} | {:>10} | {:>10} | {:>10}", "last 5", "last 10", "last 20", "all")?;
    writeln!(out, "{:>10.0} | {:>10.0} | {:>10.0} | {:>10.0}", b.last_5, b.last_10, b.last_20, b.all)?;

    writeln!(
        out,
        "\nExpected loss: {:.2} over {} simulated years",
        report.expected_loss,
        report.simulated.len()
    )?;
    Ok(())
}
