use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use solrisk::blow::BlowDirection;
use solrisk::config::{AnalysisWindow, RiskConfig};
use solrisk::detrend::Detrender;
use solrisk::ingest::{read_irradiance_csv, read_quasi_random_csv};
use solrisk::report::{write_analysis_csv, write_json_file, write_summary};
use solrisk::{Result, RiskPipeline};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Method {
    Linear,
    Kernel,
}

/// Expected loss of a solar production shortfall cover.
#[derive(Debug, Parser)]
#[command(name = "solrisk", version, about, long_about = None)]
struct Cli {
    /// Hourly irradiance CSV with Date and SSRD columns
    irradiance: PathBuf,

    /// Quasi-random sequence CSV (first column, values in [0, 1])
    #[arg(short = 'q', long)]
    quasi_random: PathBuf,

    /// JSON config; omitted fields keep their reference values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(short, long, default_value = "risk_report.json")]
    output: PathBuf,

    /// Also write the analysis table as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Suppress console tables
    #[arg(long)]
    quiet: bool,

    #[arg(long)]
    strike: Option<f64>,
    #[arg(long)]
    exit: Option<f64>,
    #[arg(long)]
    ppa: Option<f64>,

    #[arg(long)]
    blow_point: Option<f64>,
    /// Percent; negative stretches away from the pivot
    #[arg(long, allow_hyphen_values = true)]
    blow_factor: Option<f64>,
    /// down/D or up/U
    #[arg(long)]
    blow_direction: Option<BlowDirection>,
    #[arg(long, allow_hyphen_values = true)]
    blow_shift: Option<f64>,

    #[arg(long)]
    start_year: Option<i32>,
    #[arg(long)]
    end_year: Option<i32>,

    #[arg(long, value_enum)]
    detrend: Option<Method>,
    /// Kernel bandwidth in years
    #[arg(long)]
    bandwidth: Option<f64>,

    /// Client P50 in MWh the reference years are scaled to
    #[arg(long, conflicts_with = "no_rescale")]
    target_p50: Option<f64>,
    /// Leave the annual series unscaled
    #[arg(long)]
    no_rescale: bool,
}

impl Cli {
    fn risk_config(&self) -> Result<RiskConfig> {
        let mut config = match &self.config {
            Some(path) => RiskConfig::from_json_file(path)?,
            None => RiskConfig::canonical(),
        };

        if let Some(v) = self.strike {
            config.payout.strike = v;
        }
        if let Some(v) = self.exit {
            config.payout.exit = v;
        }
        if let Some(v) = self.ppa {
            config.payout.ppa_rate = v;
        }
        if let Some(v) = self.blow_point {
            config.blow.pivot = v;
        }
        if let Some(v) = self.blow_factor {
            config.blow.factor_percent = v;
        }
        if let Some(v) = self.blow_direction {
            config.blow.direction = v;
        }
        if let Some(v) = self.blow_shift {
            config.blow.shift = v;
        }

        config.window = AnalysisWindow {
            start_year: self.start_year.unwrap_or(config.window.start_year),
            end_year: self.end_year.unwrap_or(config.window.end_year),
        };

        let bandwidth = match (config.detrender, self.bandwidth) {
            (_, Some(bw)) => bw,
            (Detrender::Kernel { bandwidth }, None) => bandwidth,
            (Detrender::Linear, None) => 3.0,
        };
        config.detrender = match self.detrend {
            Some(Method::Linear) => Detrender::Linear,
            Some(Method::Kernel) => Detrender::Kernel { bandwidth },
            None => match config.detrender {
                Detrender::Kernel { .. } => Detrender::Kernel { bandwidth },
                Detrender::Linear => Detrender::Linear,
            },
        };

        if self.no_rescale {
            config.rescale.target_p50 = None;
        } else if let Some(v) = self.target_p50 {
            config.rescale.target_p50 = Some(v);
        }

        config.validate()?;
        Ok(config)
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = cli.risk_config()?;
    let samples = read_irradiance_csv(&cli.irradiance)?;
    let quasi_random = read_quasi_random_csv(&cli.quasi_random)?;
    info!(samples = samples.len(), sequence = quasi_random.len(), "inputs loaded");

    let report = RiskPipeline::new(config)?.run(&samples, &quasi_random)?;

    write_json_file(&report, &cli.output)?;
    if let Some(path) = &cli.csv {
        write_analysis_csv(&report, path)?;
    }

    if !cli.quiet {
        write_summary(&report, &mut io::stdout().lock())?;
        println!("Report written to {}", cli.output.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        let mut full = vec!["solrisk", "ssrd.csv", "-q", "sobol.csv"];
        full.extend_from_slice(args);
        Cli::try_parse_from(full).unwrap()
    }

    #[test]
    fn defaults_are_canonical() {
        let c = parse(&[]).risk_config().unwrap();
        assert_eq!(c, RiskConfig::canonical());
    }

    #[test]
    fn overrides_apply() {
        let c = parse(&[
            "--strike", "120000", "--blow-factor", "-10", "--blow-direction", "U",
            "--start-year", "2005", "--detrend", "kernel", "--bandwidth", "2",
        ])
        .risk_config()
        .unwrap();
        assert_eq!(c.payout.strike, 120_000.0);
        assert_eq!(c.blow.factor_percent, -10.0);
        assert_eq!(c.blow.direction, BlowDirection::Up);
        assert_eq!(c.window.start_year, 2005);
        assert_eq!(c.detrender, Detrender::Kernel { bandwidth: 2.0 });
    }

    #[test]
    fn kernel_defaults_to_three_year_bandwidth() {
        let c = parse(&["--detrend", "kernel"]).risk_config().unwrap();
        assert_eq!(c.detrender, Detrender::Kernel { bandwidth: 3.0 });
    }

    #[test]
    fn no_rescale_clears_target() {
        let c = parse(&["--no-rescale"]).risk_config().unwrap();
        assert_eq!(c.rescale.target_p50, None);
    }

    #[test]
    fn invalid_override_is_rejected() {
        assert!(parse(&["--exit", "200000"]).risk_config().is_err());
        assert!(parse(&["--detrend", "kernel", "--bandwidth", "0"]).risk_config().is_err());
    }
}
