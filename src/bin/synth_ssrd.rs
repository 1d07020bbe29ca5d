use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use solrisk::Result;
use solrisk::synth::{SynthConfig, generate_hourly_ssrd, stratified_sequence};

/// Writes a seeded hourly Date,SSRD CSV to stdout; summary goes to stderr.
#[derive(Debug, Parser)]
#[command(name = "synth_ssrd", version, about)]
struct Args {
    #[arg(long, default_value_t = 42)]
    seed: u64,
    #[arg(long, default_value_t = 1980)]
    first_year: i32,
    #[arg(long, default_value_t = 45)]
    years: u32,
    /// Relative change in yearly level per year
    #[arg(long, default_value_t = -0.002, allow_hyphen_values = true)]
    drift: f64,
    /// Also write a stratified quasi-random sequence of this many values
    #[arg(long, requires = "sequence_out")]
    sequence: Option<usize>,
    #[arg(long)]
    sequence_out: Option<PathBuf>,
}

fn run(args: &Args) -> Result<()> {
    let cfg = SynthConfig {
        first_year: args.first_year,
        years: args.years,
        annual_drift: args.drift,
        ..SynthConfig::default()
    };
    let mut rng = ChaCha20Rng::seed_from_u64(args.seed);
    let samples = generate_hourly_ssrd(&cfg, &mut rng)?;

    let mut w = csv::Writer::from_writer(BufWriter::new(io::stdout().lock()));
    w.write_record(["Date", "SSRD"])?;
    for s in &samples {
        w.write_record([s.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(), format!("{:.1}", s.irradiance)])?;
    }
    w.flush()?;

    let total: f64 = samples.iter().map(|s| s.irradiance).sum();
    eprintln!(
        "synth_ssrd: seed {}, {} fiscal years from {}, {} hourly rows, mean {:.0} J/m2",
        args.seed,
        args.years,
        args.first_year,
        samples.len(),
        total / samples.len().max(1) as f64,
    );

    if let (Some(n), Some(path)) = (args.sequence, &args.sequence_out) {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "u")?;
        for u in stratified_sequence(n, &mut rng) {
            writeln!(out, "{u}")?;
        }
        out.flush()?;
        eprintln!("  sequence: {n} values -> {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    match run(&Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
