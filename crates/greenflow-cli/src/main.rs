use std::path::PathBuf;

use clap::Parser;
use greenflow_core::{
    job::UNNAMED_JOB, units::Nanosecs, JobDescriptor, PayloadSize, RouteKeyFormat, SimOpts,
};
use rand::prelude::*;

/// Longest initial delay the simulated clock can represent, in milliseconds.
const MAX_DELAY_MS: u64 = u64::MAX / 1_000_000;

/// Simulate a job split into concurrent flows and report its energy.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Platform file (JSON or Dhall). Its path names the route, as in
    /// `platforms/<source>_<destination>_network.json`
    platform: PathBuf,

    /// Number of concurrent flows
    #[arg(default_value_t = 1)]
    flow_count: usize,

    /// Job size in bytes, or "random"
    #[arg(default_value = "25000")]
    size: PayloadSize,

    /// Job identifier used in the report file name
    #[arg(default_value = UNNAMED_JOB)]
    job_id: String,

    /// Directory reports are written to
    #[arg(short, long, default_value = "data")]
    output_dir: PathBuf,

    /// Random seed for "random" sizes
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Directory marker preceding the route key in the platform path
    #[arg(long, default_value = RouteKeyFormat::DEFAULT_MARKER)]
    marker: String,

    /// File name suffix following the route key
    #[arg(long, default_value = RouteKeyFormat::DEFAULT_SUFFIX)]
    suffix: String,

    /// Idle time before the sender starts, in milliseconds
    #[arg(long, default_value_t = 10_000)]
    initial_delay_ms: u64,

    /// Computation charged per byte handled
    #[arg(long, default_value_t = 1.0)]
    flops_per_byte: f64,

    /// Abandon the run after this much simulated time, in milliseconds
    #[arg(long)]
    deadline_ms: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    anyhow::ensure!(
        args.flops_per_byte.is_finite() && args.flops_per_byte >= 0.0,
        "flops per byte must be a finite, non-negative number"
    );
    anyhow::ensure!(
        args.initial_delay_ms <= MAX_DELAY_MS,
        "initial delay must not exceed {MAX_DELAY_MS} ms"
    );

    let mut rng = StdRng::seed_from_u64(args.seed);
    let job = JobDescriptor::resolve(args.job_id, args.flow_count, &args.size, &mut rng)?;
    let format = RouteKeyFormat::builder()
        .marker(args.marker)
        .suffix(args.suffix)
        .build();
    let opts = SimOpts::builder()
        .initial_delay(Nanosecs::from_millis(args.initial_delay_ms))
        .flops_per_byte(args.flops_per_byte)
        .deadline(args.deadline_ms.map(Nanosecs::from_millis))
        .build();

    let report = greenflow_utils::run_from_file(&args.platform, &format, job, opts)?;
    let path = greenflow_utils::write_report(&args.output_dir, &report)?;
    log::info!(
        "Transfer took {}s, hosts consumed {}, links consumed {}",
        report.transfer_duration,
        report.total_energy_hosts,
        report.total_link_energy
    );
    println!("{}", path.display());
    Ok(())
}
