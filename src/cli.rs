use clap::{Parser, command};
use std::path::PathBuf;

/// Meander migration analysis pipeline
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Directory holding the input tables (reaches, curvature, migration,
    /// evi, clay, flows)
    #[arg(default_value = "data")]
    data_dir: PathBuf,

    /// Directory for output tables and the results object
    #[arg(short, long, default_value = "results")]
    out_dir: PathBuf,

    /// Generate a seeded synthetic dataset instead of reading data_dir
    #[arg(long)]
    synthetic: bool,

    /// Seed for the synthetic dataset
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

pub fn get_args() -> (PathBuf, PathBuf, bool, u64) {
    let args = Args::parse();
    (args.data_dir, args.out_dir, args.synthetic, args.seed)
}
