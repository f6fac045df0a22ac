use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use grain_pack::packing::config::PackingConfig;
use grain_pack::packing::engine::PackingEngine;
use grain_pack::packing::info;

/// Pack synthetic grains into a voxel domain
#[derive(Parser)]
#[command(name = "grain_pack")]
#[command(about = "Stochastic grain packing for synthetic microstructures", long_about = None)]
#[command(version)]
struct Cli {
	/// JSON file with domain, settings and phase statistics
	#[arg(short, long)]
	config: PathBuf,

	/// PRNG seed (overrides the config)
	#[arg(long)]
	seed: Option<u64>,

	/// Voxel counts along x, y, z
	#[arg(long, num_args = 3, value_names = ["X", "Y", "Z"])]
	dims: Option<Vec<usize>>,

	/// Voxel edge lengths along x, y, z
	#[arg(long, num_args = 3, value_names = ["RX", "RY", "RZ"])]
	resolution: Option<Vec<f64>>,

	/// Wrap grains across domain faces
	#[arg(long, conflicts_with = "no_periodic")]
	periodic: bool,

	/// Clip grains at domain faces
	#[arg(long)]
	no_periodic: bool,

	/// Where to write the packed population
	#[arg(short, long, default_value = "packed_grains.json")]
	output: PathBuf,

	/// Show a progress bar during refinement
	#[arg(long)]
	progress: bool,

	/// Print the packing grid memory report
	#[arg(long)]
	memory_report: bool,
}

fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
		.with_writer(std::io::stderr)
		.init();

	let cli = Cli::parse();
	info::print_compile_info();

	let mut config = PackingConfig::from_json_file(&cli.config)
		.with_context(|| format!("failed to load config {}", cli.config.display()))?;
	if let Some(seed) = cli.seed {
		config.settings.seed = Some(seed);
	}
	if let Some(dims) = &cli.dims {
		config.domain.dims = [dims[0], dims[1], dims[2]];
	}
	if let Some(res) = &cli.resolution {
		config.domain.resolution = [res[0], res[1], res[2]];
	}
	if cli.periodic {
		config.domain.periodic = true;
	}
	if cli.no_periodic {
		config.domain.periodic = false;
	}

	let mut engine = PackingEngine::new(config.clone()).with_progress(cli.progress);
	info::print_run_header(&config, engine.seed());

	let start = Instant::now();
	let outcome = engine.execute();
	// a failed run still hands over whatever population it holds
	let summary = match &outcome {
		Ok(summary) => summary.clone(),
		Err(_) => engine.summary(start.elapsed().as_secs_f64()),
	};
	if cli.memory_report {
		engine.grid().report_memory();
	}

	eprintln!(
		"Packed {} grains, {} of {} cells covered, filling error {:.4}",
		summary.grain_count, summary.covered_cells, summary.total_cells, summary.filling_error
	);
	engine
		.write_population_json(&cli.output, &summary)
		.with_context(|| format!("failed to write {}", cli.output.display()))?;

	if outcome.is_err() {
		bail!(
			"packing failed with status {}: {} ({} grains kept in {})",
			engine.error_condition(),
			engine.error_message(),
			engine.grains().len(),
			cli.output.display()
		);
	}
	Ok(())
}
