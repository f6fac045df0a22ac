use std::env;
use std::sync::Once;

use crate::packing::config::PackingConfig;
use crate::packing::stats::PhaseType;

/// Print compilation information (only prints once)
pub fn print_compile_info() {
	static PRINT_COMPILE_ONCE: Once = Once::new();
	PRINT_COMPILE_ONCE.call_once(|| {
		let program_name = env::current_exe()
			.ok()
			.as_ref()
			.and_then(|path| path.file_name())
			.and_then(|name| name.to_str())
			.unwrap_or("grain_pack")
			.to_string();

		eprintln!("Program: {}", program_name);
		eprintln!("Compiled on: {} at {}", env!("COMPILE_DATE"), env!("COMPILE_TIME"));
		eprintln!("Version: {}", env!("CARGO_PKG_VERSION"));
	});
}

/// Print the domain and the phases about to be packed
pub fn print_run_header(config: &PackingConfig, seed: u64) {
	let d = &config.domain;
	let size = d.size();
	eprintln!("Domain: {} x {} x {} voxels", d.dims[0], d.dims[1], d.dims[2]);
	eprintln!(
		"  Resolution: {:.3} x {:.3} x {:.3}  Size: {:.2} x {:.2} x {:.2}",
		d.resolution[0], d.resolution[1], d.resolution[2], size[0], size[1], size[2]
	);
	eprintln!("  Boundaries: {}", if d.periodic { "periodic" } else { "open" });
	eprintln!("  Seed: {}", seed);
	for (i, phase) in config.statistics.phases.iter().enumerate() {
		let packed = if phase.phase_type == PhaseType::Primary { "" } else { " (not packed)" };
		eprintln!(
			"  Phase {} {:?}: fraction {:.3}, {:?}, diameters [{:.3}, {:.3}){}",
			i, phase.phase_type, phase.phase_fraction, phase.shape, phase.min_diameter, phase.max_diameter, packed
		);
	}
}
