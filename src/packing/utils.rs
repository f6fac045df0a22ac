use std::mem::size_of;

use crate::packing::grid::PackingGrid;

/// Format large numbers with KB, MB, GB, TB suffixes
pub fn format_bytes(bytes: usize) -> String {
	const KB: usize = 1024;
	const MB: usize = KB * 1024;
	const GB: usize = MB * 1024;
	const TB: usize = GB * 1024;

	if bytes >= TB {
		format!("{:.2} TB", bytes as f64 / TB as f64)
	} else if bytes >= GB {
		format!("{:.2} GB", bytes as f64 / GB as f64)
	} else if bytes >= MB {
		format!("{:.2} MB", bytes as f64 / MB as f64)
	} else if bytes >= KB {
		format!("{:.2} KB", bytes as f64 / KB as f64)
	} else {
		format!("{} bytes", bytes)
	}
}

impl PackingGrid {
	/// Report memory usage and print a detailed breakdown
	pub fn report_memory(&self) {
		let struct_overhead = size_of::<Self>() - size_of::<Vec<i32>>(); // Exclude dynamic storage
		let owner_bytes = self.owners.capacity() * size_of::<i32>();
		let total_memory = struct_overhead + owner_bytes;

		eprintln!("PackingGrid Memory Report:");
		eprintln!("-------------------------");
		eprintln!("  Dimensions: {} x {} x {}", self.len_i, self.len_j, self.len_k);
		eprintln!("  Total Cells: {:e}", self.total_cells as f64);
		eprintln!(
			"  Cell Size: {:.2} x {:.2} x {:.2}",
			self.resolution[0], self.resolution[1], self.resolution[2]
		);
		eprintln!("  Periodic: {}", self.periodic);
		eprintln!("  Struct Overhead: {}", format_bytes(struct_overhead));
		eprintln!("  Owner Counts: {}", format_bytes(owner_bytes));
		eprintln!("  Total Memory Used: {}", format_bytes(total_memory));
		eprintln!("-------------------------");
	}

	/// Convert (i, j, k) to a linear index
	#[inline]
	pub fn ijk_to_index(&self, i: usize, j: usize, k: usize) -> usize {
		i + j * self.len_i + k * self.len_i * self.len_j
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::packing::config::Domain;

	#[test]
	fn test_format_bytes() {
		assert_eq!(format_bytes(512), "512 bytes");
		assert_eq!(format_bytes(2048), "2.00 KB");
		assert_eq!(format_bytes(3 * 1024 * 1024), "3.00 MB");
	}

	#[test]
	fn test_linear_index_layout() {
		let g = PackingGrid::new(&Domain::new([10, 20, 6], [1.0; 3], true));
		assert_eq!(g.ijk_to_index(0, 0, 0), 0);
		assert_eq!(g.ijk_to_index(1, 0, 0), 1);
		assert_eq!(g.ijk_to_index(0, 1, 0), 5);
		assert_eq!(g.ijk_to_index(0, 0, 1), 50);
		assert_eq!(g.ijk_to_index(4, 9, 2), g.total_cells - 1);
	}
}
