//! Bhattacharyya overlap between simulated and target histograms.
//!
//! 1.0 means identical normalized histograms, 0.0 means disjoint support.

/// Σ √(p·q) over paired bins.
pub fn compare_1d_distributions(sim: &[f64], target: &[f64]) -> f64 {
	sim.iter().zip(target).map(|(p, q)| (p * q).max(0.0).sqrt()).sum()
}

/// Mean of the 1-D overlap over categories (one row per primary phase).
pub fn compare_2d_distributions(sim: &[Vec<f64>], target: &[Vec<f64>]) -> f64 {
	let n = sim.len().min(target.len());
	if n == 0 {
		return 0.0;
	}
	let total: f64 = sim.iter().zip(target).map(|(p, q)| compare_1d_distributions(p, q)).sum();
	total / n as f64
}

/// Mean of the 2-D overlap over categories.
pub fn compare_3d_distributions(sim: &[Vec<Vec<f64>>], target: &[Vec<Vec<f64>>]) -> f64 {
	let n = sim.len().min(target.len());
	if n == 0 {
		return 0.0;
	}
	let total: f64 = sim.iter().zip(target).map(|(p, q)| compare_2d_distributions(p, q)).sum();
	total / n as f64
}

/// Scale `values` to sum to 1; all-zero input stays zero.
pub fn normalize(values: &mut [f64]) {
	let total: f64 = values.iter().sum();
	if total > 0.0 {
		for v in values.iter_mut() {
			*v /= total;
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn test_identical_histograms() {
		let h = vec![0.1, 0.2, 0.3, 0.4];
		assert_relative_eq!(compare_1d_distributions(&h, &h), 1.0, epsilon = 1e-12);
		let h2 = vec![h.clone(), vec![0.5, 0.5, 0.0, 0.0]];
		assert_relative_eq!(compare_2d_distributions(&h2, &h2), 1.0, epsilon = 1e-12);
	}

	#[test]
	fn test_disjoint_histograms() {
		let p = vec![1.0, 0.0];
		let q = vec![0.0, 1.0];
		assert_eq!(compare_1d_distributions(&p, &q), 0.0);
	}

	#[test]
	fn test_overlap_is_bounded() {
		let p = vec![vec![0.7, 0.2, 0.1], vec![0.0, 0.5, 0.5]];
		let q = vec![vec![0.1, 0.3, 0.6], vec![0.3, 0.3, 0.4]];
		let b = compare_2d_distributions(&p, &q);
		assert!((0.0..=1.0).contains(&b));
	}

	#[test]
	fn test_3d_with_one_category() {
		// one phase, per-bin rows each normalized
		let p = vec![vec![vec![0.5, 0.5, 0.0], vec![0.2, 0.3, 0.5]]];
		let b = compare_3d_distributions(&p, &p);
		assert_relative_eq!(b, 1.0, epsilon = 1e-12);
	}

	#[test]
	fn test_normalize() {
		let mut v = vec![1.0, 3.0];
		normalize(&mut v);
		assert_eq!(v, vec![0.25, 0.75]);
		let mut z = vec![0.0, 0.0];
		normalize(&mut z);
		assert_eq!(z, vec![0.0, 0.0]);
	}
}
