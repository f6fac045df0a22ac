//! Axis orientation capability.
//!
//! The axis ODF is a 36 x 36 x 36 table over Euler space. Packing only needs
//! to turn a sampled bin back into angles; how a crystal symmetry partitions
//! its fundamental zone is this module's business.

use std::f64::consts::FRAC_PI_2;

/// Bins per Euler axis in an axis ODF table.
pub const ODF_BINS_PER_AXIS: usize = 36;
/// Total entries in an axis ODF table.
pub const ODF_SIZE: usize = ODF_BINS_PER_AXIS * ODF_BINS_PER_AXIS * ODF_BINS_PER_AXIS;

/// Maps an ODF bin index to Euler angles (phi1, Phi, phi2) in radians.
pub trait OrientationOps: Send + Sync {
	fn determine_euler_angles(&self, bin: usize) -> [f64; 3];
}

/// Orthorhombic (mmm) symmetry: each Euler angle spans [0, pi/2).
#[derive(Debug, Clone, Copy, Default)]
pub struct OrthoRhombicOps;

impl OrthoRhombicOps {
	const STEP: f64 = FRAC_PI_2 / ODF_BINS_PER_AXIS as f64;
}

impl OrientationOps for OrthoRhombicOps {
	fn determine_euler_angles(&self, bin: usize) -> [f64; 3] {
		let bin = bin.min(ODF_SIZE - 1);
		let i = bin % ODF_BINS_PER_AXIS;
		let j = (bin / ODF_BINS_PER_AXIS) % ODF_BINS_PER_AXIS;
		let k = bin / (ODF_BINS_PER_AXIS * ODF_BINS_PER_AXIS);
		// bin centers
		[
			(i as f64 + 0.5) * Self::STEP,
			(j as f64 + 0.5) * Self::STEP,
			(k as f64 + 0.5) * Self::STEP,
		]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use approx::assert_relative_eq;

	#[test]
	fn test_first_and_last_bins() {
		let ops = OrthoRhombicOps;
		let first = ops.determine_euler_angles(0);
		let half = OrthoRhombicOps::STEP / 2.0;
		assert_relative_eq!(first[0], half);
		assert_relative_eq!(first[1], half);
		assert_relative_eq!(first[2], half);

		let last = ops.determine_euler_angles(ODF_SIZE - 1);
		for angle in last {
			assert_relative_eq!(angle, FRAC_PI_2 - half, epsilon = 1e-12);
		}
	}

	#[test]
	fn test_bin_axes_are_independent() {
		let ops = OrthoRhombicOps;
		let a = ops.determine_euler_angles(1);
		let b = ops.determine_euler_angles(ODF_BINS_PER_AXIS);
		let c = ops.determine_euler_angles(ODF_BINS_PER_AXIS * ODF_BINS_PER_AXIS);
		assert!(a[0] > b[0] && b[1] > a[1] && c[2] > a[2]);
	}

	#[test]
	fn test_out_of_range_bin_is_clamped() {
		let ops = OrthoRhombicOps;
		assert_eq!(ops.determine_euler_angles(ODF_SIZE + 10), ops.determine_euler_angles(ODF_SIZE - 1));
	}
}
