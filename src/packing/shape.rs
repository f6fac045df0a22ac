//! Grain shape primitives.
//!
//! A phase names a [`ShapeKind`]; each grain resolves it against its own
//! omega3 into a [`Shape`], which answers the two questions packing asks:
//! how large is the primary semi-axis for a target volume (`radcur1`), and is a
//! point given in normalized grain-frame coordinates inside (`inside >= 0`).

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::packing::math::{gamma, ln_gamma};

/// Shape class configured per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
	#[default]
	Ellipsoid,
	SuperEllipsoid,
	CubeOctahedron,
	Cylinder,
}

/// Capability the packing kernel needs from a shape.
pub trait ShapeOps {
	/// Primary semi-axis giving `volume` at the given aspect ratios.
	fn radcur1(&self, volume: f64, b_over_a: f64, c_over_a: f64) -> f64;

	/// Inside test on grain-frame coordinates normalized by the three semi-axes.
	/// Non-negative means inside.
	fn inside(&self, a: f64, b: f64, c: f64) -> f64;

	/// Farthest normalized distance the shape reaches from its center.
	fn reach(&self) -> f64 {
		1.0
	}
}

/// A shape class resolved against one grain's omega3.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
	Ellipsoid,
	/// |a|^n + |b|^n + |c|^n <= 1
	SuperEllipsoid { n: f64 },
	/// Cube truncated at its corners by |a| + |b| + |c| <= 3 - g
	CubeOctahedron { g: f64 },
	/// Elliptic cross-section in (a, b), half-length 1 along c
	Cylinder,
}

const MIN_SUPER_EXPONENT: f64 = 2.0;
const MAX_SUPER_EXPONENT: f64 = 64.0;

impl ShapeKind {
	pub fn resolve(self, omega3: f64) -> Shape {
		match self {
			ShapeKind::Ellipsoid => Shape::Ellipsoid,
			ShapeKind::SuperEllipsoid => Shape::SuperEllipsoid { n: superellipsoid_exponent(omega3) },
			ShapeKind::CubeOctahedron => Shape::CubeOctahedron { g: omega3.clamp(0.0, 2.0) },
			ShapeKind::Cylinder => Shape::Cylinder,
		}
	}
}

impl ShapeOps for Shape {
	fn radcur1(&self, volume: f64, b_over_a: f64, c_over_a: f64) -> f64 {
		let aspect = b_over_a * c_over_a;
		let cubed = match *self {
			Shape::Ellipsoid => volume * 3.0 / (4.0 * PI * aspect),
			Shape::SuperEllipsoid { n } => {
				let unit = 8.0 * gamma(1.0 + 1.0 / n).powi(3) / gamma(1.0 + 3.0 / n);
				volume / (unit * aspect)
			}
			Shape::CubeOctahedron { g } => {
				let truncated = if g <= 1.0 {
					6.0 - g * g * g
				} else {
					3.0 + 9.0 * g - 9.0 * g * g + 2.0 * g * g * g
				};
				6.0 * volume / (8.0 * truncated * aspect)
			}
			Shape::Cylinder => volume / (2.0 * PI * aspect),
		};
		cubed.cbrt()
	}

	fn inside(&self, a: f64, b: f64, c: f64) -> f64 {
		let (a, b, c) = (a.abs(), b.abs(), c.abs());
		match *self {
			Shape::Ellipsoid => 1.0 - a * a - b * b - c * c,
			Shape::SuperEllipsoid { n } => 1.0 - a.powf(n) - b.powf(n) - c.powf(n),
			Shape::CubeOctahedron { g } => {
				let box_margin = 1.0 - a.max(b).max(c);
				let corner_margin = (3.0 - g) - (a + b + c);
				box_margin.min(corner_margin)
			}
			Shape::Cylinder => (1.0 - a * a - b * b).min(1.0 - c),
		}
	}

	fn reach(&self) -> f64 {
		match self {
			Shape::Ellipsoid => 1.0,
			_ => 3.0_f64.sqrt(),
		}
	}
}

/// Omega3 moment invariant of the unit superellipsoid with exponent `n`.
/// Equals 1 for n = 2 and falls toward the cube's 0.788 as n grows.
pub fn superellipsoid_omega3(n: f64) -> f64 {
	let ln_vol = 8.0_f64.ln() + 3.0 * ln_gamma(1.0 / n) - 3.0 * n.ln() - ln_gamma(1.0 + 3.0 / n);
	let ln_moment = 8.0_f64.ln() + ln_gamma(3.0 / n) + 2.0 * ln_gamma(1.0 / n)
		- 3.0 * n.ln()
		- ln_gamma(1.0 + 5.0 / n);
	let ln_norm = 3.0 * (4.0 * PI / 15.0).ln() - 5.0 * (4.0 * PI / 3.0).ln();
	(ln_norm + 5.0 * ln_vol - 3.0 * ln_moment).exp()
}

/// Invert [`superellipsoid_omega3`] by bisection over n in [2, 64].
pub fn superellipsoid_exponent(omega3: f64) -> f64 {
	if !omega3.is_finite() || omega3 >= 1.0 {
		return MIN_SUPER_EXPONENT;
	}
	if omega3 <= superellipsoid_omega3(MAX_SUPER_EXPONENT) {
		return MAX_SUPER_EXPONENT;
	}
	let (mut lo, mut hi) = (MIN_SUPER_EXPONENT, MAX_SUPER_EXPONENT);
	for _ in 0..60 {
		let mid = 0.5 * (lo + hi);
		if superellipsoid_omega3(mid) > omega3 {
			lo = mid;
		} else {
			hi = mid;
		}
	}
	0.5 * (lo + hi)
}
