//! Special functions and orientation math used by the packing kernel.

use std::f64::consts::PI;

use nalgebra::{Matrix3, Vector3};

const LANCZOS_G: f64 = 7.0;
#[allow(clippy::excessive_precision)]
const LANCZOS_COEF: [f64; 9] = [
	0.999_999_999_999_809_93,
	676.520_368_121_885_1,
	-1_259.139_216_722_402_8,
	771.323_428_777_653_13,
	-176.615_029_162_140_59,
	12.507_343_278_686_905,
	-0.138_571_095_265_720_12,
	9.984_369_578_019_571_6e-6,
	1.505_632_735_149_311_6e-7,
];

/// Complementary error function (Chebyshev fit, fractional error < 1.2e-7).
pub fn erfc(x: f64) -> f64 {
	let z = x.abs();
	let t = 1.0 / (1.0 + 0.5 * z);
	let poly = -z * z - 1.265_512_23
		+ t * (1.000_023_68
			+ t * (0.374_091_96
				+ t * (0.096_784_18
					+ t * (-0.186_288_06
						+ t * (0.278_868_07
							+ t * (-1.135_203_98
								+ t * (1.488_515_87 + t * (-0.822_152_23 + t * 0.170_872_77))))))));
	let ans = t * poly.exp();
	if x >= 0.0 { ans } else { 2.0 - ans }
}

/// Error function.
pub fn erf(x: f64) -> f64 {
	1.0 - erfc(x)
}

/// Gamma function (Lanczos approximation with reflection for x < 0.5).
pub fn gamma(x: f64) -> f64 {
	if x < 0.5 {
		return PI / ((PI * x).sin() * gamma(1.0 - x));
	}
	let x = x - 1.0;
	let t = x + LANCZOS_G + 0.5;
	let a = lanczos_sum(x);
	(2.0 * PI).sqrt() * t.powf(x + 0.5) * (-t).exp() * a
}

/// Natural log of |Gamma(x)|.
pub fn ln_gamma(x: f64) -> f64 {
	if x < 0.5 {
		return (PI / (PI * x).sin().abs()).ln() - ln_gamma(1.0 - x);
	}
	let x = x - 1.0;
	let t = x + LANCZOS_G + 0.5;
	0.5 * (2.0 * PI).ln() + (x + 0.5) * t.ln() - t + lanczos_sum(x).ln()
}

fn lanczos_sum(x: f64) -> f64 {
	let mut a = LANCZOS_COEF[0];
	for (i, &c) in LANCZOS_COEF.iter().enumerate().skip(1) {
		a += c / (x + i as f64);
	}
	a
}

/// Beta(a, b) probability density at `x`; zero outside [0, 1].
pub fn beta_pdf(x: f64, a: f64, b: f64) -> f64 {
	if !(0.0..=1.0).contains(&x) {
		return 0.0;
	}
	let norm = (ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b)).exp();
	norm * x.powf(a - 1.0) * (1.0 - x).powf(b - 1.0)
}

/// Bunge (ZXZ) orientation matrix for Euler angles (phi1, Phi, phi2).
pub fn orientation_matrix(euler: [f64; 3]) -> Matrix3<f64> {
	let (s1, c1) = euler[0].sin_cos();
	let (sp, cp) = euler[1].sin_cos();
	let (s2, c2) = euler[2].sin_cos();
	Matrix3::new(
		c1 * c2 - s1 * s2 * cp,
		s1 * c2 + c1 * s2 * cp,
		s2 * sp,
		-c1 * s2 - s1 * c2 * cp,
		-s1 * s2 + c1 * c2 * cp,
		c2 * sp,
		s1 * sp,
		-c1 * sp,
		cp,
	)
}

/// Rotate a sample-frame offset into the grain frame.
#[inline]
pub fn to_grain_frame(g: &Matrix3<f64>, offset: Vector3<f64>) -> Vector3<f64> {
	g.tr_mul(&offset)
}
