//! Radial basis function kernels.
//!
//! Every kernel is a pure function `φ(r, c)` of a distance `r` and a radius
//! `c`. The user-facing radius is multiplied by the kernel's [`scale`]
//! before evaluation so that the same radius value behaves comparably
//! across kernels.
//!
//! # Supported Kernels
//!
//! - **Linear**: `r`
//! - **Gaussian**: `exp(-(r/c)²)`
//! - **Thin Plate**: `r² ln r`
//! - **Biharmonic**: `√(r² + c²)`, the default, least prone to overshoot
//! - **Inverse Biharmonic**: `1/√(r² + c²)`
//! - **C2**: Wendland compact support, `(1 - r/c)⁴ (4r/c + 1)` inside `c`
//!
//! [`scale`]: RbfKernel::scale

use crate::{RetargetError, RetargetResult};
use nalgebra::DMatrix;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Radius used when none is given.
pub const DEFAULT_RADIUS: f64 = 0.5;

/// RBF kernel function type.
///
/// # Examples
///
/// ```
/// use mesh_retarget::RbfKernel;
///
/// let kernel: RbfKernel = "PLATE".parse().unwrap();
/// assert_eq!(kernel, RbfKernel::ThinPlate);
/// assert_eq!(kernel.to_string(), "PLATE");
///
/// // Biharmonic at r = 0 equals the radius
/// assert!((RbfKernel::Biharmonic.evaluate(0.0, 0.5) - 0.5).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "SCREAMING_SNAKE_CASE"))]
pub enum RbfKernel {
    /// Linear: r
    Linear,

    /// Gaussian: exp(-(r/c)²)
    Gaussian,

    /// Thin plate: r² ln(r), zero at r = 0
    #[cfg_attr(feature = "serde", serde(rename = "PLATE"))]
    ThinPlate,

    /// Multiquadric biharmonic: √(r² + c²)
    #[default]
    Biharmonic,

    /// Inverse multiquadric biharmonic: 1/√(r² + c²)
    #[cfg_attr(feature = "serde", serde(rename = "INV_BIHARMONIC"))]
    InverseBiharmonic,

    /// Beckert-Wendland C2: (1 - r/c)⁴ (4r/c + 1) for r < c, else 0
    C2,
}

impl RbfKernel {
    /// Every kernel, in catalogue order.
    pub const ALL: [Self; 6] = [
        Self::Linear,
        Self::Gaussian,
        Self::ThinPlate,
        Self::Biharmonic,
        Self::InverseBiharmonic,
        Self::C2,
    ];

    /// Host identifier of the kernel.
    #[must_use]
    pub const fn identifier(self) -> &'static str {
        match self {
            Self::Linear => "LINEAR",
            Self::Gaussian => "GAUSSIAN",
            Self::ThinPlate => "PLATE",
            Self::Biharmonic => "BIHARMONIC",
            Self::InverseBiharmonic => "INV_BIHARMONIC",
            Self::C2 => "C2",
        }
    }

    /// Multiplier applied to the user radius before evaluation.
    ///
    /// C2 has compact support, so its radius is doubled to reach roughly
    /// as far as the other kernels.
    #[must_use]
    pub const fn scale(self) -> f64 {
        match self {
            Self::C2 => 2.0,
            _ => 1.0,
        }
    }

    /// The radius actually passed to [`evaluate`](Self::evaluate).
    #[must_use]
    pub fn effective_radius(self, radius: f64) -> f64 {
        radius * self.scale()
    }

    /// Whether the kernel divides by its radius and needs `c > 0`.
    #[must_use]
    pub const fn requires_positive_radius(self) -> bool {
        matches!(self, Self::Gaussian | Self::InverseBiharmonic | Self::C2)
    }

    /// Checks that `radius` can be used with this kernel.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::InvalidParameter`] if the radius is not
    /// finite, negative, or zero for a kernel that divides by it.
    pub fn validate_radius(self, radius: f64) -> RetargetResult<()> {
        if !radius.is_finite() || radius < 0.0 {
            return Err(RetargetError::InvalidParameter(format!(
                "radius must be a finite non-negative number, got {radius}"
            )));
        }
        if radius == 0.0 && self.requires_positive_radius() {
            return Err(RetargetError::InvalidParameter(format!(
                "{self} requires a positive radius"
            )));
        }
        Ok(())
    }

    /// Evaluates the kernel at distance `r` with (already scaled) radius `c`.
    ///
    /// # Examples
    ///
    /// ```
    /// use mesh_retarget::RbfKernel;
    ///
    /// let kernel = RbfKernel::Gaussian;
    /// assert!((kernel.evaluate(0.0, 1.0) - 1.0).abs() < 1e-12);
    /// assert!((kernel.evaluate(1.0, 1.0) - (-1.0_f64).exp()).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn evaluate(self, r: f64, c: f64) -> f64 {
        match self {
            Self::Linear => r,
            Self::Gaussian => {
                let q = r / c;
                (-q * q).exp()
            }
            Self::ThinPlate => {
                if r <= 0.0 {
                    0.0
                } else {
                    r * r * r.ln()
                }
            }
            Self::Biharmonic => r.hypot(c),
            Self::InverseBiharmonic => 1.0 / r.hypot(c),
            Self::C2 => {
                if r >= c {
                    0.0
                } else {
                    let q = r / c;
                    (1.0 - q).powi(4) * 4.0f64.mul_add(q, 1.0)
                }
            }
        }
    }

    /// Evaluates the kernel over every entry of a distance matrix in place.
    pub fn apply(self, distances: &mut DMatrix<f64>, c: f64) {
        distances.apply(|r| *r = self.evaluate(*r, c));
    }
}

impl fmt::Display for RbfKernel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for RbfKernel {
    type Err = RetargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.identifier().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RetargetError::InvalidParameter(format!("unknown kernel '{s}'")))
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::float_cmp,
    clippy::needless_range_loop
)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_linear_kernel() {
        assert_relative_eq!(RbfKernel::Linear.evaluate(2.5, 0.5), 2.5);
        assert_relative_eq!(RbfKernel::Linear.evaluate(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_gaussian_kernel_decay() {
        let k = RbfKernel::Gaussian;
        assert_relative_eq!(k.evaluate(0.0, 0.5), 1.0, epsilon = 1e-12);
        assert_relative_eq!(k.evaluate(0.5, 0.5), (-1.0_f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(k.evaluate(1.0, 0.5), (-4.0_f64).exp(), epsilon = 1e-12);
    }

    #[test]
    fn test_thin_plate_kernel() {
        let k = RbfKernel::ThinPlate;
        assert_eq!(k.evaluate(0.0, 0.5), 0.0);
        assert_relative_eq!(k.evaluate(1.0, 0.5), 0.0, epsilon = 1e-12);
        let r: f64 = 2.0;
        assert_relative_eq!(k.evaluate(r, 0.5), r * r * r.ln(), epsilon = 1e-12);
        assert!(k.evaluate(0.5, 0.5) < 0.0);
    }

    #[test]
    fn test_biharmonic_kernels() {
        assert_relative_eq!(RbfKernel::Biharmonic.evaluate(0.0, 0.5), 0.5, epsilon = 1e-12);
        assert_relative_eq!(
            RbfKernel::Biharmonic.evaluate(1.0, 1.0),
            2.0_f64.sqrt(),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            RbfKernel::InverseBiharmonic.evaluate(0.0, 0.5),
            2.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(
            RbfKernel::InverseBiharmonic.evaluate(1.0, 1.0),
            1.0 / 2.0_f64.sqrt(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_c2_compact_support() {
        let k = RbfKernel::C2;
        assert_relative_eq!(k.evaluate(0.0, 1.0), 1.0, epsilon = 1e-12);
        // q = 0.5: 0.5^4 * 3
        assert_relative_eq!(k.evaluate(0.5, 1.0), 0.1875, epsilon = 1e-12);
        assert_eq!(k.evaluate(1.0, 1.0), 0.0);
        assert_eq!(k.evaluate(3.0, 1.0), 0.0);
    }

    #[test]
    fn test_scale_and_effective_radius() {
        for k in RbfKernel::ALL {
            let expected = if k == RbfKernel::C2 { 2.0 } else { 1.0 };
            assert_eq!(k.scale(), expected);
        }
        assert_relative_eq!(RbfKernel::C2.effective_radius(0.5), 1.0);
        assert_relative_eq!(RbfKernel::Biharmonic.effective_radius(0.5), 0.5);
    }

    #[test]
    fn test_default_kernel() {
        assert_eq!(RbfKernel::default(), RbfKernel::Biharmonic);
        assert_relative_eq!(DEFAULT_RADIUS, 0.5);
    }

    #[test]
    fn test_identifier_roundtrip() {
        for k in RbfKernel::ALL {
            assert_eq!(k.to_string().parse::<RbfKernel>().unwrap(), k);
        }
        assert_eq!("inv_biharmonic".parse::<RbfKernel>().unwrap(), RbfKernel::InverseBiharmonic);
        assert!(matches!(
            "CUBIC".parse::<RbfKernel>(),
            Err(RetargetError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_validate_radius() {
        assert!(RbfKernel::Biharmonic.validate_radius(0.0).is_ok());
        assert!(RbfKernel::Linear.validate_radius(0.0).is_ok());
        assert!(RbfKernel::ThinPlate.validate_radius(0.0).is_ok());
        assert!(RbfKernel::Gaussian.validate_radius(0.0).is_err());
        assert!(RbfKernel::InverseBiharmonic.validate_radius(0.0).is_err());
        assert!(RbfKernel::C2.validate_radius(0.0).is_err());
        assert!(RbfKernel::Biharmonic.validate_radius(-1.0).is_err());
        assert!(RbfKernel::Biharmonic.validate_radius(f64::NAN).is_err());
        assert!(RbfKernel::Gaussian.validate_radius(0.25).is_ok());
    }

    #[test]
    fn test_apply_over_matrix() {
        let mut d = DMatrix::from_row_slice(2, 2, &[0.0, 1.0, 1.0, 0.0]);
        RbfKernel::Biharmonic.apply(&mut d, 1.0);
        assert_relative_eq!(d[(0, 0)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(d[(0, 1)], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(d[(1, 0)], 2.0_f64.sqrt(), epsilon = 1e-12);
    }
}
