//! Augmented RBF system assembly and solve.
//!
//! For `N` correspondence pairs the system is
//!
//! ```text
//! | K   P | | W_rbf    |   | dst |
//! | Pᵀ  0 | | W_affine | = |  0  |
//! ```
//!
//! where `K[i,j] = φ(‖src_i − src_j‖)` and `P` has rows `[1, x, y, z]`.
//! The affine block lets the field reproduce translations and linear maps
//! exactly, and the `Pᵀ` rows keep the RBF part free of affine content.

use crate::field::distance_matrix;
use crate::{RbfKernel, RetargetError, RetargetResult};
use nalgebra::{DMatrix, Matrix3, Point3, Vector3};
use tracing::debug;

/// Number of affine rows (constant, x, y, z).
pub const AFFINE_TERMS: usize = 4;

/// Default relative tolerance for degenerate reference sets.
///
/// Two points closer than this fraction of the bounding-box diagonal
/// coincide. A set whose smallest principal variance is below this fraction
/// of the largest is flat.
pub const DEFAULT_DEGENERACY_TOLERANCE: f64 = 1e-9;

/// Default bound on the relative residual of an accepted solve.
pub const DEFAULT_RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Numerical acceptance thresholds for [`solve_weights_with`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveOptions {
    /// Relative tolerance for coincident or flat reference points.
    pub degeneracy_tolerance: f64,
    /// Reject solutions whose relative residual exceeds this.
    pub residual_tolerance: f64,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            degeneracy_tolerance: DEFAULT_DEGENERACY_TOLERANCE,
            residual_tolerance: DEFAULT_RESIDUAL_TOLERANCE,
        }
    }
}

/// Solved RBF weights, shape `(N+4)×3`.
///
/// Rows `0..N` are the RBF coefficients in source point order, followed by
/// the constant, x, y and z affine rows.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    weights: DMatrix<f64>,
}

impl WeightMatrix {
    /// Wraps an existing `(N+4)×3` matrix.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::WeightShapeMismatch`] if the matrix does not
    /// have three columns and at least [`AFFINE_TERMS`] rows.
    pub fn from_matrix(weights: DMatrix<f64>) -> RetargetResult<Self> {
        if weights.ncols() != 3 || weights.nrows() < AFFINE_TERMS {
            return Err(RetargetError::WeightShapeMismatch {
                expected: AFFINE_TERMS.max(weights.nrows()),
                found: weights.nrows(),
            });
        }
        Ok(Self { weights })
    }

    /// Number of reference points `N` the weights were fitted to.
    #[must_use]
    pub fn reference_count(&self) -> usize {
        self.weights.nrows() - AFFINE_TERMS
    }

    /// Total number of rows, `N + 4`.
    #[must_use]
    pub fn nrows(&self) -> usize {
        self.weights.nrows()
    }

    /// The full weight matrix.
    #[must_use]
    pub const fn as_matrix(&self) -> &DMatrix<f64> {
        &self.weights
    }

    /// RBF coefficients, shape `N×3`.
    #[must_use]
    pub fn rbf_block(&self) -> DMatrix<f64> {
        self.weights.rows(0, self.reference_count()).into_owned()
    }

    /// Affine coefficients, shape `4×3` (constant, x, y, z).
    #[must_use]
    pub fn affine_block(&self) -> DMatrix<f64> {
        self.weights
            .rows(self.reference_count(), AFFINE_TERMS)
            .into_owned()
    }

    /// Consumes the wrapper.
    #[must_use]
    pub fn into_inner(self) -> DMatrix<f64> {
        self.weights
    }

    pub(crate) fn check_reference_count(&self, reference: usize) -> RetargetResult<()> {
        if self.reference_count() == reference {
            Ok(())
        } else {
            Err(RetargetError::WeightShapeMismatch {
                expected: reference + AFFINE_TERMS,
                found: self.weights.nrows(),
            })
        }
    }
}

/// Builds the augmented `(N+4)×(N+4)` system matrix.
#[must_use]
pub fn system_matrix(src: &[Point3<f64>], kernel: RbfKernel, radius: f64) -> DMatrix<f64> {
    let n = src.len();
    let size = n + AFFINE_TERMS;
    let mut a = DMatrix::<f64>::zeros(size, size);

    a.view_mut((0, 0), (n, n))
        .copy_from(&distance_matrix(src, src, kernel, radius));

    for (i, p) in src.iter().enumerate() {
        let row = [1.0, p.x, p.y, p.z];
        for (k, value) in row.into_iter().enumerate() {
            a[(i, n + k)] = value;
            a[(n + k, i)] = value;
        }
    }

    a
}

/// Builds the `(N+4)×3` right-hand side.
#[must_use]
pub fn rhs_matrix(dst: &[Point3<f64>]) -> DMatrix<f64> {
    let n = dst.len();
    DMatrix::from_fn(n + AFFINE_TERMS, 3, |i, j| {
        if i < n { dst[i][j] } else { 0.0 }
    })
}

/// Solves for the weights mapping `src` onto `dst` with default tolerances.
///
/// `radius` is the effective radius, already multiplied by the kernel's
/// [`scale`](RbfKernel::scale).
///
/// # Errors
///
/// See [`solve_weights_with`].
///
/// # Examples
///
/// ```
/// use mesh_retarget::{solve_weights, RbfKernel};
/// use nalgebra::Point3;
///
/// let src = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
/// ];
/// let dst: Vec<_> = src.iter().map(|p| p * 2.0).collect();
///
/// let weights = solve_weights(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
/// assert_eq!(weights.nrows(), 8);
/// ```
pub fn solve_weights(
    src: &[Point3<f64>],
    dst: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
) -> RetargetResult<WeightMatrix> {
    solve_weights_with(src, dst, kernel, radius, &SolveOptions::default())
}

/// Solves for the weights mapping `src` onto `dst`.
///
/// Uses LU with partial pivoting. The system is rejected as singular when
/// fewer than four points are given (the affine block cannot be
/// determined), when two points coincide or all points lie in one plane
/// (see [`SolveOptions::degeneracy_tolerance`]), when the factorization has
/// a zero pivot, when the solution is not finite, or when its relative
/// residual exceeds [`SolveOptions::residual_tolerance`].
///
/// The pivot ratio of `U` is logged but not checked: dense, well-separated
/// sets give tiny ratios with the smooth kernels and still solve accurately.
///
/// # Errors
///
/// - [`RetargetError::PointCountMismatch`] if `src` and `dst` differ in length
/// - [`RetargetError::EmptySource`] if both are empty
/// - [`RetargetError::InvalidParameter`] if the radius is unusable for the kernel
/// - [`RetargetError::SingularSystem`] if no finite, accurate solution exists
pub fn solve_weights_with(
    src: &[Point3<f64>],
    dst: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
    options: &SolveOptions,
) -> RetargetResult<WeightMatrix> {
    if src.len() != dst.len() {
        return Err(RetargetError::PointCountMismatch {
            source_points: src.len(),
            destination_points: dst.len(),
        });
    }
    if src.is_empty() {
        return Err(RetargetError::EmptySource);
    }
    kernel.validate_radius(radius)?;

    let n = src.len();
    if n < AFFINE_TERMS {
        return Err(RetargetError::SingularSystem(format!(
            "{n} correspondence points cannot determine the affine term, \
             at least {AFFINE_TERMS} are needed"
        )));
    }

    check_spread(src, options.degeneracy_tolerance)?;

    let a = system_matrix(src, kernel, radius);
    let b = rhs_matrix(dst);

    let lu = a.clone().lu();
    let ratio = pivot_ratio(&lu.u());
    debug!(
        size = n + AFFINE_TERMS,
        kernel = %kernel,
        radius,
        pivot_ratio = ratio,
        "Factorized RBF system"
    );
    if !lu.is_invertible() {
        return Err(RetargetError::SingularSystem(
            "system matrix has a zero pivot".to_string(),
        ));
    }

    let w = lu
        .solve(&b)
        .ok_or_else(|| RetargetError::SingularSystem("LU solve failed".to_string()))?;
    if w.iter().any(|v| !v.is_finite()) {
        return Err(RetargetError::SingularSystem(
            "solution contains non-finite weights".to_string(),
        ));
    }

    let residual = relative_residual(&a, &w, &b);
    debug!(residual, "Solved RBF weights");
    if !residual.is_finite() || residual > options.residual_tolerance {
        return Err(RetargetError::SingularSystem(format!(
            "system is ill-conditioned (relative residual {residual:.3e})"
        )));
    }

    Ok(WeightMatrix { weights: w })
}

/// Rejects reference sets that make the augmented system singular for every
/// kernel: two coincident points, or points without a full 3D spread.
fn check_spread(src: &[Point3<f64>], tolerance: f64) -> RetargetResult<()> {
    let (lo, hi) = src.iter().fold(
        (
            Vector3::repeat(f64::INFINITY),
            Vector3::repeat(f64::NEG_INFINITY),
        ),
        |(lo, hi), p| (lo.inf(&p.coords), hi.sup(&p.coords)),
    );
    let min_gap = tolerance * (hi - lo).norm();

    for (i, p) in src.iter().enumerate() {
        for (j, q) in src.iter().enumerate().skip(i + 1) {
            if nalgebra::distance(p, q) <= min_gap {
                return Err(RetargetError::SingularSystem(format!(
                    "correspondence points {i} and {j} coincide"
                )));
            }
        }
    }

    let count = src.len() as f64;
    let centroid = src.iter().map(|p| p.coords).sum::<Vector3<f64>>() / count;
    let covariance = src.iter().fold(Matrix3::<f64>::zeros(), |acc, p| {
        let d = p.coords - centroid;
        acc + d * d.transpose()
    }) / count;

    let variances = covariance.symmetric_eigenvalues();
    let (smallest, largest) = (variances.min(), variances.max());
    if largest <= 0.0 || smallest <= tolerance * largest {
        return Err(RetargetError::SingularSystem(
            "correspondence points are coplanar or collinear".to_string(),
        ));
    }
    Ok(())
}

/// `min |U_ii| / max |U_ii|`, zero for an all-zero diagonal.
fn pivot_ratio(u: &DMatrix<f64>) -> f64 {
    let diag = u.diagonal();
    let (min, max) = diag
        .iter()
        .map(|v| v.abs())
        .fold((f64::INFINITY, 0.0_f64), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if max > 0.0 { min / max } else { 0.0 }
}

/// `‖A·W − B‖ / (‖A‖·‖W‖ + ‖B‖)` in the Frobenius norm.
fn relative_residual(a: &DMatrix<f64>, w: &DMatrix<f64>, b: &DMatrix<f64>) -> f64 {
    let scale = a.norm().mul_add(w.norm(), b.norm());
    if scale > 0.0 {
        (a * w - b).norm() / scale
    } else {
        0.0
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
    use nalgebra::Vector3;

    fn tetrahedron() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.6, 0.7, 0.8),
        ]
    }

    #[test]
    fn test_system_matrix_layout() {
        let src = tetrahedron();
        let a = system_matrix(&src, RbfKernel::Linear, 0.0);
        let n = src.len();

        assert_eq!(a.shape(), (n + 4, n + 4));
        assert_relative_eq!(a[(0, 1)], 1.0);
        assert_relative_eq!(a[(1, 2)], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(a[(4, n)], 1.0);
        assert_eq!(a[(4, n + 1)], 0.6);
        assert_eq!(a[(n + 3, 4)], 0.8);
        for i in n..n + 4 {
            for j in n..n + 4 {
                assert_eq!(a[(i, j)], 0.0);
            }
        }
        assert_relative_eq!(a.clone(), a.transpose());
    }

    #[test]
    fn test_rhs_matrix_layout() {
        let dst = tetrahedron();
        let b = rhs_matrix(&dst);
        assert_eq!(b.shape(), (9, 3));
        assert_eq!(b[(4, 2)], 0.8);
        assert_eq!(b.rows(5, 4).norm(), 0.0);
    }

    #[test]
    fn test_translation_is_pure_affine() {
        let src = tetrahedron();
        let offset = Vector3::new(1.0, -2.0, 0.5);
        let dst: Vec<_> = src.iter().map(|p| p + offset).collect();

        let w = solve_weights(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
        assert_eq!(w.reference_count(), 5);
        assert!(w.rbf_block().norm() < 1e-8);

        let affine = w.affine_block();
        assert_relative_eq!(affine[(0, 0)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(affine[(0, 1)], -2.0, epsilon = 1e-8);
        assert_relative_eq!(affine[(1, 0)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(affine[(2, 1)], 1.0, epsilon = 1e-8);
        assert_relative_eq!(affine[(3, 2)], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_empty_source() {
        let result = solve_weights(&[], &[], RbfKernel::Biharmonic, 0.5);
        assert_eq!(result.unwrap_err(), RetargetError::EmptySource);
    }

    #[test]
    fn test_point_count_mismatch() {
        let src = tetrahedron();
        let result = solve_weights(&src, &src[..3], RbfKernel::Biharmonic, 0.5);
        assert_eq!(
            result.unwrap_err(),
            RetargetError::PointCountMismatch {
                source_points: 5,
                destination_points: 3
            }
        );
    }

    #[test]
    fn test_collapsed_points_are_singular() {
        let p = Point3::new(0.3, 0.3, 0.3);
        let src = vec![p, p, p];
        let result = solve_weights(&src, &src, RbfKernel::Biharmonic, 0.5);
        assert!(matches!(result, Err(RetargetError::SingularSystem(_))));
    }

    #[test]
    fn test_duplicate_points_are_singular() {
        let mut src = tetrahedron();
        src.push(src[1]);
        let result = solve_weights(&src, &src, RbfKernel::Biharmonic, 0.5);
        assert!(matches!(result, Err(RetargetError::SingularSystem(_))));
    }

    #[test]
    fn test_coplanar_points_are_singular() {
        let src: Vec<_> = (0..6)
            .map(|i| {
                let t = f64::from(i);
                Point3::new(t.cos(), t.sin(), 0.0)
            })
            .collect();
        let result = solve_weights(&src, &src, RbfKernel::Biharmonic, 0.5);
        assert!(matches!(result, Err(RetargetError::SingularSystem(_))));
    }

    #[test]
    fn test_near_duplicate_points_are_singular() {
        let mut src = tetrahedron();
        src.push(src[2] + Vector3::new(1e-12, 0.0, -1e-12));
        match solve_weights(&src, &src, RbfKernel::Gaussian, 0.5) {
            Err(RetargetError::SingularSystem(message)) => {
                assert!(message.contains("2 and 5"), "{message}");
            }
            other => panic!("expected a singular system, got {other:?}"),
        }
    }

    #[test]
    fn test_tilted_plane_is_singular() {
        let src: Vec<_> = (0..8)
            .map(|i| {
                let t = f64::from(i);
                let (x, y) = (t.cos(), 0.5 * t.sin());
                Point3::new(x, y, 0.3 * x - 2.0 * y + 1.0)
            })
            .collect();
        for kernel in RbfKernel::ALL {
            let result = solve_weights(&src, &src, kernel, 0.5);
            assert!(
                matches!(result, Err(RetargetError::SingularSystem(_))),
                "{kernel}: {result:?}"
            );
        }
    }

    #[test]
    fn test_collinear_points_are_singular() {
        let src: Vec<_> = (0..6)
            .map(|i| Point3::new(f64::from(i), 2.0 * f64::from(i), -1.0))
            .collect();
        let result = solve_weights(&src, &src, RbfKernel::ThinPlate, 0.5);
        assert!(matches!(result, Err(RetargetError::SingularSystem(_))));
    }

    #[test]
    fn test_tiny_pivots_still_solve() {
        // Gaussian on a fine grid with a wide radius: numerically rank-poor
        // but well posed.
        let src: Vec<_> = (0..125)
            .map(|i| {
                let [x, y, z] = [i % 5, (i / 5) % 5, i / 25].map(|c| 0.2 * f64::from(c));
                Point3::new(x, y, z)
            })
            .collect();
        let dst: Vec<_> = src
            .iter()
            .map(|p| {
                let taper = 0.1f64.mul_add(p.z, 1.0);
                Point3::new(p.x * taper, p.y * taper, 1.05f64.mul_add(p.z, 0.02))
            })
            .collect();

        let ratio = pivot_ratio(&system_matrix(&src, RbfKernel::Gaussian, 2.0).lu().u());
        assert!(ratio < 1e-12, "pivot ratio {ratio:e}");

        let w = solve_weights(&src, &dst, RbfKernel::Gaussian, 2.0).unwrap();
        let a = system_matrix(&src, RbfKernel::Gaussian, 2.0);
        let fitted = a.rows(0, src.len()) * w.as_matrix();
        for (i, q) in dst.iter().enumerate() {
            for j in 0..3 {
                assert_relative_eq!(fitted[(i, j)], q[j], epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_invalid_radius() {
        let src = tetrahedron();
        let result = solve_weights(&src, &src, RbfKernel::Gaussian, 0.0);
        assert!(matches!(result, Err(RetargetError::InvalidParameter(_))));
    }

    #[test]
    fn test_weight_matrix_from_matrix() {
        assert!(WeightMatrix::from_matrix(DMatrix::zeros(6, 3)).is_ok());
        assert!(WeightMatrix::from_matrix(DMatrix::zeros(3, 3)).is_err());
        assert!(WeightMatrix::from_matrix(DMatrix::zeros(6, 2)).is_err());

        let w = WeightMatrix::from_matrix(DMatrix::zeros(6, 3)).unwrap();
        assert!(w.check_reference_count(2).is_ok());
        assert_eq!(
            w.check_reference_count(3).unwrap_err(),
            RetargetError::WeightShapeMismatch {
                expected: 7,
                found: 6
            }
        );
    }
}
