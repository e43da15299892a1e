//! Deformation field evaluation.
//!
//! Once weights are solved, any point `q` maps to
//!
//! ```text
//! f(q) = Σ_j W_j φ(‖q − src_j‖) + W_c + W_x q.x + W_y q.y + W_z q.z
//! ```
//!
//! which for a batch of `M` query points is the product `[D | Q] · W` of the
//! `M×N` kernel-evaluated distance matrix `D`, the `M×4` affine block `Q`,
//! and the weights. The product is built in row blocks so transient memory
//! stays at `chunk_rows × (N+4)` regardless of `M`.

use crate::solve::{AFFINE_TERMS, SolveOptions, WeightMatrix, solve_weights_with};
use crate::{RbfKernel, RetargetError, RetargetResult};
use nalgebra::{DMatrix, Point3, Vector3};

/// Default number of query rows evaluated per block.
pub const DEFAULT_EVAL_CHUNK_ROWS: usize = 4096;

/// Kernel-evaluated distances between `query` (rows) and `reference`
/// (columns), shape `M×N`.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{distance_matrix, RbfKernel};
/// use nalgebra::Point3;
///
/// let a = [Point3::new(0.0, 0.0, 0.0)];
/// let b = [Point3::new(3.0, 4.0, 0.0), Point3::new(0.0, 0.0, 1.0)];
///
/// let d = distance_matrix(&a, &b, RbfKernel::Linear, 0.0);
/// assert_eq!(d.shape(), (1, 2));
/// assert!((d[(0, 0)] - 5.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn distance_matrix(
    query: &[Point3<f64>],
    reference: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
) -> DMatrix<f64> {
    DMatrix::from_fn(query.len(), reference.len(), |i, j| {
        kernel.evaluate((query[i] - reference[j]).norm(), radius)
    })
}

/// Evaluates a fitted field at `query` points.
///
/// `src` and `radius` must be the reference points and effective radius
/// the weights were solved with.
///
/// # Errors
///
/// Returns [`RetargetError::WeightShapeMismatch`] if `weights` was not
/// solved for `src.len()` points.
pub fn evaluate(
    query: &[Point3<f64>],
    src: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
    weights: &WeightMatrix,
) -> RetargetResult<Vec<Point3<f64>>> {
    evaluate_chunked(query, src, kernel, radius, weights, DEFAULT_EVAL_CHUNK_ROWS)
}

/// Like [`evaluate`], with an explicit row block size.
///
/// # Errors
///
/// - [`RetargetError::WeightShapeMismatch`] if `weights` does not match `src`
/// - [`RetargetError::InvalidParameter`] if `chunk_rows` is zero
pub fn evaluate_chunked(
    query: &[Point3<f64>],
    src: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
    weights: &WeightMatrix,
    chunk_rows: usize,
) -> RetargetResult<Vec<Point3<f64>>> {
    weights.check_reference_count(src.len())?;
    if chunk_rows == 0 {
        return Err(RetargetError::InvalidParameter(
            "evaluation chunk size must be at least 1".to_string(),
        ));
    }
    Ok(evaluate_unchecked(query, src, kernel, radius, weights, chunk_rows))
}

fn evaluate_unchecked(
    query: &[Point3<f64>],
    src: &[Point3<f64>],
    kernel: RbfKernel,
    radius: f64,
    weights: &WeightMatrix,
    chunk_rows: usize,
) -> Vec<Point3<f64>> {
    let n = src.len();
    let w = weights.as_matrix();
    let mut out = Vec::with_capacity(query.len());

    for chunk in query.chunks(chunk_rows) {
        let h = DMatrix::from_fn(chunk.len(), n + AFFINE_TERMS, |i, j| {
            let q = &chunk[i];
            match j.checked_sub(n) {
                None => kernel.evaluate((q - src[j]).norm(), radius),
                Some(0) => 1.0,
                Some(k) => q[k - 1],
            }
        });
        let block = h * w;
        out.extend(
            block
                .row_iter()
                .map(|r| Point3::new(r[0], r[1], r[2])),
        );
    }

    out
}

/// A fitted deformation field, reusable across many query sets.
///
/// Bundles the reference (source) points, kernel, effective radius and
/// solved weights so callers cannot mix them up between solve and
/// evaluation.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{RbfField, RbfKernel};
/// use nalgebra::Point3;
///
/// let src = vec![
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(-1.0, 0.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.0, -1.0, 0.0),
///     Point3::new(0.0, 0.0, 1.0),
///     Point3::new(0.0, 0.0, -1.0),
/// ];
/// let dst: Vec<_> = src.iter().map(|p| p * 1.1).collect();
///
/// let field = RbfField::fit(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
/// let centroid = field.transform_point(&Point3::origin());
/// assert!(centroid.coords.norm() < 1e-6);
/// ```
#[derive(Debug, Clone)]
pub struct RbfField {
    reference: Vec<Point3<f64>>,
    kernel: RbfKernel,
    radius: f64,
    weights: WeightMatrix,
}

impl RbfField {
    /// Fits a field mapping `src` onto `dst` with default solver tolerances.
    ///
    /// `radius` is the user-facing radius; the kernel's scale is applied.
    ///
    /// # Errors
    ///
    /// See [`solve_weights_with`].
    pub fn fit(
        src: &[Point3<f64>],
        dst: &[Point3<f64>],
        kernel: RbfKernel,
        radius: f64,
    ) -> RetargetResult<Self> {
        Self::fit_with(src, dst, kernel, radius, &SolveOptions::default())
    }

    /// Fits a field with explicit solver tolerances.
    ///
    /// # Errors
    ///
    /// See [`solve_weights_with`].
    pub fn fit_with(
        src: &[Point3<f64>],
        dst: &[Point3<f64>],
        kernel: RbfKernel,
        radius: f64,
        options: &SolveOptions,
    ) -> RetargetResult<Self> {
        let effective = kernel.effective_radius(radius);
        let weights = solve_weights_with(src, dst, kernel, effective, options)?;
        Ok(Self {
            reference: src.to_vec(),
            kernel,
            radius: effective,
            weights,
        })
    }

    /// Assembles a field from previously solved parts.
    ///
    /// `radius` is the effective radius the weights were solved with.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::WeightShapeMismatch`] if `weights` was not
    /// solved for `reference.len()` points.
    pub fn from_parts(
        reference: Vec<Point3<f64>>,
        kernel: RbfKernel,
        radius: f64,
        weights: WeightMatrix,
    ) -> RetargetResult<Self> {
        weights.check_reference_count(reference.len())?;
        Ok(Self {
            reference,
            kernel,
            radius,
            weights,
        })
    }

    /// Reference points the field was fitted to.
    #[must_use]
    pub fn reference_points(&self) -> &[Point3<f64>] {
        &self.reference
    }

    /// Kernel of the field.
    #[must_use]
    pub const fn kernel(&self) -> RbfKernel {
        self.kernel
    }

    /// Effective (scaled) radius of the field.
    #[must_use]
    pub const fn radius(&self) -> f64 {
        self.radius
    }

    /// Solved weights.
    #[must_use]
    pub const fn weights(&self) -> &WeightMatrix {
        &self.weights
    }

    /// Maps every query point through the field.
    #[must_use]
    pub fn evaluate(&self, query: &[Point3<f64>]) -> Vec<Point3<f64>> {
        self.evaluate_chunked(query, DEFAULT_EVAL_CHUNK_ROWS)
    }

    /// Maps every query point through the field, `chunk_rows` at a time.
    ///
    /// A `chunk_rows` of zero is treated as one.
    #[must_use]
    pub fn evaluate_chunked(&self, query: &[Point3<f64>], chunk_rows: usize) -> Vec<Point3<f64>> {
        evaluate_unchecked(
            query,
            &self.reference,
            self.kernel,
            self.radius,
            &self.weights,
            chunk_rows.max(1),
        )
    }

    /// Maps a single point through the field.
    #[must_use]
    pub fn transform_point(&self, point: &Point3<f64>) -> Point3<f64> {
        let w = self.weights.as_matrix();
        let n = self.reference.len();

        let mut out = Vector3::new(w[(n, 0)], w[(n, 1)], w[(n, 2)]);
        for axis in 0..3 {
            out += w.fixed_view::<1, 3>(n + 1 + axis, 0).transpose() * point[axis];
        }
        for (j, s) in self.reference.iter().enumerate() {
            let k = self.kernel.evaluate((point - s).norm(), self.radius);
            out += w.fixed_view::<1, 3>(j, 0).transpose() * k;
        }

        Point3::from(out)
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
    use crate::solve::solve_weights;
    use approx::assert_relative_eq;

    fn octahedron() -> Vec<Point3<f64>> {
        vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.0, -1.0, 0.0),
            Point3::new(0.0, 0.0, 1.0),
            Point3::new(0.0, 0.0, -1.0),
        ]
    }

    fn bulge(src: &[Point3<f64>]) -> Vec<Point3<f64>> {
        src.iter()
            .map(|p| Point3::new(p.x * 1.2, p.y + 0.1 * p.z * p.z, p.z))
            .collect()
    }

    #[test]
    fn test_distance_matrix_shape() {
        let src = octahedron();
        let d = distance_matrix(&src[..2], &src, RbfKernel::Linear, 0.0);
        assert_eq!(d.shape(), (2, 6));
        assert_relative_eq!(d[(0, 1)], 2.0);
        assert_relative_eq!(d[(1, 2)], 2.0_f64.sqrt(), epsilon = 1e-12);
        assert_eq!(d[(0, 0)], 0.0);
    }

    #[test]
    fn test_evaluate_interpolates() {
        let src = octahedron();
        let dst = bulge(&src);
        let w = solve_weights(&src, &dst, RbfKernel::ThinPlate, 0.5).unwrap();

        let out = evaluate(&src, &src, RbfKernel::ThinPlate, 0.5, &w).unwrap();
        for (p, q) in out.iter().zip(&dst) {
            assert_relative_eq!(p, q, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_chunked_matches_single_block() {
        let src = octahedron();
        let dst = bulge(&src);
        let w = solve_weights(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();

        let query: Vec<_> = (0..25)
            .map(|i| {
                let t = f64::from(i) * 0.1;
                Point3::new(t.sin(), t.cos(), t - 1.0)
            })
            .collect();

        let whole = evaluate_chunked(&query, &src, RbfKernel::Biharmonic, 0.5, &w, 1000).unwrap();
        let split = evaluate_chunked(&query, &src, RbfKernel::Biharmonic, 0.5, &w, 7).unwrap();
        assert_eq!(whole.len(), 25);
        for (a, b) in whole.iter().zip(&split) {
            assert_relative_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_evaluate_empty_query() {
        let src = octahedron();
        let w = solve_weights(&src, &src, RbfKernel::Biharmonic, 0.5).unwrap();
        let out = evaluate(&[], &src, RbfKernel::Biharmonic, 0.5, &w).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_evaluate_rejects_mismatched_weights() {
        let src = octahedron();
        let w = solve_weights(&src, &src, RbfKernel::Biharmonic, 0.5).unwrap();
        let result = evaluate(&src, &src[..5], RbfKernel::Biharmonic, 0.5, &w);
        assert_eq!(
            result.unwrap_err(),
            RetargetError::WeightShapeMismatch {
                expected: 9,
                found: 10
            }
        );

        let result = evaluate_chunked(&src, &src, RbfKernel::Biharmonic, 0.5, &w, 0);
        assert!(matches!(result, Err(RetargetError::InvalidParameter(_))));
    }

    #[test]
    fn test_field_transform_point_matches_batch() {
        let src = octahedron();
        let dst = bulge(&src);
        let field = RbfField::fit(&src, &dst, RbfKernel::C2, 0.5).unwrap();
        assert_relative_eq!(field.radius(), 1.0);

        let q = Point3::new(0.2, -0.3, 0.4);
        let single = field.transform_point(&q);
        let batch = field.evaluate(&[q]);
        assert_relative_eq!(single, batch[0], epsilon = 1e-10);
    }

    #[test]
    fn test_field_from_parts() {
        let src = octahedron();
        let w = solve_weights(&src, &src, RbfKernel::Gaussian, 0.5).unwrap();
        let field = RbfField::from_parts(src.clone(), RbfKernel::Gaussian, 0.5, w.clone()).unwrap();
        assert_eq!(field.reference_points().len(), 6);
        assert_eq!(field.kernel(), RbfKernel::Gaussian);
        assert_eq!(field.weights(), &w);

        assert!(RbfField::from_parts(src[..4].to_vec(), RbfKernel::Gaussian, 0.5, w).is_err());
    }
}
