//! Point sampling with masking, stride decimation and mirror doubling.
//!
//! Dense meshes produce correspondence sets far too large for a dense
//! solve. Sampling bounds the set by taking every `s`-th eligible point in
//! index order, where `s` is derived from a point cap with
//! [`stride_for_cap`]. Nearby vertices usually have nearby indices, so this
//! keeps coverage reasonable at a fraction of the cost.

use crate::{RetargetError, RetargetResult};
use mesh_types::PointSource;
use nalgebra::{DMatrix, Matrix4, Point3};
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Coordinate axis normal to the mirror plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MirrorAxis {
    /// Mirror across the YZ plane.
    #[default]
    X,
    /// Mirror across the XZ plane.
    Y,
    /// Mirror across the XY plane.
    Z,
}

impl MirrorAxis {
    /// Component index of the axis.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }

    /// Reflects a point across the mirror plane.
    ///
    /// # Examples
    ///
    /// ```
    /// use mesh_retarget::MirrorAxis;
    /// use nalgebra::Point3;
    ///
    /// let p = MirrorAxis::X.reflect(&Point3::new(1.0, 2.0, 3.0));
    /// assert_eq!(p, Point3::new(-1.0, 2.0, 3.0));
    /// ```
    #[must_use]
    pub fn reflect(self, point: &Point3<f64>) -> Point3<f64> {
        let mut p = *point;
        p[self.index()] = -p[self.index()];
        p
    }
}

/// Shared mirror state for a correspondence pair.
///
/// The first sample taken with a fresh accumulator decides which rows get
/// mirrored (those off the mirror plane). Later samples mirror exactly the
/// same rows, so source and destination stay row-aligned even if the
/// destination moved a point onto the plane.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{sample, MirrorAccumulator, SampleOptions};
/// use nalgebra::Point3;
///
/// let src = vec![Point3::new(0.0, 1.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
/// let dst = vec![Point3::new(0.0, 2.0, 0.0), Point3::new(0.0, 0.0, 0.0)];
///
/// let mut mirror = MirrorAccumulator::default();
/// let a = sample(&src, &SampleOptions::new(), Some(&mut mirror)).unwrap();
/// let b = sample(&dst, &SampleOptions::new(), Some(&mut mirror)).unwrap();
///
/// // Row 1 was off-plane in the source, so both sets get one extra row.
/// assert_eq!(a.len(), 3);
/// assert_eq!(b.len(), 3);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MirrorAccumulator {
    axis: MirrorAxis,
    recorded: Option<Vec<usize>>,
    sampled_rows: usize,
}

impl MirrorAccumulator {
    /// Creates an empty accumulator for the given axis.
    #[must_use]
    pub const fn new(axis: MirrorAxis) -> Self {
        Self {
            axis,
            recorded: None,
            sampled_rows: 0,
        }
    }

    /// The mirror axis.
    #[must_use]
    pub const fn axis(&self) -> MirrorAxis {
        self.axis
    }

    /// Rows recorded by the first sample, if any sample was taken.
    #[must_use]
    pub fn recorded_rows(&self) -> Option<&[usize]> {
        self.recorded.as_deref()
    }

    /// Appends reflections to `points` and returns how many were added.
    ///
    /// Every sample after the first must have the first sample's row count.
    fn extend(&mut self, points: &mut Vec<Point3<f64>>) -> RetargetResult<usize> {
        let axis = self.axis;
        if self.recorded.is_none() {
            self.sampled_rows = points.len();
            self.recorded = Some(
                points
                    .iter()
                    .enumerate()
                    .filter(|(_, p)| p[axis.index()].abs() > 0.0)
                    .map(|(i, _)| i)
                    .collect(),
            );
        } else if points.len() != self.sampled_rows {
            return Err(RetargetError::PointCountMismatch {
                source_points: self.sampled_rows,
                destination_points: points.len(),
            });
        }

        let rows = self.recorded.as_deref().unwrap_or_default();
        let reflected: Vec<_> = rows.iter().map(|&row| axis.reflect(&points[row])).collect();
        let added = reflected.len();
        points.extend(reflected);
        Ok(added)
    }
}

/// Frame a [`PointSet`] is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateSpace {
    /// The point source's own local frame.
    Local,
    /// Mapped through a caller-supplied transform.
    Transformed,
}

/// An ordered set of sampled points.
///
/// Rows `0..sampled_count()` come from the point source, in index order,
/// and [`indices`](Self::indices) maps each back to its source index.
/// Mirrored rows, if any, follow them.
#[derive(Debug, Clone)]
pub struct PointSet {
    points: Vec<Point3<f64>>,
    indices: Vec<usize>,
    mirrored: usize,
    space: CoordinateSpace,
}

impl PointSet {
    /// Wraps raw points as an unmirrored local point set.
    #[must_use]
    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        let indices = (0..points.len()).collect();
        Self {
            points,
            indices,
            mirrored: 0,
            space: CoordinateSpace::Local,
        }
    }

    /// Total number of rows, mirrored rows included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the set has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All rows.
    #[must_use]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    /// Source indices of the sampled (non-mirrored) rows.
    #[must_use]
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Number of rows read from the point source.
    #[must_use]
    pub fn sampled_count(&self) -> usize {
        self.indices.len()
    }

    /// Number of mirrored rows appended after the sampled ones.
    #[must_use]
    pub const fn mirrored_count(&self) -> usize {
        self.mirrored
    }

    /// Whether mirrored rows are present.
    #[must_use]
    pub const fn is_mirrored(&self) -> bool {
        self.mirrored > 0
    }

    /// Frame of the rows.
    #[must_use]
    pub const fn space(&self) -> CoordinateSpace {
        self.space
    }

    /// Rows as an `N×3` matrix.
    #[must_use]
    pub fn to_matrix(&self) -> DMatrix<f64> {
        DMatrix::from_fn(self.points.len(), 3, |i, j| self.points[i][j])
    }

    /// Consumes the set, returning its rows.
    #[must_use]
    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }
}

/// Options for [`sample`].
#[derive(Debug, Clone, Copy)]
pub struct SampleOptions<'a> {
    /// Per-point eligibility. `None` makes every point eligible.
    pub mask: Option<&'a [bool]>,
    /// Take every `stride`-th eligible point. Must be at least 1.
    pub stride: usize,
    /// Affine transform applied to each sampled point.
    pub transform: Option<Matrix4<f64>>,
}

impl Default for SampleOptions<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> SampleOptions<'a> {
    /// Every point, stride 1, no transform.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mask: None,
            stride: 1,
            transform: None,
        }
    }

    /// Restrict sampling to points where `mask` is true.
    #[must_use]
    pub const fn with_mask(mut self, mask: &'a [bool]) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Set the stride.
    #[must_use]
    pub const fn with_stride(mut self, stride: usize) -> Self {
        self.stride = stride;
        self
    }

    /// Map sampled points through `transform`.
    #[must_use]
    pub const fn with_transform(mut self, transform: Matrix4<f64>) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Stride that brings `eligible` points down to at most `cap`.
///
/// Always at least 1.
///
/// # Examples
///
/// ```
/// use mesh_retarget::stride_for_cap;
///
/// assert_eq!(stride_for_cap(500, 1000), 1);
/// assert_eq!(stride_for_cap(2500, 1000), 3);
/// assert_eq!(stride_for_cap(0, 1000), 1);
/// ```
#[must_use]
pub fn stride_for_cap(eligible: usize, cap: usize) -> usize {
    eligible.div_ceil(cap.max(1)).max(1)
}

/// Number of rows a stride keeps out of `eligible` points.
#[must_use]
pub fn strided_count(eligible: usize, stride: usize) -> usize {
    eligible.div_ceil(stride.max(1))
}

/// Extracts an ordered point set from a point source.
///
/// Eligible points (all, or those where the mask is true) are decimated by
/// stride in index order, mapped through the optional transform, and then
/// doubled across the mirror plane if an accumulator is given.
///
/// # Errors
///
/// - [`RetargetError::InvalidParameter`] if the stride is zero
/// - [`RetargetError::MaskLengthMismatch`] if the mask does not match the source
/// - [`RetargetError::EmptySelection`] if a mask leaves no eligible points
/// - [`RetargetError::MissingPoint`] if the source has no position for an
///   index below its point count
/// - [`RetargetError::PointCountMismatch`] if `mirror` already recorded a
///   sample with a different number of rows
///
/// # Examples
///
/// ```
/// use mesh_retarget::{sample, SampleOptions};
/// use nalgebra::Point3;
///
/// let points: Vec<_> = (0..10).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
/// let mask: Vec<bool> = (0..10).map(|i| i % 2 == 0).collect();
///
/// let set = sample(&points, &SampleOptions::new().with_mask(&mask).with_stride(2), None).unwrap();
/// assert_eq!(set.indices(), &[0, 4, 8]);
/// ```
pub fn sample<S: PointSource + ?Sized>(
    source: &S,
    options: &SampleOptions<'_>,
    mirror: Option<&mut MirrorAccumulator>,
) -> RetargetResult<PointSet> {
    if options.stride == 0 {
        return Err(RetargetError::InvalidParameter(
            "sampling stride must be at least 1".to_string(),
        ));
    }

    let count = source.point_count();
    if let Some(mask) = options.mask {
        if mask.len() != count {
            return Err(RetargetError::MaskLengthMismatch {
                mask: mask.len(),
                points: count,
            });
        }
    }

    let eligible = (0..count).filter(|&i| options.mask.is_none_or(|m| m[i]));
    let indices: Vec<usize> = eligible.step_by(options.stride).collect();
    if options.mask.is_some() && indices.is_empty() {
        return Err(RetargetError::EmptySelection);
    }

    let mut points = indices
        .iter()
        .map(|&index| {
            source.point(index).ok_or(RetargetError::MissingPoint {
                index,
                points: count,
            })
        })
        .collect::<RetargetResult<Vec<_>>>()?;
    let space = match options.transform {
        Some(m) => {
            for p in &mut points {
                *p = m.transform_point(p);
            }
            CoordinateSpace::Transformed
        }
        None => CoordinateSpace::Local,
    };

    let mirrored = match mirror {
        Some(acc) => acc.extend(&mut points)?,
        None => 0,
    };

    debug!(
        points = count,
        sampled = indices.len(),
        stride = options.stride,
        mirrored,
        "Sampled point set"
    );

    Ok(PointSet {
        points,
        indices,
        mirrored,
        space,
    })
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

    fn line(n: usize) -> Vec<Point3<f64>> {
        (0..n).map(|i| Point3::new(i as f64, 1.0, 0.0)).collect()
    }

    #[test]
    fn test_stride_for_cap() {
        assert_eq!(stride_for_cap(1000, 1000), 1);
        assert_eq!(stride_for_cap(1001, 1000), 2);
        assert_eq!(stride_for_cap(4000, 1000), 4);
        assert_eq!(stride_for_cap(1, 0), 1);
    }

    #[test]
    fn test_stride_decimation() {
        let pts = line(10);
        let set = sample(&pts, &SampleOptions::new().with_stride(3), None).unwrap();
        assert_eq!(set.indices(), &[0, 3, 6, 9]);
        assert_eq!(set.len(), strided_count(10, 3));
        assert_eq!(set.space(), CoordinateSpace::Local);
        assert!(!set.is_mirrored());
    }

    #[test]
    fn test_mask_applies_before_stride() {
        let pts = line(6);
        let mask = [false, true, true, false, true, true];
        let set = sample(
            &pts,
            &SampleOptions::new().with_mask(&mask).with_stride(2),
            None,
        )
        .unwrap();
        assert_eq!(set.indices(), &[1, 4]);
        assert_eq!(set.points()[1], Point3::new(4.0, 1.0, 0.0));
    }

    #[test]
    fn test_empty_selection() {
        let pts = line(3);
        let mask = [false; 3];
        let result = sample(&pts, &SampleOptions::new().with_mask(&mask), None);
        assert_eq!(result.unwrap_err(), RetargetError::EmptySelection);
    }

    #[test]
    fn test_empty_source_without_mask_is_empty_set() {
        let pts: Vec<Point3<f64>> = Vec::new();
        let set = sample(&pts, &SampleOptions::new(), None).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_mask_length_mismatch() {
        let pts = line(3);
        let mask = [true; 2];
        let result = sample(&pts, &SampleOptions::new().with_mask(&mask), None);
        assert_eq!(
            result.unwrap_err(),
            RetargetError::MaskLengthMismatch { mask: 2, points: 3 }
        );
    }

    #[test]
    fn test_zero_stride_rejected() {
        let pts = line(3);
        let result = sample(&pts, &SampleOptions::new().with_stride(0), None);
        assert!(matches!(result, Err(RetargetError::InvalidParameter(_))));
    }

    #[test]
    fn test_transform_is_applied() {
        let pts = line(2);
        let m = Matrix4::new_translation(&Vector3::new(0.0, 0.0, 5.0));
        let set = sample(&pts, &SampleOptions::new().with_transform(m), None).unwrap();
        assert_eq!(set.space(), CoordinateSpace::Transformed);
        assert_relative_eq!(set.points()[1].z, 5.0);
        assert_relative_eq!(set.points()[1].x, 1.0);
    }

    #[test]
    fn test_mirror_records_off_plane_rows() {
        let src = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-2.0, 1.0, 0.0),
        ];
        let mut acc = MirrorAccumulator::new(MirrorAxis::X);
        let set = sample(&src, &SampleOptions::new(), Some(&mut acc)).unwrap();

        assert_eq!(acc.recorded_rows(), Some(&[1, 2][..]));
        assert_eq!(set.len(), 5);
        assert_eq!(set.sampled_count(), 3);
        assert_eq!(set.mirrored_count(), 2);
        assert_eq!(set.points()[3], Point3::new(-1.0, 0.0, 0.0));
        assert_eq!(set.points()[4], Point3::new(2.0, 1.0, 0.0));
    }

    #[test]
    fn test_mirror_replays_rows_on_second_sample() {
        let src = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        // Destination moves row 0 off-plane and row 1 onto the plane.
        let dst = vec![Point3::new(0.5, 0.0, 0.0), Point3::new(0.0, 3.0, 0.0)];

        let mut acc = MirrorAccumulator::new(MirrorAxis::X);
        let a = sample(&src, &SampleOptions::new(), Some(&mut acc)).unwrap();
        let b = sample(&dst, &SampleOptions::new(), Some(&mut acc)).unwrap();

        assert_eq!(a.len(), b.len());
        assert_eq!(b.points()[2], Point3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_mirror_rejects_misaligned_second_sample() {
        let src = line(4);
        let mut acc = MirrorAccumulator::new(MirrorAxis::X);
        sample(&src, &SampleOptions::new(), Some(&mut acc)).unwrap();

        let result = sample(&src[..3], &SampleOptions::new(), Some(&mut acc));
        assert_eq!(
            result.unwrap_err(),
            RetargetError::PointCountMismatch {
                source_points: 4,
                destination_points: 3
            }
        );
    }

    /// Reports a count that includes holes it cannot fill.
    struct Sparse(Vec<Option<Point3<f64>>>);

    impl PointSource for Sparse {
        fn point_count(&self) -> usize {
            self.0.len()
        }

        fn point(&self, index: usize) -> Option<Point3<f64>> {
            self.0.get(index).copied().flatten()
        }
    }

    #[test]
    fn test_missing_point_is_an_error() {
        let source = Sparse(vec![
            Some(Point3::origin()),
            Some(Point3::new(1.0, 0.0, 0.0)),
            None,
            Some(Point3::new(0.0, 1.0, 0.0)),
        ]);

        let result = sample(&source, &SampleOptions::new(), None);
        assert_eq!(
            result.unwrap_err(),
            RetargetError::MissingPoint {
                index: 2,
                points: 4
            }
        );

        // Striding past the hole never asks for it.
        let set = sample(&source, &SampleOptions::new().with_stride(3), None).unwrap();
        assert_eq!(set.indices(), &[0, 3]);
    }

    #[test]
    fn test_mirror_with_nothing_off_plane() {
        let pts = vec![Point3::new(0.0, 1.0, 0.0), Point3::new(0.0, 2.0, 0.0)];
        let mut acc = MirrorAccumulator::default();
        let set = sample(&pts, &SampleOptions::new(), Some(&mut acc)).unwrap();
        assert_eq!(set.len(), 2);
        assert_eq!(acc.recorded_rows(), Some(&[][..]));
    }

    #[test]
    fn test_mirror_other_axes() {
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(MirrorAxis::Y.reflect(&p), Point3::new(1.0, -2.0, 3.0));
        assert_eq!(MirrorAxis::Z.reflect(&p), Point3::new(1.0, 2.0, -3.0));
        assert_eq!(MirrorAxis::default(), MirrorAxis::X);
    }

    #[test]
    fn test_to_matrix() {
        let set = PointSet::from_points(vec![Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)]);
        let m = set.to_matrix();
        assert_eq!(m.shape(), (2, 3));
        assert_eq!(m[(1, 2)], 6.0);
        assert_eq!(set.indices(), &[0, 1]);
    }
}
