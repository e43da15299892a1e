//! Traits for point providers.

use nalgebra::Point3;

/// Minimal read interface over an ordered set of points.
///
/// This is what sampling algorithms consume, so they can read vertex
/// positions, shape key channels, or plain point arrays without caring
/// where the data lives.
pub trait PointSource {
    /// Number of points.
    fn point_count(&self) -> usize;

    /// Position of the point at `index`.
    ///
    /// Returns `None` if the index is out of bounds.
    fn point(&self, index: usize) -> Option<Point3<f64>>;

    /// Whether the point at `index` is selected.
    ///
    /// Sources without a notion of selection report every point as
    /// selected. Out-of-bounds indices are never selected.
    fn is_selected(&self, index: usize) -> bool {
        index < self.point_count()
    }

    /// Whether the source holds no points.
    fn is_empty(&self) -> bool {
        self.point_count() == 0
    }

    /// Number of selected points.
    fn selected_count(&self) -> usize {
        (0..self.point_count()).filter(|&i| self.is_selected(i)).count()
    }

    /// Per-point selection flags, in point order.
    fn selection_mask(&self) -> Vec<bool> {
        (0..self.point_count()).map(|i| self.is_selected(i)).collect()
    }
}

impl PointSource for [Point3<f64>] {
    fn point_count(&self) -> usize {
        self.len()
    }

    fn point(&self, index: usize) -> Option<Point3<f64>> {
        self.get(index).copied()
    }
}

impl PointSource for Vec<Point3<f64>> {
    fn point_count(&self) -> usize {
        self.len()
    }

    fn point(&self, index: usize) -> Option<Point3<f64>> {
        self.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slices_are_fully_selected() {
        let pts = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(pts.point_count(), 2);
        assert_eq!(pts.selected_count(), 2);
        assert!(pts.is_selected(1));
        assert!(!pts.is_selected(2));
        assert_eq!(pts.selection_mask(), vec![true, true]);
    }

    #[test]
    fn point_lookup_is_bounds_checked() {
        let pts = [Point3::new(3.0, 2.0, 1.0)];
        assert_eq!(pts[..].point(0), Some(Point3::new(3.0, 2.0, 1.0)));
        assert_eq!(pts[..].point(1), None);
        assert!(!pts[..].is_empty());
    }
}
