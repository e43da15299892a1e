//! Named alternate position channels.

use nalgebra::{Point3, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named set of absolute vertex positions layered over a mesh.
///
/// Shape keys share the vertex order of the mesh they belong to, so
/// `positions[i]` is the alternate position of vertex `i`.
///
/// # Example
///
/// ```
/// use mesh_types::ShapeKey;
/// use nalgebra::Point3;
///
/// let key = ShapeKey::new("Smile", vec![Point3::new(0.0, 0.0, 1.0)]);
/// assert_eq!(key.name, "Smile");
/// assert_eq!(key.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ShapeKey {
    /// Channel name, unique within a mesh.
    pub name: String,

    /// Absolute position for every vertex of the owning mesh.
    pub positions: Vec<Point3<f64>>,
}

impl ShapeKey {
    /// Create a shape key from a name and absolute positions.
    #[must_use]
    pub fn new(name: impl Into<String>, positions: Vec<Point3<f64>>) -> Self {
        Self {
            name: name.into(),
            positions,
        }
    }

    /// Number of positions stored in the key.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether the key stores no positions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Per-vertex offsets of this key relative to `basis`.
    ///
    /// Vertices missing from either side are skipped, so the result has
    /// `min(self.len(), basis.len())` entries.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::ShapeKey;
    /// use nalgebra::{Point3, Vector3};
    ///
    /// let key = ShapeKey::new("Up", vec![Point3::new(0.0, 0.0, 2.0)]);
    /// let offsets = key.offsets(&[Point3::new(0.0, 0.0, 0.5)]);
    /// assert_eq!(offsets, vec![Vector3::new(0.0, 0.0, 1.5)]);
    /// ```
    #[must_use]
    pub fn offsets(&self, basis: &[Point3<f64>]) -> Vec<Vector3<f64>> {
        self.positions
            .iter()
            .zip(basis)
            .map(|(key, base)| key - base)
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn offsets_against_basis() {
        let key = ShapeKey::new(
            "Wide",
            vec![Point3::new(2.0, 0.0, 0.0), Point3::new(-2.0, 1.0, 0.0)],
        );
        let basis = [Point3::new(1.0, 0.0, 0.0), Point3::new(-1.0, 1.0, 0.0)];

        let offsets = key.offsets(&basis);
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[0], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(offsets[1], Vector3::new(-1.0, 0.0, 0.0));
    }

    #[test]
    fn offsets_truncate_to_shorter_side() {
        let key = ShapeKey::new("Short", vec![Point3::origin()]);
        let basis = [Point3::origin(), Point3::new(1.0, 1.0, 1.0)];
        assert_eq!(key.offsets(&basis).len(), 1);
    }

    #[test]
    fn empty_key() {
        let key = ShapeKey::new("Empty", Vec::new());
        assert!(key.is_empty());
        assert_eq!(key.len(), 0);
    }
}
