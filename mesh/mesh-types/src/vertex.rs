//! Vertex type with selection state.

use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A vertex in 3D space with an editor selection flag.
///
/// The position is stored as a `Point3<f64>` for high precision. The
/// selection flag mirrors the host editor's per-vertex selection and is
/// used to restrict sampling to a region of interest.
///
/// # Example
///
/// ```
/// use mesh_types::Vertex;
///
/// let v = Vertex::from_coords(1.0, 2.0, 3.0);
/// assert!((v.position.y - 2.0).abs() < f64::EPSILON);
/// assert!(!v.selected);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vertex {
    /// Position in object-local space.
    pub position: Point3<f64>,

    /// Whether the vertex is part of the current editor selection.
    pub selected: bool,
}

impl Vertex {
    /// Create an unselected vertex at the given position.
    #[inline]
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            selected: false,
        }
    }

    /// Create an unselected vertex from coordinates.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::Vertex;
    ///
    /// let v = Vertex::from_coords(0.0, 0.5, 1.0);
    /// assert!((v.position.z - 1.0).abs() < f64::EPSILON);
    /// ```
    #[inline]
    #[must_use]
    pub const fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Return this vertex with its selection flag set.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::Vertex;
    ///
    /// let v = Vertex::from_coords(0.0, 0.0, 0.0).with_selected(true);
    /// assert!(v.selected);
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_selected(mut self, selected: bool) -> Self {
        self.selected = selected;
        self
    }
}

impl From<Point3<f64>> for Vertex {
    fn from(position: Point3<f64>) -> Self {
        Self::new(position)
    }
}

impl From<[f64; 3]> for Vertex {
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::from_coords(x, y, z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_defaults_to_unselected() {
        let v = Vertex::from_coords(1.0, 2.0, 3.0);
        assert!(!v.selected);
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn vertex_conversions() {
        let a: Vertex = [1.0, 0.0, -1.0].into();
        let b: Vertex = Point3::new(1.0, 0.0, -1.0).into();
        assert_eq!(a, b);
    }

    #[test]
    fn with_selected_toggles_flag() {
        let v = Vertex::from_coords(0.0, 0.0, 0.0).with_selected(true);
        assert!(v.selected);
        assert!(!v.with_selected(false).selected);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn vertex_serde_roundtrip() {
        let v = Vertex::from_coords(0.25, -1.0, 4.0).with_selected(true);
        let json = serde_json::to_string(&v).unwrap_or_default();
        let parsed: Result<Vertex, _> = serde_json::from_str(&json);
        assert_eq!(parsed.ok(), Some(v));
    }
}
