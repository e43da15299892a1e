//! Indexed triangle mesh with shape keys.

use crate::{PointSource, ShapeKey, Vertex};
use nalgebra::Point3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An indexed triangle mesh.
///
/// Stores vertices and faces separately, with faces referencing vertices
/// by index, plus any number of named shape keys sharing the vertex order.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, Vertex};
///
/// let mut mesh = IndexedMesh::new();
/// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
/// mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
/// mesh.faces.push([0, 1, 2]);
///
/// assert_eq!(mesh.vertex_count(), 3);
/// assert_eq!(mesh.face_count(), 1);
/// ```
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IndexedMesh {
    /// Vertex data.
    pub vertices: Vec<Vertex>,

    /// Triangle faces as indices into the vertex array.
    pub faces: Vec<[u32; 3]>,

    /// Named alternate position channels.
    pub shape_keys: Vec<ShapeKey>,
}

impl IndexedMesh {
    /// Create a new empty mesh.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            vertices: Vec::new(),
            faces: Vec::new(),
            shape_keys: Vec::new(),
        }
    }

    /// Create a mesh from vertices and faces, without shape keys.
    #[inline]
    #[must_use]
    pub const fn from_parts(vertices: Vec<Vertex>, faces: Vec<[u32; 3]>) -> Self {
        Self {
            vertices,
            faces,
            shape_keys: Vec::new(),
        }
    }

    /// Create a face-less mesh from raw positions.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::IndexedMesh;
    /// use nalgebra::Point3;
    ///
    /// let mesh = IndexedMesh::from_points(&[Point3::origin(), Point3::new(1.0, 0.0, 0.0)]);
    /// assert_eq!(mesh.vertex_count(), 2);
    /// assert_eq!(mesh.face_count(), 0);
    /// ```
    #[must_use]
    pub fn from_points(points: &[Point3<f64>]) -> Self {
        Self::from_parts(points.iter().copied().map(Vertex::new).collect(), Vec::new())
    }

    /// Number of vertices.
    #[inline]
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[inline]
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Vertex positions in vertex order.
    #[must_use]
    pub fn positions(&self) -> Vec<Point3<f64>> {
        self.vertices.iter().map(|v| v.position).collect()
    }

    /// Replace every vertex position, keeping selection flags.
    ///
    /// Extra positions are ignored; vertices without a new position keep
    /// their old one.
    pub fn set_positions(&mut self, positions: &[Point3<f64>]) {
        for (vertex, position) in self.vertices.iter_mut().zip(positions) {
            vertex.position = *position;
        }
    }

    /// Mark the given vertex indices as selected, clearing all others.
    ///
    /// Out-of-range indices are ignored.
    pub fn select_only(&mut self, indices: &[usize]) {
        for v in &mut self.vertices {
            v.selected = false;
        }
        for &i in indices {
            if let Some(v) = self.vertices.get_mut(i) {
                v.selected = true;
            }
        }
    }

    /// Look up a shape key by name.
    #[must_use]
    pub fn shape_key(&self, name: &str) -> Option<&ShapeKey> {
        self.shape_keys.iter().find(|k| k.name == name)
    }

    /// Insert a shape key, replacing an existing key with the same name.
    pub fn set_shape_key(&mut self, key: ShapeKey) {
        match self.shape_keys.iter_mut().find(|k| k.name == key.name) {
            Some(existing) => *existing = key,
            None => self.shape_keys.push(key),
        }
    }

    /// View a shape key as a [`PointSource`].
    ///
    /// Selection flags come from the mesh vertices, since shape keys do not
    /// carry their own selection.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_types::{IndexedMesh, PointSource, ShapeKey, Vertex};
    /// use nalgebra::Point3;
    ///
    /// let mut mesh = IndexedMesh::new();
    /// mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
    /// mesh.set_shape_key(ShapeKey::new("Lift", vec![Point3::new(0.0, 0.0, 1.0)]));
    ///
    /// let source = mesh.shape_key_source("Lift").unwrap();
    /// assert_eq!(source.point(0), Some(Point3::new(0.0, 0.0, 1.0)));
    /// ```
    #[must_use]
    pub fn shape_key_source(&self, name: &str) -> Option<ShapeKeySource<'_>> {
        self.shape_key(name).map(|key| ShapeKeySource { mesh: self, key })
    }
}

impl PointSource for IndexedMesh {
    fn point_count(&self) -> usize {
        self.vertices.len()
    }

    fn point(&self, index: usize) -> Option<Point3<f64>> {
        self.vertices.get(index).map(|v| v.position)
    }

    fn is_selected(&self, index: usize) -> bool {
        self.vertices.get(index).is_some_and(|v| v.selected)
    }
}

/// A shape key of a mesh exposed through [`PointSource`].
#[derive(Debug, Clone, Copy)]
pub struct ShapeKeySource<'a> {
    mesh: &'a IndexedMesh,
    key: &'a ShapeKey,
}

impl ShapeKeySource<'_> {
    /// Name of the underlying shape key.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.key.name
    }
}

impl PointSource for ShapeKeySource<'_> {
    fn point_count(&self) -> usize {
        self.mesh.vertices.len().min(self.key.positions.len())
    }

    fn point(&self, index: usize) -> Option<Point3<f64>> {
        if index < self.point_count() {
            self.key.positions.get(index).copied()
        } else {
            None
        }
    }

    fn is_selected(&self, index: usize) -> bool {
        index < self.point_count() && self.mesh.is_selected(index)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn triangle() -> IndexedMesh {
        let mut mesh = IndexedMesh::new();
        mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
        mesh.vertices.push(Vertex::from_coords(0.0, 1.0, 0.0));
        mesh.faces.push([0, 1, 2]);
        mesh
    }

    #[test]
    fn mesh_as_point_source() {
        let mut mesh = triangle();
        assert_eq!(mesh.point_count(), 3);
        assert_eq!(mesh.selected_count(), 0);

        mesh.select_only(&[0, 2, 99]);
        assert!(mesh.is_selected(0));
        assert!(!mesh.is_selected(1));
        assert!(mesh.is_selected(2));
        assert_eq!(mesh.selection_mask(), vec![true, false, true]);
    }

    #[test]
    fn set_positions_keeps_selection() {
        let mut mesh = triangle();
        mesh.select_only(&[1]);
        mesh.set_positions(&[Point3::new(5.0, 5.0, 5.0)]);

        assert_eq!(mesh.vertices[0].position, Point3::new(5.0, 5.0, 5.0));
        assert_eq!(mesh.vertices[1].position, Point3::new(1.0, 0.0, 0.0));
        assert!(mesh.vertices[1].selected);
    }

    #[test]
    fn set_shape_key_replaces_by_name() {
        let mut mesh = triangle();
        mesh.set_shape_key(ShapeKey::new("A", mesh.positions()));
        mesh.set_shape_key(ShapeKey::new("B", mesh.positions()));
        mesh.set_shape_key(ShapeKey::new("A", vec![Point3::origin(); 3]));

        assert_eq!(mesh.shape_keys.len(), 2);
        assert_eq!(mesh.shape_key("A").unwrap().positions[1], Point3::origin());
        assert!(mesh.shape_key("C").is_none());
    }

    #[test]
    fn shape_key_source_uses_mesh_selection() {
        let mut mesh = triangle();
        let lifted = mesh
            .positions()
            .into_iter()
            .map(|p| p + nalgebra::Vector3::z())
            .collect();
        mesh.set_shape_key(ShapeKey::new("Lift", lifted));
        mesh.select_only(&[1]);

        let source = mesh.shape_key_source("Lift").unwrap();
        assert_eq!(source.name(), "Lift");
        assert_eq!(source.point_count(), 3);
        assert_eq!(source.point(1), Some(Point3::new(1.0, 0.0, 1.0)));
        assert_eq!(source.point(3), None);
        assert_eq!(source.selection_mask(), vec![false, true, false]);
    }

    #[test]
    fn short_shape_key_limits_point_count() {
        let mut mesh = triangle();
        mesh.set_shape_key(ShapeKey::new("Short", vec![Point3::origin()]));
        let source = mesh.shape_key_source("Short").unwrap();
        assert_eq!(source.point_count(), 1);
    }
}
