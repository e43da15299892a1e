//! Scene objects: a named mesh placed in world space.

use crate::IndexedMesh;
use nalgebra::Matrix4;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A named mesh with an object-to-world transform.
///
/// # Example
///
/// ```
/// use mesh_types::{IndexedMesh, MeshObject};
/// use nalgebra::{Matrix4, Vector3};
///
/// let obj = MeshObject::new("Body", IndexedMesh::new())
///     .with_matrix_world(Matrix4::new_translation(&Vector3::new(0.0, 0.0, 1.0)));
/// assert_eq!(obj.name, "Body");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MeshObject {
    /// Object name, unique within a scene.
    pub name: String,

    /// Mesh data in object-local space.
    pub mesh: IndexedMesh,

    /// Affine object-to-world matrix.
    pub matrix_world: Matrix4<f64>,
}

impl MeshObject {
    /// Create an object placed at the world origin.
    #[must_use]
    pub fn new(name: impl Into<String>, mesh: IndexedMesh) -> Self {
        Self {
            name: name.into(),
            mesh,
            matrix_world: Matrix4::identity(),
        }
    }

    /// Set the object-to-world matrix.
    #[must_use]
    pub fn with_matrix_world(mut self, matrix_world: Matrix4<f64>) -> Self {
        self.matrix_world = matrix_world;
        self
    }
}
