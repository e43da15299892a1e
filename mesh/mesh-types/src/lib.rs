//! Host-side mesh types for retargeting.
//!
//! This crate provides the data a retarget operation reads and writes:
//!
//! - [`Vertex`] - A point in 3D space with an editor selection flag
//! - [`ShapeKey`] - A named channel of alternate absolute positions
//! - [`IndexedMesh`] - A triangle mesh with indexed vertices and shape keys
//! - [`MeshObject`] - A named mesh placed in world space
//! - [`PointSource`] - Read interface shared by meshes, shape keys and point arrays
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**.
//!
//! # Units
//!
//! This library is **unit-agnostic**. All coordinates are `f64`.
//!
//! # Example
//!
//! ```
//! use mesh_types::{IndexedMesh, PointSource, ShapeKey, Vertex};
//! use nalgebra::Point3;
//!
//! let mut mesh = IndexedMesh::new();
//! mesh.vertices.push(Vertex::from_coords(0.0, 0.0, 0.0).with_selected(true));
//! mesh.vertices.push(Vertex::from_coords(1.0, 0.0, 0.0));
//! mesh.set_shape_key(ShapeKey::new(
//!     "Raised",
//!     vec![Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 0.0, 1.0)],
//! ));
//!
//! assert_eq!(mesh.selected_count(), 1);
//! assert!(mesh.shape_key_source("Raised").is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]

mod mesh;
mod object;
mod shape_key;
mod traits;
mod vertex;

pub use mesh::{IndexedMesh, ShapeKeySource};
pub use object::MeshObject;
pub use shape_key::ShapeKey;
pub use traits::PointSource;
pub use vertex::Vertex;

// Re-export nalgebra types for convenience
pub use nalgebra::{Matrix4, Point3, Vector3};
