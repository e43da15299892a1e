//! Deformation transfer with radial basis functions.
//!
//! This crate propagates an edit of a base mesh onto meshes that were fit
//! to it (clothing, accessories, other dependents). Corresponding vertices
//! of the base mesh before and after the edit define a smooth vector field
//! which is then applied to every dependent mesh.
//!
//! # Pipeline
//!
//! 1. **Sample** ([`sample`]) the source and destination with a shared mask,
//!    stride and [`MirrorAccumulator`], keeping rows in correspondence
//! 2. **Solve** ([`solve_weights`]) the augmented RBF system once
//! 3. **Evaluate** ([`evaluate`], [`RbfField`]) the field at each dependent's
//!    points, in blocks
//! 4. **Write back** positions or a new shape key ([`retarget`])
//!
//! # Kernels
//!
//! See [`RbfKernel`]. The default is Biharmonic with radius 0.5.
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with zero Bevy dependencies. Computation is
//! single-threaded and synchronous.
//!
//! # Quick Start
//!
//! ```
//! use mesh_retarget::{RbfField, RbfKernel};
//! use nalgebra::{Point3, Vector3};
//!
//! let src = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//!     Point3::new(0.0, 0.0, 1.0),
//!     Point3::new(1.0, 1.0, 1.0),
//! ];
//! // Lift the far corner only.
//! let mut dst = src.clone();
//! dst[4] += Vector3::new(0.0, 0.0, 0.5);
//!
//! let field = RbfField::fit(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
//!
//! // Correspondence points are reproduced exactly.
//! let moved = field.transform_point(&src[4]);
//! assert!((moved - dst[4]).norm() < 1e-8);
//! ```
//!
//! # Retargeting Meshes
//!
//! ```
//! use mesh_retarget::{retarget, Destination, RetargetConfig, RetargetParams, WriteMode};
//! use mesh_types::{IndexedMesh, MeshObject, ShapeKey};
//! use nalgebra::Point3;
//!
//! let base: Vec<_> = (0..8)
//!     .map(|i| {
//!         let t = f64::from(i);
//!         Point3::new(t.cos(), t.sin(), 0.25 * t)
//!     })
//!     .collect();
//! let mut body = MeshObject::new("Body", IndexedMesh::from_points(&base));
//! body.mesh.set_shape_key(ShapeKey::new(
//!     "Wide",
//!     base.iter().map(|p| Point3::new(p.x * 1.5, p.y, p.z)).collect(),
//! ));
//!
//! let mut targets = vec![MeshObject::new(
//!     "Belt",
//!     IndexedMesh::from_points(&[Point3::new(0.5, 0.0, 0.5)]),
//! )];
//!
//! let params = RetargetParams::default().with_write_mode(WriteMode::ShapeKey);
//! let report = retarget(
//!     &body,
//!     Destination::ShapeKey("Wide"),
//!     &mut targets,
//!     &params,
//!     &RetargetConfig::default(),
//! )
//! .unwrap();
//!
//! assert_eq!(report.retargeted_count(), 1);
//! assert!(targets[0].mesh.shape_key("Retarget_Body_Wide").is_some());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
// Allow some pedantic lints that are too noisy for numerical code
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::many_single_char_names)]
#![allow(clippy::similar_names)]

mod config;
mod error;
mod field;
mod frame;
mod kernel;
mod params;
mod result;
mod retarget;
mod sample;
mod solve;

pub use config::RetargetConfig;
pub use error::{RetargetError, RetargetResult};
pub use field::{DEFAULT_EVAL_CHUNK_ROWS, RbfField, distance_matrix, evaluate, evaluate_chunked};
pub use frame::{DestinationSpace, ObjectFrame};
pub use kernel::{DEFAULT_RADIUS, RbfKernel};
pub use params::{Destination, RetargetParams, WriteMode};
pub use result::{RetargetReport, TargetOutcome, TargetReport};
pub use retarget::{Correspondence, fit_correspondence, retarget};
pub use sample::{
    CoordinateSpace, MirrorAccumulator, MirrorAxis, PointSet, SampleOptions, sample,
    stride_for_cap, strided_count,
};
pub use solve::{
    AFFINE_TERMS, SolveOptions, WeightMatrix, rhs_matrix, solve_weights, solve_weights_with,
    system_matrix,
};

// Re-export mesh types for convenience
pub use mesh_types::{IndexedMesh, MeshObject, PointSource, ShapeKey, Vertex};
