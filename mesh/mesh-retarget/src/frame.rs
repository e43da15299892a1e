//! Frames for evaluating dependent objects in destination space.

use crate::{RetargetError, RetargetResult};
use mesh_types::MeshObject;
use nalgebra::{Matrix4, Point3};

/// A destination object's world matrix together with its inverse.
///
/// Built once per retarget invocation, then shared by every dependent's
/// [`ObjectFrame`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DestinationSpace {
    world: Matrix4<f64>,
    inverse: Matrix4<f64>,
}

impl DestinationSpace {
    /// Inverts `destination`'s world matrix.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::NonInvertibleDestination`] if the world
    /// matrix is singular.
    pub fn of(destination: &MeshObject) -> RetargetResult<Self> {
        let inverse = destination.matrix_world.try_inverse().ok_or_else(|| {
            RetargetError::NonInvertibleDestination {
                object: destination.name.clone(),
            }
        })?;
        Ok(Self {
            world: destination.matrix_world,
            inverse,
        })
    }

    /// Frame carrying `object` into this space: `destination.world⁻¹ · object.world`.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::NonInvertibleTransform`] if `object`'s world
    /// matrix is singular.
    pub fn frame_for(&self, object: &MeshObject) -> RetargetResult<ObjectFrame> {
        let object_inv = object.matrix_world.try_inverse().ok_or_else(|| {
            RetargetError::NonInvertibleTransform {
                object: object.name.clone(),
            }
        })?;
        Ok(ObjectFrame {
            to_destination: self.inverse * object.matrix_world,
            from_destination: object_inv * self.world,
        })
    }
}

/// Pair of transforms between a dependent object's local frame and the
/// frame the field was fitted in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectFrame {
    to_destination: Matrix4<f64>,
    from_destination: Matrix4<f64>,
}

impl Default for ObjectFrame {
    fn default() -> Self {
        Self::identity()
    }
}

impl ObjectFrame {
    /// Object and destination frames coincide.
    #[must_use]
    pub fn identity() -> Self {
        Self {
            to_destination: Matrix4::identity(),
            from_destination: Matrix4::identity(),
        }
    }

    /// Frame mapping `object` into `destination`'s local space through
    /// world space: `destination.world⁻¹ · object.world`.
    ///
    /// # Errors
    ///
    /// Returns [`RetargetError::NonInvertibleDestination`] if `destination`'s
    /// world matrix cannot be inverted, or
    /// [`RetargetError::NonInvertibleTransform`] if `object`'s cannot.
    ///
    /// # Examples
    ///
    /// ```
    /// use mesh_retarget::ObjectFrame;
    /// use mesh_types::{IndexedMesh, MeshObject};
    /// use nalgebra::{Matrix4, Point3, Vector3};
    ///
    /// let dst = MeshObject::new("Body", IndexedMesh::new())
    ///     .with_matrix_world(Matrix4::new_translation(&Vector3::new(1.0, 0.0, 0.0)));
    /// let obj = MeshObject::new("Hat", IndexedMesh::new())
    ///     .with_matrix_world(Matrix4::new_translation(&Vector3::new(0.0, 2.0, 0.0)));
    ///
    /// let frame = ObjectFrame::between(&obj, &dst).unwrap();
    /// let p = frame.to_destination().transform_point(&Point3::origin());
    /// assert!((p - Point3::new(-1.0, 2.0, 0.0)).norm() < 1e-12);
    /// ```
    pub fn between(object: &MeshObject, destination: &MeshObject) -> RetargetResult<Self> {
        DestinationSpace::of(destination)?.frame_for(object)
    }

    /// Object local → destination local.
    #[must_use]
    pub const fn to_destination(&self) -> Matrix4<f64> {
        self.to_destination
    }

    /// Destination local → object local.
    #[must_use]
    pub const fn from_destination(&self) -> Matrix4<f64> {
        self.from_destination
    }

    /// Maps points evaluated in destination space back to the object.
    #[must_use]
    pub fn map_back(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points
            .iter()
            .map(|p| self.from_destination.transform_point(p))
            .collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use mesh_types::IndexedMesh;
    use nalgebra::Vector3;

    fn placed(name: &str, m: Matrix4<f64>) -> MeshObject {
        MeshObject::new(name, IndexedMesh::new()).with_matrix_world(m)
    }

    #[test]
    fn identity_frame() {
        let frame = ObjectFrame::default();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(frame.map_back(&[p]), vec![p]);
        assert_eq!(frame.to_destination(), Matrix4::identity());
    }

    #[test]
    fn round_trip_through_destination() {
        let dst = placed(
            "Body",
            Matrix4::new_nonuniform_scaling(&Vector3::new(2.0, 2.0, 2.0)),
        );
        let obj = placed(
            "Hat",
            Matrix4::new_rotation(Vector3::new(0.0, 0.0, 0.5))
                .append_translation(&Vector3::new(0.0, 0.0, 3.0)),
        );
        let frame = ObjectFrame::between(&obj, &dst).unwrap();

        let p = Point3::new(0.3, -0.2, 0.9);
        let there = frame.to_destination().transform_point(&p);
        let back = frame.map_back(&[there]);
        assert_relative_eq!(back[0], p, epsilon = 1e-12);

        // World positions agree.
        let world_obj = obj.matrix_world.transform_point(&p);
        let world_dst = dst.matrix_world.transform_point(&there);
        assert_relative_eq!(world_obj, world_dst, epsilon = 1e-12);
    }

    #[test]
    fn singular_world_matrix() {
        let dst = placed("Body", Matrix4::identity());
        let flat = placed(
            "Decal",
            Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0)),
        );
        assert_eq!(
            ObjectFrame::between(&flat, &dst).unwrap_err(),
            RetargetError::NonInvertibleTransform {
                object: "Decal".into()
            }
        );
        assert_eq!(
            ObjectFrame::between(&dst, &flat).unwrap_err(),
            RetargetError::NonInvertibleDestination {
                object: "Decal".into()
            }
        );
    }

    #[test]
    fn destination_space_is_shared() {
        let dst = placed(
            "Body",
            Matrix4::new_translation(&Vector3::new(0.0, 0.0, -1.0)),
        );
        let space = DestinationSpace::of(&dst).unwrap();

        for offset in [1.0, 4.0] {
            let obj = placed(
                "Hat",
                Matrix4::new_translation(&Vector3::new(offset, 0.0, 0.0)),
            );
            assert_eq!(
                space.frame_for(&obj).unwrap(),
                ObjectFrame::between(&obj, &dst).unwrap()
            );
            let p = space
                .frame_for(&obj)
                .unwrap()
                .to_destination()
                .transform_point(&Point3::origin());
            assert_relative_eq!(p, Point3::new(offset, 0.0, 1.0), epsilon = 1e-12);
        }
    }
}
