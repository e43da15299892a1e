//! Main retarget function.
//!
//! This module provides [`retarget`], which fits one deformation field
//! from a source mesh and its edited destination, then applies it to every
//! dependent mesh.

use crate::{
    Destination, DestinationSpace, MirrorAccumulator, ObjectFrame, RbfField, RetargetConfig, RetargetError,
    RetargetParams, RetargetReport, RetargetResult, SampleOptions, TargetOutcome, TargetReport,
    WriteMode, sample, stride_for_cap,
};
use mesh_types::{MeshObject, PointSource, ShapeKey};
use nalgebra::Point3;
use tracing::{debug, info, warn};

/// A fitted correspondence, ready to be applied to dependents.
#[derive(Debug, Clone)]
pub struct Correspondence {
    /// The fitted field.
    pub field: RbfField,
    /// Sampling stride used for source and destination.
    pub stride: usize,
    /// Rows read from the source before mirroring.
    pub sampled_points: usize,
    /// Mirrored rows appended to each side.
    pub mirrored_points: usize,
}

/// Fits the deformation field from `source` to `destination`.
///
/// This is the first half of [`retarget`]: sample both sides with the same
/// mask, stride and mirror state, swap them if inverting, and solve once.
///
/// # Errors
///
/// - [`RetargetError::EmptySource`] if the source mesh has no vertices
/// - [`RetargetError::MissingShapeKey`] if a destination shape key does not exist
/// - [`RetargetError::PointCountMismatch`] if vertex counts differ
/// - [`RetargetError::EmptySelection`] if selection-only leaves nothing to sample
/// - [`RetargetError::SingularSystem`] if the solve fails
/// - [`RetargetError::InvalidParameter`] for invalid parameters or configuration
pub fn fit_correspondence(
    source: &MeshObject,
    destination: Destination<'_>,
    params: &RetargetParams,
    config: &RetargetConfig,
) -> RetargetResult<Correspondence> {
    params.validate()?;
    config.validate()?;

    match destination {
        Destination::Object(obj) => fit_from(source, &obj.mesh, params, config),
        Destination::ShapeKey(name) => {
            let key = source
                .mesh
                .shape_key_source(name)
                .ok_or_else(|| RetargetError::MissingShapeKey {
                    name: name.to_string(),
                })?;
            fit_from(source, &key, params, config)
        }
    }
}

fn fit_from<D: PointSource + ?Sized>(
    source: &MeshObject,
    destination: &D,
    params: &RetargetParams,
    config: &RetargetConfig,
) -> RetargetResult<Correspondence> {
    let num_vertices = source.mesh.point_count();
    if num_vertices == 0 {
        return Err(RetargetError::EmptySource);
    }
    if num_vertices != destination.point_count() {
        return Err(RetargetError::PointCountMismatch {
            source_points: num_vertices,
            destination_points: destination.point_count(),
        });
    }

    let mask = params.only_selection.then(|| source.mesh.selection_mask());
    let eligible = mask
        .as_ref()
        .map_or(num_vertices, |m| m.iter().filter(|&&s| s).count());
    if eligible == 0 {
        return Err(RetargetError::EmptySelection);
    }
    let stride = stride_for_cap(eligible, config.vertex_cap(params.high_quality));
    debug!(
        eligible,
        vertices = num_vertices,
        stride,
        total = eligible.div_ceil(stride),
        "Sampling correspondence"
    );

    let mut options = SampleOptions::new().with_stride(stride);
    if let Some(mask) = &mask {
        options = options.with_mask(mask);
    }
    let mut mirror = params
        .mirror
        .then(|| MirrorAccumulator::new(config.mirror_axis));

    let src_pts = sample(&source.mesh, &options, mirror.as_mut())?;
    let dst_pts = sample(destination, &options, mirror.as_mut())?;
    if src_pts.len() != dst_pts.len() {
        return Err(RetargetError::PointCountMismatch {
            source_points: src_pts.len(),
            destination_points: dst_pts.len(),
        });
    }

    let sampled_points = src_pts.sampled_count();
    let mirrored_points = src_pts.mirrored_count();
    let (src_pts, dst_pts) = if params.invert {
        (dst_pts, src_pts)
    } else {
        (src_pts, dst_pts)
    };

    let field = RbfField::fit_with(
        src_pts.points(),
        dst_pts.points(),
        params.kernel,
        params.radius,
        &config.solve_options(),
    )?;

    Ok(Correspondence {
        field,
        stride,
        sampled_points,
        mirrored_points,
    })
}

/// Retargets dependent meshes to fit an edited version of `source`.
///
/// Fits a single field with [`fit_correspondence`] and applies it to every
/// object in `targets` other than the source and destination objects
/// themselves. Results are written according to
/// [`RetargetParams::write_mode`]; shape keys are named
/// `Retarget_<destination>` with `_<shape key>` appended for shape key
/// destinations.
///
/// Failures tied to one dependent (no vertices, non-invertible transform)
/// skip that dependent and are recorded in the report.
///
/// # Errors
///
/// - Any error from [`fit_correspondence`]
/// - [`RetargetError::NonInvertibleDestination`] if object transforms are
///   enabled and the destination's world matrix is singular
///
/// Nothing is written in either case.
///
/// # Examples
///
/// ```
/// use mesh_retarget::{retarget, Destination, RetargetConfig, RetargetParams};
/// use mesh_types::{IndexedMesh, MeshObject};
/// use nalgebra::Point3;
///
/// let base: Vec<_> = [
///     [1.0, 0.0, 0.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0],
///     [0.0, -1.0, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0, -1.0],
/// ]
/// .iter()
/// .map(|&[x, y, z]| Point3::new(x, y, z))
/// .collect();
/// let edited: Vec<_> = base.iter().map(|p| p * 2.0).collect();
///
/// let source = MeshObject::new("Body", IndexedMesh::from_points(&base));
/// let destination = MeshObject::new("BodyEdited", IndexedMesh::from_points(&edited));
/// let mut targets = vec![MeshObject::new(
///     "Ring",
///     IndexedMesh::from_points(&[Point3::new(0.5, 0.0, 0.0)]),
/// )];
///
/// let report = retarget(
///     &source,
///     Destination::Object(&destination),
///     &mut targets,
///     &RetargetParams::default(),
///     &RetargetConfig::default(),
/// )
/// .unwrap();
///
/// assert_eq!(report.retargeted_count(), 1);
/// assert!((targets[0].mesh.vertices[0].position.x - 1.0).abs() < 1e-6);
/// ```
pub fn retarget(
    source: &MeshObject,
    destination: Destination<'_>,
    targets: &mut [MeshObject],
    params: &RetargetParams,
    config: &RetargetConfig,
) -> RetargetResult<RetargetReport> {
    info!(
        source = %source.name,
        kernel = %params.kernel,
        radius = params.radius,
        targets = targets.len(),
        "Starting retarget"
    );

    let (dst_obj, key_name) = match destination {
        Destination::Object(obj) => (obj, None),
        Destination::ShapeKey(name) => (source, Some(name)),
    };
    let space = if params.use_object_transform {
        Some(DestinationSpace::of(dst_obj)?)
    } else {
        None
    };

    let correspondence = fit_correspondence(source, destination, params, config)?;
    let shape_key_name = match key_name {
        Some(key) => format!("Retarget_{}_{key}", dst_obj.name),
        None => format!("Retarget_{}", dst_obj.name),
    };

    let mut report = RetargetReport::new(params.kernel, correspondence.field.radius());
    report.stride = correspondence.stride;
    report.sampled_points = correspondence.sampled_points;
    report.mirrored_points = correspondence.mirrored_points;

    for target in targets.iter_mut() {
        if target.name == source.name || target.name == dst_obj.name {
            continue;
        }

        let outcome = match apply_to_target(
            target,
            space.as_ref(),
            &correspondence.field,
            params,
            config,
            &shape_key_name,
        ) {
            Ok(outcome) => outcome,
            Err(err) if err.is_target_local() => {
                warn!(object = %target.name, error = %err, "Skipping dependent mesh");
                TargetOutcome::Skipped {
                    reason: err.to_string(),
                }
            }
            Err(err) => return Err(err),
        };
        report.targets.push(TargetReport {
            name: target.name.clone(),
            outcome,
        });
    }

    info!(
        correspondence = report.correspondence_points(),
        retargeted = report.retargeted_count(),
        skipped = report.skipped_count(),
        "Retarget complete"
    );

    Ok(report)
}

fn apply_to_target(
    target: &mut MeshObject,
    space: Option<&DestinationSpace>,
    field: &RbfField,
    params: &RetargetParams,
    config: &RetargetConfig,
    shape_key_name: &str,
) -> RetargetResult<TargetOutcome> {
    let frame = match space {
        Some(space) => space.frame_for(target)?,
        None => ObjectFrame::identity(),
    };

    let options = SampleOptions::new().with_transform(frame.to_destination());
    let pts = sample(&target.mesh, &options, None)?;
    if pts.is_empty() {
        return Err(RetargetError::NoDependentPoints {
            target: target.name.clone(),
        });
    }

    let new_pts = frame.map_back(&field.evaluate_chunked(pts.points(), config.eval_chunk_rows));
    let max_displacement = max_displacement(&target.mesh.positions(), &new_pts);
    debug!(
        object = %target.name,
        vertices = new_pts.len(),
        max_displacement,
        "Evaluated dependent mesh"
    );

    let vertices = new_pts.len();
    match params.write_mode {
        WriteMode::Overwrite => target.mesh.set_positions(&new_pts),
        WriteMode::ShapeKey => target
            .mesh
            .set_shape_key(ShapeKey::new(shape_key_name, new_pts)),
    }

    Ok(TargetOutcome::Retargeted {
        vertices,
        max_displacement,
    })
}

fn max_displacement(before: &[Point3<f64>], after: &[Point3<f64>]) -> f64 {
    before
        .iter()
        .zip(after)
        .map(|(a, b)| (b - a).norm())
        .fold(0.0, f64::max)
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
    use crate::RbfKernel;
    use approx::assert_relative_eq;
    use mesh_types::{IndexedMesh, Vertex};
    use nalgebra::{Matrix4, Vector3};

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

    fn object(name: &str, points: &[Point3<f64>]) -> MeshObject {
        MeshObject::new(name, IndexedMesh::from_points(points))
    }

    fn translated(points: &[Point3<f64>], offset: Vector3<f64>) -> Vec<Point3<f64>> {
        points.iter().map(|p| p + offset).collect()
    }

    #[test]
    fn test_overwrite_translation() {
        let base = octahedron();
        let offset = Vector3::new(0.0, 0.0, 0.25);
        let source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, offset));
        let mut targets = vec![object("Shirt", &[Point3::new(0.3, 0.3, 0.3)])];

        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();

        assert_eq!(report.sampled_points, 6);
        assert_eq!(report.stride, 1);
        assert_relative_eq!(
            targets[0].mesh.vertices[0].position,
            Point3::new(0.3, 0.3, 0.55),
            epsilon = 1e-8
        );
        match report.outcome("Shirt").unwrap() {
            TargetOutcome::Retargeted {
                vertices,
                max_displacement,
            } => {
                assert_eq!(*vertices, 1);
                assert_relative_eq!(*max_displacement, 0.25, epsilon = 1e-8);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[test]
    fn test_shape_key_destination_and_write_mode() {
        let base = octahedron();
        let mut source = object("Body", &base);
        source.mesh.set_shape_key(ShapeKey::new(
            "Tall",
            base.iter().map(|p| Point3::new(p.x, p.y, p.z * 2.0)).collect(),
        ));
        let mut targets = vec![object("Boot", &[Point3::new(0.0, 0.0, 0.5)])];

        let params = RetargetParams::default().with_write_mode(WriteMode::ShapeKey);
        let report = retarget(
            &source,
            Destination::ShapeKey("Tall"),
            &mut targets,
            &params,
            &RetargetConfig::default(),
        )
        .unwrap();

        assert_eq!(report.retargeted_count(), 1);
        let mesh = &targets[0].mesh;
        assert_eq!(mesh.vertices[0].position, Point3::new(0.0, 0.0, 0.5));
        let key = mesh.shape_key("Retarget_Body_Tall").unwrap();
        assert_relative_eq!(key.positions[0], Point3::new(0.0, 0.0, 1.0), epsilon = 1e-8);
    }

    #[test]
    fn test_missing_shape_key() {
        let source = object("Body", &octahedron());
        let result = fit_correspondence(
            &source,
            Destination::ShapeKey("Nope"),
            &RetargetParams::default(),
            &RetargetConfig::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            RetargetError::MissingShapeKey {
                name: "Nope".into()
            }
        );
    }

    #[test]
    fn test_source_and_destination_are_not_dependents() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, Vector3::x()));
        let mut targets = vec![source.clone(), destination.clone(), object("Hat", &base)];

        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();

        assert_eq!(report.targets.len(), 1);
        assert_eq!(targets[0].mesh.positions(), base);
        assert_relative_eq!(targets[2].mesh.vertices[0].position.x, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn test_empty_dependent_is_skipped() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &base);
        let mut targets = vec![
            MeshObject::new("Empty", IndexedMesh::new()),
            object("Hat", &base),
        ];

        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();

        assert_eq!(report.retargeted_count(), 1);
        assert!(matches!(
            report.outcome("Empty"),
            Some(TargetOutcome::Skipped { .. })
        ));
    }

    #[test]
    fn test_object_transform_mode() {
        let base = octahedron();
        let scaled: Vec<_> = base.iter().map(|p| p * 2.0).collect();
        let source = object("Body", &base);
        let destination = object("BodyFat", &scaled)
            .with_matrix_world(Matrix4::new_translation(&Vector3::new(10.0, 0.0, 0.0)));

        // In world space the hat vertex sits on the destination's origin,
        // which a uniform scale leaves in place.
        let hat = object("Hat", &[Point3::new(-1.0, 0.0, 0.0)])
            .with_matrix_world(Matrix4::new_translation(&Vector3::new(11.0, 0.0, 0.0)));

        let mut with_transform = vec![hat.clone()];
        retarget(
            &source,
            Destination::Object(&destination),
            &mut with_transform,
            &RetargetParams::default().with_object_transform(true),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(
            with_transform[0].mesh.vertices[0].position,
            Point3::new(-1.0, 0.0, 0.0),
            epsilon = 1e-8
        );

        let mut local = vec![hat];
        retarget(
            &source,
            Destination::Object(&destination),
            &mut local,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_relative_eq!(
            local[0].mesh.vertices[0].position,
            Point3::new(-2.0, 0.0, 0.0),
            epsilon = 1e-8
        );
    }

    #[test]
    fn test_non_invertible_dependent_is_skipped() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &base);
        let flat = object("Decal", &[Point3::origin()])
            .with_matrix_world(Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 0.0, 1.0)));
        let mut targets = vec![flat];

        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default().with_object_transform(true),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_eq!(report.skipped_count(), 1);
    }

    #[test]
    fn test_non_invertible_destination_aborts() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, Vector3::z()))
            .with_matrix_world(Matrix4::new_nonuniform_scaling(&Vector3::new(1.0, 1.0, 0.0)));
        let original = [Point3::new(0.2, 0.1, 0.0)];
        let mut targets = vec![object("Hat", &original), object("Belt", &original)];

        let result = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default().with_object_transform(true),
            &RetargetConfig::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            RetargetError::NonInvertibleDestination {
                object: "BodyFat".into()
            }
        );
        assert!(targets.iter().all(|t| t.mesh.positions() == original));

        // Local-space retargeting never reads the destination's matrix.
        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_eq!(report.retargeted_count(), 2);
    }

    #[test]
    fn test_selection_only_sampling() {
        let base = octahedron();
        let mut source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, Vector3::z()));
        let mut targets = vec![object("Hat", &[Point3::origin()])];

        source.mesh.select_only(&[]);
        let params = RetargetParams::default().with_only_selection(true);
        let result = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &params,
            &RetargetConfig::default(),
        );
        assert_eq!(result.unwrap_err(), RetargetError::EmptySelection);
        assert_eq!(targets[0].mesh.vertices[0].position, Point3::origin());

        source.mesh.select_only(&[0, 2, 4, 5]);
        let corr = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &params,
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_eq!(corr.sampled_points, 4);
    }

    #[test]
    fn test_high_quality_changes_stride() {
        let points: Vec<_> = (0..40)
            .map(|i| {
                let t = f64::from(i);
                Point3::new(t.cos() * (1.0 + t * 0.05), t.sin(), t * 0.1)
            })
            .collect();
        let source = object("Body", &points);
        let destination = object("BodyFat", &translated(&points, Vector3::y()));
        let config = RetargetConfig::default().with_max_vertices(10, 20);

        let low = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &RetargetParams::default(),
            &config,
        )
        .unwrap();
        let high = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &RetargetParams::default().with_high_quality(true),
            &config,
        )
        .unwrap();

        assert_eq!(low.stride, 4);
        assert_eq!(low.sampled_points, 10);
        assert_eq!(high.stride, 2);
        assert_eq!(high.sampled_points, 20);
    }

    #[test]
    fn test_count_mismatch_and_empty_source() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &base[..5]);
        let result = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &RetargetParams::default(),
            &RetargetConfig::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            RetargetError::PointCountMismatch {
                source_points: 6,
                destination_points: 5
            }
        );

        let empty = MeshObject::new("Empty", IndexedMesh::new());
        let result = fit_correspondence(
            &empty,
            Destination::Object(&empty),
            &RetargetParams::default(),
            &RetargetConfig::default(),
        );
        assert_eq!(result.unwrap_err(), RetargetError::EmptySource);
    }

    #[test]
    fn test_mirror_doubles_correspondence() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, Vector3::new(0.0, 0.0, 0.1)));

        let corr = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &RetargetParams::default().with_mirror(true),
            &RetargetConfig::default(),
        );
        // ±x vertices reflect onto each other, duplicating rows.
        assert!(matches!(corr, Err(RetargetError::SingularSystem(_))));

        let mut shifted = base.clone();
        shifted[0] = Point3::new(1.5, 0.2, 0.0);
        let source = object("Body", &shifted);
        let destination = object("BodyFat", &translated(&shifted, Vector3::new(0.0, 0.0, 0.1)));
        let corr = fit_correspondence(
            &source,
            Destination::Object(&destination),
            &RetargetParams::default().with_mirror(true).with_kernel(RbfKernel::Linear),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert_eq!(corr.sampled_points, 6);
        assert_eq!(corr.mirrored_points, 2);
        assert_eq!(corr.field.reference_points().len(), 8);
    }

    #[test]
    fn test_invalid_params_rejected_before_sampling() {
        let base = octahedron();
        let source = object("Body", &base);
        let params = RetargetParams::default()
            .with_kernel(RbfKernel::Gaussian)
            .with_radius(0.0);
        let result = fit_correspondence(
            &source,
            Destination::Object(&source),
            &params,
            &RetargetConfig::default(),
        );
        assert!(matches!(result, Err(RetargetError::InvalidParameter(_))));
    }

    #[test]
    fn test_dependent_selection_is_preserved() {
        let base = octahedron();
        let source = object("Body", &base);
        let destination = object("BodyFat", &translated(&base, Vector3::x()));
        let hat = MeshObject::new(
            "Hat",
            IndexedMesh::from_parts(vec![Vertex::from_coords(0.0, 0.0, 0.0).with_selected(true)], vec![]),
        );
        let mut targets = vec![hat];

        retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &RetargetParams::default(),
            &RetargetConfig::default(),
        )
        .unwrap();
        assert!(targets[0].mesh.vertices[0].selected);
        assert_relative_eq!(targets[0].mesh.vertices[0].position.x, 1.0, epsilon = 1e-8);
    }
}
