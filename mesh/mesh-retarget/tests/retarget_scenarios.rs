//! End-to-end retarget scenarios.
//!
//! Run with: cargo test -p mesh-retarget --test retarget_scenarios

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]

use approx::assert_relative_eq;
use mesh_retarget::{
    Destination, RbfField, RbfKernel, RetargetConfig, RetargetError, RetargetParams,
    TargetOutcome, WriteMode, evaluate, retarget, solve_weights,
};
use mesh_types::{IndexedMesh, MeshObject, ShapeKey, Vertex};
use nalgebra::{Point3, Vector3};

// =============================================================================
// Fixtures
// =============================================================================

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

/// Points on a slightly irregular sphere, symmetric about x = 0.
fn lumpy_sphere(rings: usize, segments: usize) -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for r in 1..rings {
        let theta = std::f64::consts::PI * r as f64 / rings as f64;
        for s in 0..segments {
            let phi = std::f64::consts::TAU * s as f64 / segments as f64;
            let radius = 1.0 + 0.05 * (3.0 * theta).cos();
            points.push(Point3::new(
                radius * theta.sin() * phi.cos(),
                radius * theta.sin() * phi.sin(),
                radius * theta.cos(),
            ));
        }
    }
    points.push(Point3::new(0.0, 0.0, 1.05));
    points.push(Point3::new(0.0, 0.0, -1.05));
    points
}

fn inflate(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| {
            let bulge = 1.0 + 0.15 * (-p.coords.norm_squared()).exp();
            Point3::new(p.x * bulge, p.y * bulge, p.z + 0.1 * p.z.abs())
        })
        .collect()
}

/// Widens the top and lifts the whole shape.
fn taper(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| {
            let widen = 0.1f64.mul_add(p.z, 1.0);
            Point3::new(p.x * widen, p.y * widen, 1.05f64.mul_add(p.z, 0.02))
        })
        .collect()
}

// =============================================================================
// Core scenarios
// =============================================================================

#[test]
fn octahedron_uniform_scale_biharmonic() {
    let src = octahedron();
    let dst: Vec<_> = src.iter().map(|p| p * 1.1).collect();

    let weights = solve_weights(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
    assert_eq!(weights.nrows(), 10);

    let out = evaluate(&src, &src, RbfKernel::Biharmonic, 0.5, &weights).unwrap();
    for (p, q) in out.iter().zip(&dst) {
        assert_relative_eq!(p, q, epsilon = 1e-6);
    }

    let centroid = Point3::from(src.iter().map(|p| p.coords).sum::<Vector3<f64>>() / 6.0);
    let mapped = evaluate(&[centroid], &src, RbfKernel::Biharmonic, 0.5, &weights).unwrap();
    assert_relative_eq!(mapped[0], centroid * 1.1, epsilon = 1e-6);
}

#[test]
fn octahedron_scale_off_grid_points() {
    let src = octahedron();
    let dst: Vec<_> = src.iter().map(|p| p * 1.1).collect();
    let field = RbfField::fit(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();

    for q in [
        Point3::new(0.3, -0.2, 0.1),
        Point3::new(2.0, 2.0, -1.0),
        Point3::new(-0.5, 0.5, 0.5),
    ] {
        assert_relative_eq!(field.transform_point(&q), q * 1.1, epsilon = 1e-6);
    }
}

#[test]
fn every_kernel_interpolates_nonlinear_edit() {
    let src = lumpy_sphere(5, 8);
    let dst = inflate(&src);

    for kernel in RbfKernel::ALL {
        let field = RbfField::fit(&src, &dst, kernel, 0.5)
            .unwrap_or_else(|e| panic!("{kernel} failed to fit: {e}"));
        let out = field.evaluate(&src);
        for (p, q) in out.iter().zip(&dst) {
            assert_relative_eq!(p, q, epsilon = 1e-5, max_relative = 1e-5);
        }
    }
}

#[test]
fn invert_is_approximate_round_trip() {
    let src = lumpy_sphere(5, 8);
    let dst = inflate(&src);

    let forward = RbfField::fit(&src, &dst, RbfKernel::Biharmonic, 0.5).unwrap();
    let backward = RbfField::fit(&dst, &src, RbfKernel::Biharmonic, 0.5).unwrap();

    // Exact at the correspondence points.
    for p in &src {
        let back = backward.transform_point(&forward.transform_point(p));
        assert_relative_eq!(back, *p, epsilon = 1e-5);
    }

    // Only approximate in between.
    for q in [Point3::new(0.2, 0.1, -0.3), Point3::new(-0.4, 0.3, 0.2)] {
        let back = backward.transform_point(&forward.transform_point(&q));
        assert!((back - q).norm() < 0.05, "round trip drifted to {back}");
    }
}

// =============================================================================
// Error scenarios
// =============================================================================

#[test]
fn solve_errors() {
    assert_eq!(
        solve_weights(&[], &[], RbfKernel::Biharmonic, 0.5).unwrap_err(),
        RetargetError::EmptySource
    );

    let src = octahedron();
    assert_eq!(
        solve_weights(&src, &src[..4], RbfKernel::Biharmonic, 0.5).unwrap_err(),
        RetargetError::PointCountMismatch {
            source_points: 6,
            destination_points: 4
        }
    );

    let p = Point3::new(1.0, 1.0, 1.0);
    let collapsed = [p, p, p];
    for kernel in RbfKernel::ALL {
        assert!(matches!(
            solve_weights(&collapsed, &collapsed, kernel, 0.5),
            Err(RetargetError::SingularSystem(_))
        ));
    }
}

#[test]
fn singular_solve_writes_nothing() {
    let p = Point3::new(0.0, 0.0, 0.0);
    let source = MeshObject::new("Body", IndexedMesh::from_points(&[p; 5]));
    let destination = MeshObject::new(
        "BodyEdited",
        IndexedMesh::from_points(&[Point3::new(0.0, 0.0, 1.0); 5]),
    );
    let original = vec![Point3::new(3.0, 2.0, 1.0)];
    let mut targets = vec![MeshObject::new("Hat", IndexedMesh::from_points(&original))];

    let result = retarget(
        &source,
        Destination::Object(&destination),
        &mut targets,
        &RetargetParams::default(),
        &RetargetConfig::default(),
    );

    let err = result.unwrap_err();
    assert!(matches!(err, RetargetError::SingularSystem(_)));
    assert!(err.to_string().contains("different function or radius"));
    assert_eq!(targets[0].mesh.positions(), original);
}

// =============================================================================
// Orchestrated scenarios
// =============================================================================

#[test]
fn dense_body_with_clothing() {
    let body = lumpy_sphere(12, 24);
    let edited = inflate(&body);

    let source = MeshObject::new("Body", IndexedMesh::from_points(&body));
    let destination = MeshObject::new("BodyInflated", IndexedMesh::from_points(&edited));

    // A shirt hugging the body slightly outside it.
    let shirt: Vec<_> = lumpy_sphere(6, 12)
        .into_iter()
        .map(|p| Point3::from(p.coords * 1.05))
        .collect();
    let mut targets = vec![MeshObject::new("Shirt", IndexedMesh::from_points(&shirt))];

    let config = RetargetConfig::default().with_max_vertices(60, 240);
    let report = retarget(
        &source,
        Destination::Object(&destination),
        &mut targets,
        &RetargetParams::default(),
        &config,
    )
    .unwrap();

    let eligible = body.len();
    assert_eq!(report.stride, eligible.div_ceil(60));
    assert_eq!(report.sampled_points, eligible.div_ceil(report.stride));
    assert_eq!(report.retargeted_count(), 1);

    // Points sampled exactly follow the edit.
    let moved = targets[0].mesh.positions();
    assert_eq!(moved.len(), shirt.len());
    let lifted = moved
        .iter()
        .zip(&shirt)
        .filter(|(after, before)| before.z > 0.5 && after.z > before.z)
        .count();
    assert!(lifted > 0, "upper shirt vertices should move up with the body");
}

#[test]
fn dense_body_at_default_caps_fits_every_kernel() {
    // 1162 vertices: the default cap samples every other one.
    let body = lumpy_sphere(30, 40);
    let edited = taper(&body);
    assert_eq!(body.len(), 1162);

    let source = MeshObject::new("Body", IndexedMesh::from_points(&body));
    let destination = MeshObject::new("BodyTapered", IndexedMesh::from_points(&edited));
    let config = RetargetConfig::default();

    for kernel in RbfKernel::ALL {
        // A dependent identical to the body must land on the edit at every
        // sampled row.
        let mut targets = vec![MeshObject::new("Skin", IndexedMesh::from_points(&body))];
        let params = RetargetParams::default().with_kernel(kernel);
        let report = retarget(
            &source,
            Destination::Object(&destination),
            &mut targets,
            &params,
            &config,
        )
        .unwrap_or_else(|e| panic!("{kernel} failed on a dense body: {e}"));

        assert_eq!(report.stride, 2);
        assert_eq!(report.sampled_points, 581);
        assert_eq!(report.retargeted_count(), 1);

        let moved = targets[0].mesh.positions();
        for i in (0..body.len()).step_by(report.stride) {
            assert!(
                (moved[i] - edited[i]).norm() < 1e-6,
                "{kernel}: row {i} landed at {} instead of {}",
                moved[i],
                edited[i]
            );
        }
    }
}

#[test]
fn mirrored_shape_key_retarget() {
    // Asymmetric positions so mirrored rows do not duplicate sampled ones.
    let base: Vec<_> = (0..12)
        .map(|i| {
            let t = f64::from(i);
            Point3::new(0.3 + 0.1 * t, (0.7 * t).sin(), (0.4 * t).cos())
        })
        .collect();
    let mut body = MeshObject::new("Body", IndexedMesh::from_points(&base));
    body.mesh.set_shape_key(ShapeKey::new(
        "Shrink",
        base.iter().map(|p| Point3::from(p.coords * 0.9)).collect(),
    ));

    let mut targets = vec![
        MeshObject::new(
            "Glove",
            IndexedMesh::from_parts(vec![Vertex::from_coords(-0.8, 0.2, 0.1)], vec![]),
        ),
        MeshObject::new("Empty", IndexedMesh::new()),
    ];

    let params = RetargetParams::default()
        .with_mirror(true)
        .with_write_mode(WriteMode::ShapeKey);
    let report = retarget(
        &body,
        Destination::ShapeKey("Shrink"),
        &mut targets,
        &params,
        &RetargetConfig::default(),
    )
    .unwrap();

    assert_eq!(report.sampled_points, 12);
    assert_eq!(report.mirrored_points, 12);
    assert_eq!(report.correspondence_points(), 24);
    assert!(matches!(
        report.outcome("Empty"),
        Some(TargetOutcome::Skipped { .. })
    ));

    // Uniform scaling is linear, so mirrored data reproduces it everywhere,
    // including on the mirrored side where the glove lives.
    let key = targets[0].mesh.shape_key("Retarget_Body_Shrink").unwrap();
    assert_relative_eq!(
        key.positions[0],
        Point3::new(-0.72, 0.18, 0.09),
        epsilon = 1e-6
    );
    assert_eq!(targets[0].mesh.vertices[0].position, Point3::new(-0.8, 0.2, 0.1));
}

#[test]
fn inverted_retarget_undoes_forward() {
    let base = lumpy_sphere(5, 8);
    let edited = inflate(&base);
    let source = MeshObject::new("Body", IndexedMesh::from_points(&base));
    let destination = MeshObject::new("BodyInflated", IndexedMesh::from_points(&edited));

    // A dependent fit to the edited body, mapped back to the original.
    let mut targets = vec![MeshObject::new("Armor", IndexedMesh::from_points(&edited))];
    retarget(
        &source,
        Destination::Object(&destination),
        &mut targets,
        &RetargetParams::default().with_invert(true),
        &RetargetConfig::default(),
    )
    .unwrap();

    for (p, q) in targets[0].mesh.positions().iter().zip(&base) {
        assert_relative_eq!(p, q, epsilon = 1e-5);
    }
}
