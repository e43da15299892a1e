//! Benchmarks for mesh-retarget operations.
//!
//! Run with: cargo bench -p mesh-retarget
//!
//! To compare against baseline:
//! 1. First run: cargo bench -p mesh-retarget -- --save-baseline main
//! 2. After changes: cargo bench -p mesh-retarget -- --baseline main

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mesh_retarget::{
    Destination, RbfField, RbfKernel, RetargetConfig, RetargetParams, retarget, solve_weights,
};
use mesh_types::{IndexedMesh, MeshObject};
use nalgebra::Point3;

// =============================================================================
// Test Point Generation
// =============================================================================

/// Points on a UV sphere with `rings - 1` latitude rings plus the poles.
fn create_sphere(rings: usize, segments: usize) -> Vec<Point3<f64>> {
    let mut points = Vec::with_capacity((rings - 1) * segments + 2);
    for r in 1..rings {
        let theta = std::f64::consts::PI * r as f64 / rings as f64;
        for s in 0..segments {
            let phi = std::f64::consts::TAU * s as f64 / segments as f64;
            points.push(Point3::new(
                theta.sin() * phi.cos(),
                theta.sin() * phi.sin(),
                theta.cos(),
            ));
        }
    }
    points.push(Point3::new(0.0, 0.0, 1.0));
    points.push(Point3::new(0.0, 0.0, -1.0));
    points
}

/// Widens the hips and lifts the shoulders.
fn edit(points: &[Point3<f64>]) -> Vec<Point3<f64>> {
    points
        .iter()
        .map(|p| {
            let hips = 1.0 + 0.2 * (-4.0 * (p.z + 0.3).powi(2)).exp();
            Point3::new(p.x * hips, p.y * hips, p.z + 0.05 * p.z.max(0.0))
        })
        .collect()
}

// =============================================================================
// Solve Benchmarks
// =============================================================================

fn bench_solve(c: &mut Criterion) {
    let mut group = c.benchmark_group("Solve");
    group.sample_size(20); // Dense LU dominates, reduce samples

    let test_cases = [
        ("sphere_86pt", create_sphere(8, 12)),
        ("sphere_362pt", create_sphere(16, 24)),
        ("sphere_1037pt", create_sphere(24, 45)),
    ];

    for (name, src) in &test_cases {
        let dst = edit(src);
        group.throughput(Throughput::Elements(src.len() as u64));

        for kernel in [RbfKernel::Biharmonic, RbfKernel::C2] {
            group.bench_with_input(
                BenchmarkId::new(kernel.identifier(), name),
                &(src, &dst),
                |b, (src, dst)| {
                    b.iter(|| solve_weights(black_box(src), black_box(dst), kernel, 0.5));
                },
            );
        }
    }

    group.finish();
}

// =============================================================================
// Evaluation Benchmarks
// =============================================================================

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("Evaluate");

    let src = create_sphere(16, 24);
    let dst = edit(&src);
    let Ok(field) = RbfField::fit(&src, &dst, RbfKernel::Biharmonic, 0.5) else {
        return;
    };

    for (name, query) in [
        ("query_1k", create_sphere(21, 50)),
        ("query_10k", create_sphere(71, 144)),
    ] {
        group.throughput(Throughput::Elements(query.len() as u64));

        group.bench_with_input(BenchmarkId::new("single_block", name), &query, |b, q| {
            b.iter(|| field.evaluate(black_box(q)));
        });
        group.bench_with_input(BenchmarkId::new("chunked_1024", name), &query, |b, q| {
            b.iter(|| field.evaluate_chunked(black_box(q), 1024));
        });
    }

    group.finish();
}

// =============================================================================
// Full Retarget Benchmarks
// =============================================================================

fn bench_retarget(c: &mut Criterion) {
    let mut group = c.benchmark_group("Retarget");
    group.sample_size(10);

    let body = create_sphere(48, 96);
    let source = MeshObject::new("Body", IndexedMesh::from_points(&body));
    let destination = MeshObject::new("BodyEdited", IndexedMesh::from_points(&edit(&body)));

    let clothing: Vec<_> = create_sphere(40, 80)
        .into_iter()
        .map(|p| Point3::from(p.coords * 1.02))
        .collect();
    let targets = vec![
        MeshObject::new("Shirt", IndexedMesh::from_points(&clothing)),
        MeshObject::new("Coat", IndexedMesh::from_points(&clothing)),
    ];

    group.throughput(Throughput::Elements(body.len() as u64));

    for (name, high_quality) in [("low_quality", false), ("high_quality", true)] {
        let params = RetargetParams::default().with_high_quality(high_quality);
        let config = RetargetConfig::default();
        group.bench_function(name, |b| {
            b.iter_batched(
                || targets.clone(),
                |mut targets| {
                    retarget(
                        black_box(&source),
                        Destination::Object(&destination),
                        &mut targets,
                        &params,
                        &config,
                    )
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

// =============================================================================
// Criterion Setup
// =============================================================================

criterion_group!(benches, bench_solve, bench_evaluate, bench_retarget);
criterion_main!(benches);
