use criterion::{criterion_group, criterion_main};

use nalgebra::Matrix4;
use octopick::octree::payload::{StaticMeshGeometryOctree, TriangleSet};
use octopick::octree::{Octree, OctreeBuildParameter, PickContext, Ray, V3c};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn random_triangle_soup(count: usize, seed: u64) -> TriangleSet {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut positions = Vec::with_capacity(count * 3);
    let mut indices = Vec::with_capacity(count * 3);
    for _ in 0..count {
        let anchor = V3c::new(
            rng.gen_range(0.0..500.0),
            rng.gen_range(0.0..500.0),
            rng.gen_range(0.0..500.0),
        );
        for _ in 0..3 {
            indices.push(positions.len() as u32);
            positions.push(
                anchor
                    + V3c::new(
                        rng.gen_range(0.0..5.0),
                        rng.gen_range(0.0..5.0),
                        rng.gen_range(0.0..5.0),
                    ),
            );
        }
    }
    TriangleSet::new(positions, indices)
}

fn criterion_benchmark(c: &mut criterion::Criterion) {
    let triangle_count = 50000;

    c.bench_function("octree build", |b| {
        let source = random_triangle_soup(triangle_count, 0xDEAD);
        b.iter(|| {
            let mut tree = Octree::new(source.clone(), OctreeBuildParameter::default());
            tree.build_tree();
            tree
        });
    });

    #[cfg(feature = "parallel")]
    c.bench_function("octree build parallel", |b| {
        let source = random_triangle_soup(triangle_count, 0xDEAD);
        let parameters = OctreeBuildParameter {
            enable_parallel_build: true,
            ..Default::default()
        };
        b.iter(|| {
            let mut tree = Octree::new(source.clone(), parameters);
            tree.build_tree();
            tree
        });
    });

    c.bench_function("static octree build", |b| {
        let source = random_triangle_soup(triangle_count, 0xDEAD);
        b.iter(|| {
            let mut tree =
                StaticMeshGeometryOctree::new(source.clone(), OctreeBuildParameter::default());
            tree.build_tree();
            tree
        });
    });

    c.bench_function("octree hit_test", |b| {
        let mut tree = Octree::new(
            random_triangle_soup(triangle_count, 0xDEAD),
            OctreeBuildParameter::default(),
        );
        tree.build_tree();
        let context = PickContext::default();
        let identity = Matrix4::identity();
        let viewport_size = 128;

        let mut hits = Vec::new();
        let mut stack = Vec::new();
        b.iter(|| {
            for y in 0..viewport_size {
                for x in 0..viewport_size {
                    let target = V3c::new(
                        x as f32 * 500. / viewport_size as f32,
                        y as f32 * 500. / viewport_size as f32,
                        250.,
                    );
                    let origin = V3c::new(250., 250., 1000.);
                    let ray = Ray::new(origin, (target - origin).normalized());
                    hits.clear();
                    tree.hit_test_with_stack(&context, &identity, &ray, &mut hits, &mut stack, None);
                }
            }
        });
    });

    c.bench_function("octree find_nearest_point", |b| {
        let mut tree = Octree::new(
            random_triangle_soup(triangle_count, 0xDEAD),
            OctreeBuildParameter::default(),
        );
        tree.build_tree();
        let mut rng = StdRng::seed_from_u64(0xF00D);

        b.iter(|| {
            let query = V3c::new(
                rng.gen_range(0.0..500.0),
                rng.gen_range(0.0..500.0),
                rng.gen_range(0.0..500.0),
            );
            let mut result = None;
            tree.find_nearest_point_from_point(&query, &mut result);
            result
        });
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
