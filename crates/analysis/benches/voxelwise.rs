//! Benchmarks for the voxelwise driver

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ndarray::{Array, IxDyn};
use voxmeta_analysis::prelude::*;

fn create_group(label: &str, subjects: usize, size: usize, offset: f64) -> Group {
    // Varied per-subject cube (deterministic noise-like pattern)
    let obs = Array::from_shape_fn(IxDyn(&[subjects, size, size, size]), |idx| {
        let voxel = idx[1] * 31 + idx[2] * 7 + idx[3];
        let noise = ((idx[0] * 17 + voxel * 13) % 100) as f64 / 25.0;
        offset + (voxel % 50) as f64 / 10.0 + noise
    });
    Group::from_observations(label, obs).unwrap()
}

fn create_centers(size: usize) -> Centers {
    (0..4)
        .map(|c| {
            Center::new(
                format!("center_{c}"),
                vec![
                    create_group("patient", 12, size, 1.0 + c as f64 * 0.1),
                    create_group("control", 14, size, 0.0),
                ],
            )
            .unwrap()
        })
        .collect()
}

fn bench_voxelwise(c: &mut Criterion) {
    let mut group = c.benchmark_group("voxelwise");

    for size in [16, 32, 48].iter() {
        let centers = create_centers(*size);
        let experimental = Label::from("patient");
        let control = Label::from("control");

        for (name, model) in [("fixed", ModelKind::Fixed), ("random", ModelKind::Random)] {
            let params = MetaParams {
                model,
                ..Default::default()
            };
            group.bench_with_input(BenchmarkId::new(name, size), size, |b, _| {
                b.iter(|| {
                    voxelwise_meta_analysis(
                        black_box(&centers),
                        &experimental,
                        &control,
                        None,
                        params,
                    )
                    .unwrap()
                })
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_voxelwise);
criterion_main!(benches);
