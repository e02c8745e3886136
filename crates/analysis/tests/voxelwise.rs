//! Voxelwise scenario: a 2x2x2 volume, two centers, three selected voxels.

use ndarray::{Array, ArrayD, IxDyn};
use voxmeta_analysis::prelude::*;
use voxmeta_core::io::StudyRecord;

const SHAPE: [usize; 3] = [2, 2, 2];
const SELECTED: [[usize; 3]; 3] = [[0, 0, 1], [1, 0, 0], [1, 1, 1]];

/// `subjects` observations over the 2x2x2 grid, varying by subject and voxel
fn observations(subjects: usize, base: f64, spread: f64) -> ArrayD<f64> {
    Array::from_shape_fn(IxDyn(&[subjects, 2, 2, 2]), |idx| {
        let s = idx[0] as f64;
        let voxel = (idx[1] * 4 + idx[2] * 2 + idx[3]) as f64;
        base + 0.3 * voxel + spread * (s - (subjects as f64 - 1.0) / 2.0) * (1.0 + 0.1 * voxel)
    })
}

fn centers() -> Centers {
    let a = Center::new(
        "site_a",
        vec![
            Group::from_observations("patient", observations(5, 12.0, 1.0)).unwrap(),
            Group::from_observations("control", observations(6, 10.0, 1.4)).unwrap(),
        ],
    )
    .unwrap();
    let b = Center::new(
        "site_b",
        vec![
            Group::from_observations("patient", observations(4, 11.0, 2.0)).unwrap(),
            Group::from_observations("control", observations(7, 10.5, 0.8)).unwrap(),
        ],
    )
    .unwrap();
    Centers::new(vec![a, b])
}

fn mask() -> Mask {
    let mut values = ArrayD::<f64>::zeros(IxDyn(&SHAPE));
    for idx in SELECTED {
        values[&idx[..]] = 1.0;
    }
    Mask::from_array(values)
}

/// Table-mode result built from the per-voxel group statistics
fn table_result(centers: &Centers, voxel: [usize; 3], model: ModelKind) -> MetaResult {
    let flat = voxel[0] * 4 + voxel[1] * 2 + voxel[2];
    let records: Vec<StudyRecord> = centers
        .iter()
        .map(|center| {
            let e = center.group(&"patient".into()).unwrap().stats_at(flat).unwrap();
            let c = center.group(&"control".into()).unwrap().stats_at(flat).unwrap();
            StudyRecord {
                center: center.name().to_string(),
                mean1: e.mean,
                std1: e.std,
                count1: e.count,
                mean2: c.mean,
                std2: c.std,
                count2: c.count,
            }
        })
        .collect();

    let params = MetaParams {
        model,
        ..Default::default()
    };
    *table_meta_analysis(&records, params).unwrap().model.result()
}

#[test]
fn masked_voxels_match_table_mode() {
    let centers = centers();
    let mask = mask();

    for model in [ModelKind::Fixed, ModelKind::Random] {
        let params = MetaParams {
            model,
            chunk_size: 2,
            ..Default::default()
        };
        let out = voxelwise_meta_analysis(
            &centers,
            &"patient".into(),
            &"control".into(),
            Some(&mask),
            params,
        )
        .unwrap();

        assert_eq!(out.results.shape(), &[2, 2, 2, 8]);
        assert_eq!(out.selected, 3);
        assert_eq!(out.degenerate, 0);

        for i in 0..2 {
            for j in 0..2 {
                for k in 0..2 {
                    let voxel = [i, j, k];
                    let got: Vec<f64> = (0..8).map(|c| out.results[&[i, j, k, c][..]]).collect();

                    if SELECTED.contains(&voxel) {
                        let expected = table_result(&centers, voxel, model).to_array();
                        for (c, (g, e)) in got.iter().zip(expected).enumerate() {
                            assert!(
                                (g - e).abs() <= 1e-12 * e.abs().max(1.0),
                                "{model} voxel {voxel:?} channel {}: got {g}, expected {e}",
                                MetaChannel::ALL[c].name()
                            );
                        }
                    } else {
                        assert!(
                            got.iter().all(|&v| v == 0.0),
                            "{model} voxel {voxel:?} should be zero, got {got:?}"
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn unmasked_run_covers_every_voxel() {
    let out = VoxelwiseMeta
        .execute(
            VoxelwiseInput {
                centers: centers(),
                experimental: "patient".into(),
                control: "control".into(),
                mask: None,
            },
            MetaParams {
                mode: ProcessingMode::Sequential,
                ..Default::default()
            },
        )
        .unwrap();

    assert_eq!(out.selected, 8);
    let es = out.channel(MetaChannel::EffectSize);
    assert!(es.iter().all(|&v| v > 0.0), "patients sit above controls everywhere");
    let p = out.channel(MetaChannel::P);
    assert!(p.iter().all(|&v| (0.0..=1.0).contains(&v)));
}

#[test]
fn random_variance_not_below_fixed_anywhere() {
    let centers = centers();
    let run = |model| {
        voxelwise_meta_analysis(
            &centers,
            &"patient".into(),
            &"control".into(),
            None,
            MetaParams {
                model,
                ..Default::default()
            },
        )
        .unwrap()
    };
    let fixed = run(ModelKind::Fixed);
    let random = run(ModelKind::Random);

    let fv = fixed.channel(MetaChannel::Variance);
    let rv = random.channel(MetaChannel::Variance);
    for (f, r) in fv.iter().zip(rv.iter()) {
        assert!(r >= f, "random {r} < fixed {f}");
    }
}
