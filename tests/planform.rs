use meander_rs::error::AnalysisError;
use meander_rs::planform::{
    arc_length, compare_templates, curvature, dormancy_index, migration_rates,
};
use meander_rs::synth::generate_centerline;

#[test]
fn uniform_lateral_shift_gives_uniform_rate() {
    let t1: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 0.0)).collect();
    let t2: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 1.0)).collect();
    let rates = migration_rates(&t1, &t2, 10.0).unwrap();
    for r in rates {
        assert!((r - 0.1).abs() < 1e-12);
    }
}

#[test]
fn identical_centerlines_give_zero_rate() {
    let pts: Vec<(f64, f64)> = (0..10).map(|i| (i as f64, 2.0)).collect();
    let rates = migration_rates(&pts, &pts, 1.0).unwrap();
    assert!(rates.iter().all(|&r| r == 0.0));
}

#[test]
fn migration_rate_rejects_bad_input() {
    let a = vec![(0.0, 0.0), (1.0, 0.0)];
    let b = vec![(0.0, 0.0)];
    assert!(matches!(migration_rates(&a, &b, 1.0), Err(AnalysisError::InvalidInput(_))));
    assert!(matches!(migration_rates(&a, &a, -1.0), Err(AnalysisError::InvalidInput(_))));
    assert!(matches!(migration_rates(&a, &a, 0.0), Err(AnalysisError::InvalidInput(_))));
}

#[test]
fn straight_line_has_zero_curvature() {
    let pts: Vec<(f64, f64)> = (0..20).map(|i| (i as f64, 0.0)).collect();
    let curv = curvature(&pts, 5).unwrap();
    assert!(curv.iter().all(|&c| c.abs() < 1e-9));
}

#[test]
fn circle_curvature_is_inverse_radius() {
    let r = 10.0;
    let pts: Vec<(f64, f64)> = (0..20)
        .map(|i| {
            let theta = i as f64 * std::f64::consts::FRAC_PI_2 / 19.0;
            (r * theta.cos(), r * theta.sin())
        })
        .collect();
    let curv = curvature(&pts, 5).unwrap();
    // interior samples; the filled edges are less accurate
    let middle = &curv[5..15];
    let mean = middle.iter().sum::<f64>() / middle.len() as f64;
    assert!((mean - 1.0 / r).abs() < 0.05);
}

#[test]
fn curvature_rejects_short_centerlines() {
    let pts = vec![(0.0, 0.0), (1.0, 1.0)];
    assert!(matches!(curvature(&pts, 5), Err(AnalysisError::InvalidInput(_))));
}

#[test]
fn arc_length_is_cumulative_chord_length() {
    let pts = vec![(0.0, 0.0), (3.0, 4.0), (3.0, 10.0)];
    let s = arc_length(&pts);
    assert_eq!(s, vec![0.0, 5.0, 11.0]);
}

#[test]
fn suppressed_but_invariant_template_is_detected() {
    // same monotone template, regulated rates at 40% of unregulated
    let curvatures: Vec<f64> = (0..300).map(|i| 0.001 + i as f64 * 0.0005).collect();
    let unreg_rates: Vec<f64> = curvatures.iter().map(|c| 5.0 * c).collect();
    let reg_rates: Vec<f64> = curvatures.iter().map(|c| 2.0 * c).collect();

    let cmp =
        compare_templates(&curvatures, &reg_rates, &curvatures, &unreg_rates, 10).unwrap();
    assert!(cmp.template_correlation > 0.95);
    assert!((cmp.rate_suppression_factor - 0.4).abs() < 0.05);
}

#[test]
fn dormancy_index_is_median_ratio() {
    let reg = vec![0.1, 0.2, 0.3];
    let unreg = vec![0.4, 0.8, 1.2];
    let di = dormancy_index(&reg, &unreg).unwrap();
    assert!((di - 0.25).abs() < 1e-12);

    assert!(dormancy_index(&reg, &[0.0, 0.0, 0.0]).is_none());
}

#[test]
fn synthetic_centerline_is_deterministic_per_seed() {
    let a = generate_centerline(50, 40.0, 200.0, 7);
    let b = generate_centerline(50, 40.0, 200.0, 7);
    let c = generate_centerline(50, 40.0, 200.0, 8);
    assert_eq!(a, b);
    assert_ne!(a, c);
}
