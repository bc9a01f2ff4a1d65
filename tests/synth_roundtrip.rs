use meander_rs::config::{AnalysisParams, ColumnConfig};
use meander_rs::data::MigrationSample;
use meander_rs::erodibility::compute_erodibility;
use meander_rs::io::csv::{load_covariates, load_rivers, save_rivers};
use meander_rs::io::results::AnalysisResults;
use meander_rs::phase_lag::estimate_phase_lag;
use meander_rs::synth::{generate_pair, SynthParams};
use std::fs;
use std::path::PathBuf;

fn scratch_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("meander_rs_{tag}_{}", std::process::id()));
    if dir.exists() {
        fs::remove_dir_all(&dir).unwrap();
    }
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn generated_pair_is_deterministic_per_seed() {
    let params = SynthParams::default();
    let (a, cov_a) = generate_pair(&params);
    let (b, cov_b) = generate_pair(&params);

    assert_eq!(a.len(), b.len());
    for (ra, rb) in a.iter().zip(b.iter()) {
        assert_eq!(ra.id, rb.id);
        assert_eq!(ra.bends.len(), rb.bends.len());
        for (ba, bb) in ra.bends.iter().zip(rb.bends.iter()) {
            for (ca, cb) in ba.curvature.iter().zip(bb.curvature.iter()) {
                assert_eq!(ca.curvature, cb.curvature);
            }
            for (ma, mb) in ba.migration.iter().zip(bb.migration.iter()) {
                assert_eq!(ma.rate_m_per_yr, mb.rate_m_per_yr);
            }
        }
    }
    assert_eq!(cov_a.delta_evi, cov_b.delta_evi);
    assert_eq!(cov_a.flow_cv, cov_b.flow_cv);

    let reseeded = SynthParams { seed: 43, ..SynthParams::default() };
    let (c, _) = generate_pair(&reseeded);
    let first_a = a[0].bends[0].migration[0].rate_m_per_yr;
    let first_c = c[0].bends[0].migration[0].rate_m_per_yr;
    assert_ne!(first_a, first_c);
}

#[test]
fn river_tables_survive_a_save_load_cycle() {
    let dir = scratch_dir("rivers");
    let config = ColumnConfig::new();
    let (rivers, _) = generate_pair(&SynthParams::default());

    save_rivers(&dir, &config, &rivers).unwrap();
    let loaded = load_rivers(&dir, &config).unwrap();

    assert_eq!(loaded.len(), rivers.len());
    for (orig, back) in rivers.iter().zip(loaded.iter()) {
        assert_eq!(orig.id, back.id);
        assert_eq!(orig.regulation, back.regulation);
        assert_eq!(orig.channel_width_m, back.channel_width_m);
        assert_eq!(orig.bends.len(), back.bends.len());
        for (bo, bb) in orig.bends.iter().zip(back.bends.iter()) {
            assert_eq!(bo.id, bb.id);
            assert_eq!(bo.curvature.len(), bb.curvature.len());
            for (co, cb) in bo.curvature.iter().zip(bb.curvature.iter()) {
                assert_eq!(co.sample_idx, cb.sample_idx);
                assert_eq!(co.arc_length_m, cb.arc_length_m);
                assert_eq!(co.curvature, cb.curvature);
            }
            // loader orders migration by (epoch, sample index)
            let mut mo: Vec<MigrationSample> = bo.migration.clone();
            mo.sort_by_key(|m| (m.epoch, m.sample_idx));
            assert_eq!(mo.len(), bb.migration.len());
            for (a, b) in mo.iter().zip(bb.migration.iter()) {
                assert_eq!(a.epoch, b.epoch);
                assert_eq!(a.sample_idx, b.sample_idx);
                assert_eq!(a.rate_m_per_yr, b.rate_m_per_yr);
            }
        }
    }

    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn missing_input_file_is_an_error() {
    let dir = scratch_dir("missing");
    let config = ColumnConfig::new();
    assert!(load_rivers(&dir, &config).is_err());
    assert!(load_covariates(&dir, &config).is_err());
    fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn results_json_round_trips() {
    let dir = scratch_dir("results");
    let params = AnalysisParams::default();
    let (rivers, _) = generate_pair(&SynthParams::default());

    let mut results = AnalysisResults::new("20260831".to_string());
    for river in &rivers {
        let lag = estimate_phase_lag(river, &params).unwrap();
        let records = compute_erodibility(river, &lag, &params).unwrap();
        results.add_river(river.id.clone(), river.regulation, lag, records);
    }
    results.failed_rivers.push(("sipsey".to_string(), "too few paired samples".to_string()));
    results.dormancy_index = Some(0.2);

    let path = dir.join("results.json");
    results.save(&path).unwrap();
    let loaded = AnalysisResults::load(&path).unwrap();

    assert_eq!(loaded.generated_at, results.generated_at);
    assert_eq!(loaded.rivers.len(), results.rivers.len());
    assert_eq!(loaded.failed_rivers, results.failed_rivers);
    assert_eq!(loaded.dormancy_index, Some(0.2));
    for (orig, back) in results.rivers.iter().zip(loaded.rivers.iter()) {
        assert_eq!(orig.river, back.river);
        assert_eq!(orig.phase_lag.optimal.lag_widths, back.phase_lag.optimal.lag_widths);
        assert_eq!(orig.erodibility.len(), back.erodibility.len());
    }

    fs::remove_dir_all(&dir).unwrap();
}
