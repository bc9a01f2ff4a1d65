use crate::config::AnalysisParams;
use crate::data::{Bend, PhaseLagCandidate, PhaseLagResult, RiverReach};
use crate::error::{AnalysisError, Result};
use crate::stats;
use std::collections::HashMap;

// Inferred sample spacing along a bend, from consecutive arc-length steps
fn sample_spacing(bend: &Bend) -> Option<f64> {
    if bend.curvature.len() < 2 {
        return None;
    }
    let diffs: Vec<f64> = bend
        .curvature
        .windows(2)
        .map(|w| w[1].arc_length_m - w[0].arc_length_m)
        .collect();
    let ds = stats::median(&diffs)?;
    if ds > 0.0 { Some(ds) } else { None }
}

/// Shift a river's curvature samples downstream by `lag_m` meters, keyed for
/// joining against migration records.
///
/// The shift is applied in whole sample steps at each bend's inferred
/// spacing; samples pushed past the bend's downstream end are dropped, never
/// wrapped or extrapolated. Returns (bend_id, sample_idx) -> lagged curvature.
pub fn lagged_curvature(river: &RiverReach, lag_m: f64) -> HashMap<(u32, usize), f64> {
    let mut lagged = HashMap::new();
    for bend in &river.bends {
        let Some(ds) = sample_spacing(bend) else { continue };
        let steps = (lag_m / ds).round() as usize;
        let max_idx = match bend.curvature.iter().map(|c| c.sample_idx).max() {
            Some(m) => m,
            None => continue,
        };
        for sample in &bend.curvature {
            let shifted = sample.sample_idx + steps;
            if shifted <= max_idx {
                lagged.insert((bend.id, shifted), sample.curvature);
            }
        }
    }
    lagged
}

// Inner join of migration records against a lagged curvature map; the second
// return value counts migration records that found no partner.
fn join_migration(
    river: &RiverReach,
    lagged: &HashMap<(u32, usize), f64>,
) -> (Vec<(f64, f64)>, usize) {
    let mut pairs = Vec::new();
    let mut unmatched = 0;
    for m in river.migration_samples() {
        match lagged.get(&(m.bend_id, m.sample_idx)) {
            Some(&curv) => pairs.push((m.rate_m_per_yr, curv)),
            None => unmatched += 1,
        }
    }
    (pairs, unmatched)
}

/// Search the candidate lags for the one maximizing the Spearman correlation
/// between migration rate and lagged curvature.
///
/// Selection takes the algebraic maximum rho, not the maximum magnitude;
/// ties go to the earliest candidate in the fixed order. Candidates with too
/// few joined pairs or a zero-variance margin are excluded from selection.
pub fn estimate_phase_lag(river: &RiverReach, params: &AnalysisParams) -> Result<PhaseLagResult> {
    if river.channel_width_m <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "river {} has non-positive channel width {}",
            river.id, river.channel_width_m
        )));
    }

    let mut candidates = Vec::new();
    let mut unmatched_by_lag = Vec::new();
    let mut any_pairs = false;

    for &widths in &params.candidate_lags_widths {
        let lag_m = widths * river.channel_width_m;
        let lagged = lagged_curvature(river, lag_m);
        let (pairs, unmatched) = join_migration(river, &lagged);
        if !pairs.is_empty() {
            any_pairs = true;
        }
        if pairs.len() < params.min_paired_obs {
            continue;
        }

        let rates: Vec<f64> = pairs.iter().map(|p| p.0).collect();
        let curvs: Vec<f64> = pairs.iter().map(|p| p.1).collect();
        let Some(corr) = stats::spearman(&rates, &curvs) else {
            continue;
        };

        candidates.push(PhaseLagCandidate {
            lag_m,
            lag_widths: widths,
            rho: corr.rho,
            p_value: corr.p_value,
            n_paired: corr.n,
        });
        unmatched_by_lag.push(unmatched);
    }

    // strict > keeps the first candidate on ties
    let mut best: Option<usize> = None;
    for (i, c) in candidates.iter().enumerate() {
        match best {
            Some(b) if candidates[b].rho >= c.rho => {}
            _ => best = Some(i),
        }
    }

    match best {
        Some(i) => Ok(PhaseLagResult {
            river: river.id.clone(),
            optimal: candidates[i],
            unmatched: unmatched_by_lag[i],
            candidates,
        }),
        None if !any_pairs => Err(AnalysisError::DataJoin { river: river.id.clone() }),
        None => Err(AnalysisError::DegenerateStatistics {
            river: river.id.clone(),
            reason: format!(
                "no candidate lag retained at least {} paired observations with variance",
                params.min_paired_obs
            ),
        }),
    }
}
