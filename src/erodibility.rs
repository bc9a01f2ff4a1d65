use crate::config::AnalysisParams;
use crate::data::{ErodibilityRecord, PhaseLagResult, RiverReach};
use crate::error::{AnalysisError, Result};
use crate::phase_lag::lagged_curvature;
use crate::stats;

/// Per-bend erodibility coefficients at the river's optimal lag, one record
/// per bend and epoch.
///
/// Each surviving bend contributes the mean migration rate over the bend's
/// joined samples divided by the mean lagged curvature. Bends whose lagged
/// curvature is zero (or whose ratio is otherwise non-finite) contribute
/// nothing, not a sentinel. Outliers are trimmed in two passes: the
/// threshold comes from the full finite-ratio set of the river, then the
/// filter drops records whose |ratio| exceeds it. Re-applying the same
/// filter to the trimmed set removes no further records.
pub fn compute_erodibility(
    river: &RiverReach,
    phase_lag: &PhaseLagResult,
    params: &AnalysisParams,
) -> Result<Vec<ErodibilityRecord>> {
    let lagged = lagged_curvature(river, phase_lag.optimal.lag_m);

    let mut records = Vec::new();
    for bend in &river.bends {
        let mut epochs: Vec<u32> = bend.migration.iter().map(|m| m.epoch).collect();
        epochs.sort_unstable();
        epochs.dedup();

        for epoch in epochs {
            let mut curvs = Vec::new();
            let mut rates = Vec::new();
            for m in bend.migration.iter().filter(|m| m.epoch == epoch) {
                if let Some(&c) = lagged.get(&(m.bend_id, m.sample_idx)) {
                    curvs.push(c);
                    rates.push(m.rate_m_per_yr);
                }
            }
            if curvs.is_empty() {
                continue;
            }

            let mean_curv = stats::mean(&curvs).unwrap_or(0.0);
            let mean_rate = stats::mean(&rates).unwrap_or(0.0);
            let ratio = mean_rate / mean_curv;
            if !ratio.is_finite() {
                continue;
            }

            records.push(ErodibilityRecord {
                bend_id: bend.id,
                epoch,
                erodibility: ratio,
                migration_rate: mean_rate,
                lagged_curvature: mean_curv,
            });
        }
    }

    if records.is_empty() {
        return Err(AnalysisError::DegenerateStatistics {
            river: river.id.clone(),
            reason: "no bend produced a finite erodibility ratio".to_string(),
        });
    }

    let threshold = trim_threshold(&records, params.trim_quantile);
    Ok(apply_trim(records, threshold))
}

// Pass one: |E| quantile over the full finite-ratio set
pub fn trim_threshold(records: &[ErodibilityRecord], quantile: f64) -> Option<f64> {
    let magnitudes: Vec<f64> = records.iter().map(|r| r.erodibility.abs()).collect();
    stats::quantile(&magnitudes, quantile)
}

// Pass two: drop records strictly above the threshold. Records sitting
// exactly on it survive, so the filter is idempotent.
pub fn apply_trim(
    records: Vec<ErodibilityRecord>,
    threshold: Option<f64>,
) -> Vec<ErodibilityRecord> {
    let Some(threshold) = threshold else {
        return records;
    };
    records
        .into_iter()
        .filter(|r| r.erodibility.abs() <= threshold)
        .collect()
}
