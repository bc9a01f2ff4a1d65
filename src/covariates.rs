use crate::config::AnalysisParams;
use crate::data::{ErodibilityRecord, ModelRow, Regulation};
use crate::stats;
use std::collections::HashMap;

/// Covariate lookups keyed the way the upstream ETL delivers them:
/// vegetation change per river/bend/epoch, flow statistics per river/epoch,
/// clay content per river/bend.
#[derive(Debug, Clone, Default)]
pub struct CovariateTables {
    pub delta_evi: HashMap<(String, u32, u32), f64>,
    pub flow_cv: HashMap<(String, u32), f64>,
    pub high_flow_epoch: HashMap<(String, u32), bool>,
    pub clay_pct: HashMap<(String, u32), f64>,
}

// One discharge observation inside an epoch, used to derive flow CV and the
// high-flow flag
#[derive(Debug, Clone)]
pub struct FlowObservation {
    pub river: String,
    pub epoch: u32,
    pub discharge_cms: f64,
}

impl CovariateTables {
    /// Derive flow CV and the high-flow flag from raw discharge series.
    ///
    /// The flood threshold is the 95th discharge percentile pooled over all
    /// rivers in the study, so a regulated reach whose peaks are clipped by
    /// the dam can genuinely lack high-flow epochs. An epoch is flagged when
    /// any of its observations reaches the threshold. CV is per river/epoch.
    pub fn ingest_flows(&mut self, observations: &[FlowObservation]) {
        let pooled: Vec<f64> = observations.iter().map(|o| o.discharge_cms).collect();
        let Some(p95) = stats::quantile(&pooled, 0.95) else { return };

        let mut by_river: HashMap<&str, Vec<&FlowObservation>> = HashMap::new();
        for obs in observations {
            by_river.entry(&obs.river).or_default().push(obs);
        }

        for (river, obs) in by_river {
            let mut epochs: Vec<u32> = obs.iter().map(|o| o.epoch).collect();
            epochs.sort_unstable();
            epochs.dedup();

            for epoch in epochs {
                let series: Vec<f64> = obs
                    .iter()
                    .filter(|o| o.epoch == epoch)
                    .map(|o| o.discharge_cms)
                    .collect();
                let mean = match stats::mean(&series) {
                    Some(m) if m > 0.0 => m,
                    _ => continue,
                };
                if let Some(var) = stats::variance(&series) {
                    self.flow_cv.insert((river.to_string(), epoch), var.sqrt() / mean);
                }
                let high = series.iter().any(|&q| q >= p95);
                self.high_flow_epoch.insert((river.to_string(), epoch), high);
            }
        }
    }
}

/// The model dataset plus the count of records dropped for missing
/// covariates (never imputed).
#[derive(Debug, Clone)]
pub struct ModelDataset {
    pub rows: Vec<ModelRow>,
    pub excluded_missing_covariate: usize,
}

/// Join erodibility records with the covariate tables into one row per
/// bend and epoch. A record missing any covariate is dropped and counted.
pub fn build_model_dataset(
    per_river: &[(String, Regulation, Vec<ErodibilityRecord>)],
    covariates: &CovariateTables,
    params: &AnalysisParams,
) -> ModelDataset {
    let mut rows = Vec::new();
    let mut excluded = 0;

    for (river, regulation, records) in per_river {
        for rec in records {
            let evi = covariates
                .delta_evi
                .get(&(river.clone(), rec.bend_id, rec.epoch));
            let cv = covariates.flow_cv.get(&(river.clone(), rec.epoch));
            let clay = covariates.clay_pct.get(&(river.clone(), rec.bend_id));

            match (evi, cv, clay) {
                (Some(&delta_evi), Some(&flow_cv), Some(&clay_pct)) => rows.push(ModelRow {
                    river: river.clone(),
                    bend_id: rec.bend_id,
                    epoch: rec.epoch,
                    regulation: *regulation,
                    log_erodibility: (rec.erodibility.abs() + params.log_offset).ln(),
                    migration_rate: rec.migration_rate,
                    delta_evi,
                    flow_cv,
                    clay_pct,
                }),
                _ => excluded += 1,
            }
        }
    }

    ModelDataset { rows, excluded_missing_covariate: excluded }
}
