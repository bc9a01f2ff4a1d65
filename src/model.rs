use crate::config::AnalysisParams;
use crate::covariates::{CovariateTables, ModelDataset};
use crate::data::Regulation;
use crate::error::{AnalysisError, Result};
use crate::lme::{self, MixedModelFit};
use crate::stats::{self, ChiSquaredTest, RankSumTest};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const FIXED_EFFECT_NAMES: [&str; 6] = [
    "intercept",
    "flow_cv",
    "delta_evi",
    "regulated",
    "clay_pct",
    "delta_evi:regulated",
];

/// Vegetation effect under each regulation condition. `total` is the sum of
/// the two, an additive decomposition tied to treatment coding of the
/// interaction, not a general formula.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VegetationEffects {
    pub unregulated: f64,
    pub regulated: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub fit: MixedModelFit,
    pub vegetation: VegetationEffects,
    pub migration_rate_test: Option<RankSumTest>,
    pub erodibility_test: Option<RankSumTest>,
    pub flood_coupling_test: Option<ChiSquaredTest>,
    pub excluded_missing_covariate: usize,
}

/// Fit the regulation model and run the auxiliary hypothesis tests.
///
/// log(|E| + offset) ~ flow_cv + delta_evi + regulated + clay_pct +
/// delta_evi:regulated, with random intercepts for bend and epoch, REML.
/// Callers see a report only when the fit converged; the auxiliary tests
/// are `None` when their preconditions fail (a one-group dataset, no flow
/// coverage), which is reported rather than fatal.
pub fn run(
    dataset: &ModelDataset,
    covariates: &CovariateTables,
    params: &AnalysisParams,
) -> Result<ModelReport> {
    let rows = &dataset.rows;
    if rows.is_empty() {
        return Err(AnalysisError::InvalidInput(
            "model dataset has no rows after covariate joins".to_string(),
        ));
    }

    let n = rows.len();
    let x = DMatrix::from_fn(n, FIXED_EFFECT_NAMES.len(), |i, j| {
        let row = &rows[i];
        let regulated = match row.regulation {
            Regulation::Regulated => 1.0,
            Regulation::Unregulated => 0.0,
        };
        match j {
            0 => 1.0,
            1 => row.flow_cv,
            2 => row.delta_evi,
            3 => regulated,
            4 => row.clay_pct,
            _ => row.delta_evi * regulated,
        }
    });
    let y: Vec<f64> = rows.iter().map(|r| r.log_erodibility).collect();

    let bend_codes = dense_codes(rows.iter().map(|r| (r.river.clone(), r.bend_id)));
    let epoch_codes = dense_codes(rows.iter().map(|r| r.epoch));

    let fit = lme::fit(
        &FIXED_EFFECT_NAMES,
        &x,
        &y,
        &bend_codes,
        &epoch_codes,
        params.max_reml_iterations,
        params.reml_tolerance,
    )?;

    let main = fit
        .effect("delta_evi")
        .map(|e| e.estimate)
        .unwrap_or(0.0);
    let interaction = fit
        .effect("delta_evi:regulated")
        .map(|e| e.estimate)
        .unwrap_or(0.0);
    let vegetation = VegetationEffects {
        unregulated: main,
        regulated: main + interaction,
        total: main + (main + interaction),
    };

    let (reg_rates, unreg_rates): (Vec<f64>, Vec<f64>) = split_by_regulation(rows, |r| r.migration_rate);
    let (reg_erod, unreg_erod): (Vec<f64>, Vec<f64>) = split_by_regulation(rows, |r| r.log_erodibility);

    let migration_rate_test = stats::rank_sum(&reg_rates, &unreg_rates);
    let erodibility_test = stats::rank_sum(&reg_erod, &unreg_erod);
    let flood_coupling_test = flood_coupling(dataset, covariates);

    Ok(ModelReport {
        fit,
        vegetation,
        migration_rate_test,
        erodibility_test,
        flood_coupling_test,
        excluded_missing_covariate: dataset.excluded_missing_covariate,
    })
}

fn split_by_regulation<F>(rows: &[crate::data::ModelRow], f: F) -> (Vec<f64>, Vec<f64>)
where
    F: Fn(&crate::data::ModelRow) -> f64,
{
    let mut reg = Vec::new();
    let mut unreg = Vec::new();
    for row in rows {
        match row.regulation {
            Regulation::Regulated => reg.push(f(row)),
            Regulation::Unregulated => unreg.push(f(row)),
        }
    }
    (reg, unreg)
}

fn dense_codes<K: std::hash::Hash + Eq>(keys: impl Iterator<Item = K>) -> Vec<usize> {
    let mut lookup: HashMap<K, usize> = HashMap::new();
    let mut codes = Vec::new();
    for key in keys {
        let next = lookup.len();
        codes.push(*lookup.entry(key).or_insert(next));
    }
    codes
}

/// 2x2 contingency between above-median-migration epochs and the presence
/// of a high-flow event in the epoch, pooled over rivers. Medians are taken
/// within each river so a fast river does not dominate a slow one.
fn flood_coupling(dataset: &ModelDataset, covariates: &CovariateTables) -> Option<ChiSquaredTest> {
    // per (river, epoch) mean migration rate
    let mut sums: HashMap<(String, u32), (f64, usize)> = HashMap::new();
    for row in &dataset.rows {
        let entry = sums.entry((row.river.clone(), row.epoch)).or_insert((0.0, 0));
        entry.0 += row.migration_rate;
        entry.1 += 1;
    }

    let mut by_river: HashMap<&str, Vec<f64>> = HashMap::new();
    for ((river, _), (sum, count)) in &sums {
        by_river.entry(river).or_default().push(sum / *count as f64);
    }
    let medians: HashMap<String, f64> = by_river
        .into_iter()
        .filter_map(|(river, rates)| stats::median(&rates).map(|m| (river.to_string(), m)))
        .collect();

    let mut table = [[0.0; 2]; 2];
    for ((river, epoch), (sum, count)) in &sums {
        let rate = sum / *count as f64;
        let Some(median) = medians.get(river) else { continue };
        let Some(high_flow) = covariates.high_flow_epoch.get(&(river.clone(), *epoch)) else {
            continue;
        };
        let above = usize::from(rate > *median);
        let flood = usize::from(*high_flow);
        table[above][flood] += 1.0;
    }

    stats::chi_squared_2x2(table)
}
