use crate::error::{AnalysisError, Result};
use crate::stats;

/// Pointwise migration rates between two centerline snapshots (m/yr).
///
/// Positions are matched index-for-index; the rate is the Euclidean
/// displacement divided by the elapsed years.
pub fn migration_rates(
    positions_t1: &[(f64, f64)],
    positions_t2: &[(f64, f64)],
    years: f64,
) -> Result<Vec<f64>> {
    if positions_t1.len() != positions_t2.len() {
        return Err(AnalysisError::InvalidInput(format!(
            "centerline lengths differ: {} vs {}",
            positions_t1.len(),
            positions_t2.len()
        )));
    }
    if years <= 0.0 {
        return Err(AnalysisError::InvalidInput(format!(
            "time delta must be positive, got {years}"
        )));
    }

    Ok(positions_t1
        .iter()
        .zip(positions_t2.iter())
        .map(|(&(x1, y1), &(x2, y2))| ((x2 - x1).powi(2) + (y2 - y1).powi(2)).sqrt() / years)
        .collect())
}

/// Unsigned local curvature (1/m) along a centerline via the Menger
/// three-point formula over a sliding window. Edge samples take the
/// nearest interior value; near-collinear triangles yield zero.
pub fn curvature(positions: &[(f64, f64)], window: usize) -> Result<Vec<f64>> {
    let n = positions.len();
    if window < 3 {
        return Err(AnalysisError::InvalidInput(format!(
            "curvature window must be at least 3, got {window}"
        )));
    }
    if n < window {
        return Err(AnalysisError::InvalidInput(format!(
            "centerline has {n} points, fewer than window {window}"
        )));
    }

    let half = window / 2;
    let mut curvatures = vec![0.0; n];

    for i in half..n - half {
        let p1 = positions[i - half];
        let p2 = positions[i];
        let p3 = positions[i + half];

        let d12 = dist(p1, p2);
        let d23 = dist(p2, p3);
        let d31 = dist(p3, p1);
        let denom = d12 * d23 * d31;
        if denom > 1e-10 {
            let area =
                0.5 * ((p2.0 - p1.0) * (p3.1 - p1.1) - (p3.0 - p1.0) * (p2.1 - p1.1)).abs();
            curvatures[i] = 4.0 * area / denom;
        }
    }

    for i in 0..half {
        curvatures[i] = curvatures[half];
    }
    for i in n - half..n {
        curvatures[i] = curvatures[n - half - 1];
    }

    Ok(curvatures)
}

// Cumulative chord length, first sample at 0
pub fn arc_length(positions: &[(f64, f64)]) -> Vec<f64> {
    let mut s = Vec::with_capacity(positions.len());
    let mut total = 0.0;
    for (i, &p) in positions.iter().enumerate() {
        if i > 0 {
            total += dist(positions[i - 1], p);
        }
        s.push(total);
    }
    s
}

fn dist(a: (f64, f64), b: (f64, f64)) -> f64 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Binned curvature-to-migration template: bin edges span the 5th to 95th
/// curvature percentile, each bin reporting the mean and std of the rates
/// falling in it.
#[derive(Debug, Clone)]
pub struct MigrationTemplate {
    pub bin_centers: Vec<f64>,
    pub mean_rates: Vec<f64>,
    pub std_rates: Vec<f64>,
}

pub fn migration_template(
    curvatures: &[f64],
    rates: &[f64],
    bin_count: usize,
) -> Result<MigrationTemplate> {
    if curvatures.len() != rates.len() {
        return Err(AnalysisError::InvalidInput(
            "curvature and rate arrays must have the same length".to_string(),
        ));
    }

    let valid: Vec<(f64, f64)> = curvatures
        .iter()
        .zip(rates.iter())
        .filter(|(c, r)| c.is_finite() && r.is_finite())
        .map(|(&c, &r)| (c, r))
        .collect();
    if valid.len() < bin_count {
        return Err(AnalysisError::InvalidInput(format!(
            "only {} valid samples for {} bins",
            valid.len(),
            bin_count
        )));
    }

    let cs: Vec<f64> = valid.iter().map(|v| v.0).collect();
    let lo = stats::quantile(&cs, 0.05).unwrap_or(0.0);
    let hi = stats::quantile(&cs, 0.95).unwrap_or(1.0);
    let step = (hi - lo) / bin_count as f64;

    let mut bin_centers = Vec::with_capacity(bin_count);
    let mut mean_rates = vec![0.0; bin_count];
    let mut std_rates = vec![0.0; bin_count];

    for b in 0..bin_count {
        let left = lo + b as f64 * step;
        let right = left + step;
        bin_centers.push((left + right) / 2.0);

        let in_bin: Vec<f64> = valid
            .iter()
            .filter(|(c, _)| *c >= left && *c < right)
            .map(|(_, r)| *r)
            .collect();
        if !in_bin.is_empty() {
            let m = stats::mean(&in_bin).unwrap_or(0.0);
            mean_rates[b] = m;
            let var = in_bin.iter().map(|r| (r - m) * (r - m)).sum::<f64>() / in_bin.len() as f64;
            std_rates[b] = var.sqrt();
        }
    }

    Ok(MigrationTemplate { bin_centers, mean_rates, std_rates })
}

#[derive(Debug, Clone)]
pub struct TemplateComparison {
    pub regulated: MigrationTemplate,
    pub unregulated: MigrationTemplate,
    // Pearson r between the amplitude-normalized templates
    pub template_correlation: f64,
    // mean regulated rate / mean unregulated rate
    pub rate_suppression_factor: f64,
}

/// Compare the migration templates of the regulated and unregulated rivers:
/// a high template correlation with a low suppression factor means the
/// geometric blueprint survives regulation while the process rate does not.
pub fn compare_templates(
    regulated_curvatures: &[f64],
    regulated_rates: &[f64],
    unregulated_curvatures: &[f64],
    unregulated_rates: &[f64],
    bin_count: usize,
) -> Result<TemplateComparison> {
    let reg = migration_template(regulated_curvatures, regulated_rates, bin_count)?;
    let unreg = migration_template(unregulated_curvatures, unregulated_rates, bin_count)?;

    let reg_max = reg.mean_rates.iter().cloned().fold(f64::MIN, f64::max);
    let unreg_max = unreg.mean_rates.iter().cloned().fold(f64::MIN, f64::max);
    let reg_norm: Vec<f64> = reg.mean_rates.iter().map(|r| r / (reg_max + 1e-10)).collect();
    let unreg_norm: Vec<f64> =
        unreg.mean_rates.iter().map(|r| r / (unreg_max + 1e-10)).collect();

    let template_correlation = stats::pearson(&reg_norm, &unreg_norm).unwrap_or(0.0);

    let reg_mean = stats::mean(&reg.mean_rates).unwrap_or(0.0);
    let unreg_mean = stats::mean(&unreg.mean_rates).unwrap_or(0.0);
    let rate_suppression_factor = reg_mean / (unreg_mean + 1e-10);

    Ok(TemplateComparison {
        regulated: reg,
        unregulated: unreg,
        template_correlation,
        rate_suppression_factor,
    })
}

/// Ratio of median regulated to median unregulated migration rate.
/// 0 means complete dormancy, 1 means regulation has no effect.
pub fn dormancy_index(regulated_rates: &[f64], unregulated_rates: &[f64]) -> Option<f64> {
    let reg = stats::median(regulated_rates)?;
    let unreg = stats::median(unregulated_rates)?;
    if unreg > 0.0 { Some(reg / unreg) } else { None }
}
