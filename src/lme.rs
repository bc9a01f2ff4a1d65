use crate::error::{AnalysisError, Result};
use nalgebra::{Cholesky, DMatrix, DVector};
use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, StudentsT};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedEffect {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    pub p_value: f64,
}

/// A converged REML fit. Non-convergence never reaches this type; it
/// surfaces as `AnalysisError::NonConvergence` from `fit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MixedModelFit {
    pub fixed: Vec<FixedEffect>,
    pub sigma2_residual: f64,
    pub sigma2_group1: f64,
    pub sigma2_group2: f64,
    pub r2_marginal: f64,
    pub r2_conditional: f64,
    pub reml_deviance: f64,
    pub n_obs: usize,
    pub iterations: usize,
}

impl MixedModelFit {
    pub fn effect(&self, name: &str) -> Option<&FixedEffect> {
        self.fixed.iter().find(|e| e.name == name)
    }
}

// Profiled quantities at a fixed pair of variance ratios
struct ProfiledFit {
    deviance: f64,
    beta: DVector<f64>,
    sigma2: f64,
    xtvix_inv: DMatrix<f64>,
}

/// Linear mixed model with two crossed random intercepts, fit by profiled
/// restricted maximum likelihood.
///
/// `x` carries the fixed-effects design (first column the intercept),
/// `names` one label per column. `group1`/`group2` assign each row to a
/// level of the two random factors (dense 0-based codes). The two variance
/// ratios are searched by Nelder-Mead on the log scale; hitting the
/// iteration cap before the simplex collapses is a hard error, not a
/// degraded fit.
pub fn fit(
    names: &[&str],
    x: &DMatrix<f64>,
    y: &[f64],
    group1: &[usize],
    group2: &[usize],
    max_iterations: usize,
    tolerance: f64,
) -> Result<MixedModelFit> {
    let n = y.len();
    let p = x.ncols();
    if n != x.nrows() || n != group1.len() || n != group2.len() {
        return Err(AnalysisError::InvalidInput(
            "design matrix, response, and grouping vectors must agree in length".to_string(),
        ));
    }
    if names.len() != p {
        return Err(AnalysisError::InvalidInput(
            "one name required per fixed-effect column".to_string(),
        ));
    }
    if n <= p + 2 {
        return Err(AnalysisError::InvalidInput(format!(
            "{n} observations cannot identify {p} fixed effects and two variance components"
        )));
    }

    let yv = DVector::from_column_slice(y);
    let zz1 = indicator_gram(group1, n);
    let zz2 = indicator_gram(group2, n);

    // Nelder-Mead over u = (ln theta1, ln theta2)
    let objective = |u: &[f64; 2]| -> f64 {
        match profiled_reml(x, &yv, &zz1, &zz2, u[0].exp(), u[1].exp()) {
            Some(fit) => fit.deviance,
            None => f64::INFINITY,
        }
    };

    let mut simplex: Vec<([f64; 2], f64)> = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]]
        .into_iter()
        .map(|u| (u, objective(&u)))
        .collect();

    let mut iterations = 0;
    let mut converged = false;
    while iterations < max_iterations {
        iterations += 1;
        simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        let spread = (simplex[2].1 - simplex[0].1).abs();
        let size = simplex[1..]
            .iter()
            .map(|(u, _)| {
                ((u[0] - simplex[0].0[0]).powi(2) + (u[1] - simplex[0].0[1]).powi(2)).sqrt()
            })
            .fold(0.0, f64::max);
        if spread < tolerance && size < tolerance.sqrt() {
            converged = true;
            break;
        }

        let best = simplex[0].0;
        let second = simplex[1].0;
        let worst = simplex[2];
        let centroid = [(best[0] + second[0]) / 2.0, (best[1] + second[1]) / 2.0];

        let reflect = [
            centroid[0] + (centroid[0] - worst.0[0]),
            centroid[1] + (centroid[1] - worst.0[1]),
        ];
        let f_reflect = objective(&reflect);

        if f_reflect < simplex[0].1 {
            let expand = [
                centroid[0] + 2.0 * (centroid[0] - worst.0[0]),
                centroid[1] + 2.0 * (centroid[1] - worst.0[1]),
            ];
            let f_expand = objective(&expand);
            simplex[2] = if f_expand < f_reflect { (expand, f_expand) } else { (reflect, f_reflect) };
        } else if f_reflect < simplex[1].1 {
            simplex[2] = (reflect, f_reflect);
        } else {
            let contract = [
                centroid[0] + 0.5 * (worst.0[0] - centroid[0]),
                centroid[1] + 0.5 * (worst.0[1] - centroid[1]),
            ];
            let f_contract = objective(&contract);
            if f_contract < worst.1 {
                simplex[2] = (contract, f_contract);
            } else {
                // shrink toward the best vertex
                for i in 1..3 {
                    let u = [
                        best[0] + 0.5 * (simplex[i].0[0] - best[0]),
                        best[1] + 0.5 * (simplex[i].0[1] - best[1]),
                    ];
                    simplex[i] = (u, objective(&u));
                }
            }
        }
    }

    if !converged {
        return Err(AnalysisError::NonConvergence { iterations });
    }

    simplex.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
    let u = simplex[0].0;
    let (theta1, theta2) = (u[0].exp(), u[1].exp());
    let fit = profiled_reml(x, &yv, &zz1, &zz2, theta1, theta2).ok_or_else(|| {
        AnalysisError::DegenerateStatistics {
            river: "model".to_string(),
            reason: "covariance matrix lost positive definiteness at the optimum".to_string(),
        }
    })?;

    let df = (n - p) as f64;
    let t_dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| AnalysisError::InvalidInput(format!("t distribution: {e}")))?;

    let mut fixed = Vec::with_capacity(p);
    for j in 0..p {
        let estimate = fit.beta[j];
        let std_error = (fit.sigma2 * fit.xtvix_inv[(j, j)]).sqrt();
        let t_value = estimate / std_error;
        let p_value = 2.0 * (1.0 - t_dist.cdf(t_value.abs()));
        fixed.push(FixedEffect {
            name: names[j].to_string(),
            estimate,
            std_error,
            t_value,
            p_value,
        });
    }

    let sigma2_residual = fit.sigma2;
    let sigma2_group1 = fit.sigma2 * theta1;
    let sigma2_group2 = fit.sigma2 * theta2;

    // Nakagawa-Schielzeth variance decomposition
    let fitted = x * &fit.beta;
    let fitted_mean = fitted.sum() / n as f64;
    let var_fixed = fitted.iter().map(|v| (v - fitted_mean).powi(2)).sum::<f64>() / n as f64;
    let total = var_fixed + sigma2_group1 + sigma2_group2 + sigma2_residual;
    let r2_marginal = var_fixed / total;
    let r2_conditional = (var_fixed + sigma2_group1 + sigma2_group2) / total;

    Ok(MixedModelFit {
        fixed,
        sigma2_residual,
        sigma2_group1,
        sigma2_group2,
        r2_marginal,
        r2_conditional,
        reml_deviance: fit.deviance,
        n_obs: n,
        iterations,
    })
}

// ZZ' for a random-intercept factor given dense level codes
fn indicator_gram(groups: &[usize], n: usize) -> DMatrix<f64> {
    DMatrix::from_fn(n, n, |i, j| if groups[i] == groups[j] { 1.0 } else { 0.0 })
}

// beta, sigma2, and -2 REML log-likelihood (up to a constant) at fixed
// variance ratios: V = I + theta1 Z1Z1' + theta2 Z2Z2'
fn profiled_reml(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    zz1: &DMatrix<f64>,
    zz2: &DMatrix<f64>,
    theta1: f64,
    theta2: f64,
) -> Option<ProfiledFit> {
    let n = y.len();
    let p = x.ncols();

    let mut v = DMatrix::identity(n, n);
    v += zz1 * theta1;
    v += zz2 * theta2;

    let v_chol = Cholesky::new(v)?;
    let vinv_x = v_chol.solve(x);
    let vinv_y = v_chol.solve(y);

    let xtvix = x.transpose() * &vinv_x;
    let xtvix_chol = Cholesky::new(xtvix.clone())?;
    let beta = xtvix_chol.solve(&(x.transpose() * &vinv_y));

    let resid = y - x * &beta;
    let vinv_r = v_chol.solve(&resid);
    let rss = resid.dot(&vinv_r);
    if rss <= 0.0 {
        return None;
    }
    let sigma2 = rss / (n - p) as f64;

    let ln_det_v = 2.0 * v_chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
    let ln_det_xtvix = 2.0 * xtvix_chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
    let deviance = (n - p) as f64 * sigma2.ln() + ln_det_v + ln_det_xtvix;

    let xtvix_inv = xtvix_chol.inverse();

    Some(ProfiledFit { deviance, beta, sigma2, xtvix_inv })
}
