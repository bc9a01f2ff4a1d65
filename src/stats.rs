use serde::{Deserialize, Serialize};
use statrs::distribution::{ChiSquared, ContinuousCDF, Normal, StudentsT};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Correlation {
    pub rho: f64,
    pub p_value: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RankSumTest {
    pub u_statistic: f64,
    pub z: f64,
    pub p_value: f64,
    pub n1: usize,
    pub n2: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChiSquaredTest {
    pub statistic: f64,
    pub p_value: f64,
    pub df: usize,
}

// Average ranks (ties share the mean of the ranks they would occupy)
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap_or(std::cmp::Ordering::Equal));

    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && values[order[j + 1]] == values[order[i]] {
            j += 1;
        }
        // ranks are 1-based; tied block [i, j] shares the average
        let avg = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg;
        }
        i = j + 1;
    }
    ranks
}

/// Spearman rank correlation with average-rank tie handling.
///
/// The p-value uses the t approximation t = rho * sqrt((n-2)/(1-rho^2)),
/// two-sided. Returns None when fewer than 3 pairs remain or either margin
/// has zero variance.
pub fn spearman(x: &[f64], y: &[f64]) -> Option<Correlation> {
    let n = x.len();
    if n != y.len() || n < 3 {
        return None;
    }
    let rx = average_ranks(x);
    let ry = average_ranks(y);
    let rho = pearson(&rx, &ry)?;

    let p_value = if rho.abs() >= 1.0 {
        0.0
    } else {
        let t = rho * ((n as f64 - 2.0) / (1.0 - rho * rho)).sqrt();
        let dist = StudentsT::new(0.0, 1.0, n as f64 - 2.0).ok()?;
        2.0 * (1.0 - dist.cdf(t.abs()))
    };

    Some(Correlation { rho, p_value, n })
}

// Plain Pearson r; None when either margin has zero variance
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len() as f64;
    let mx = x.iter().sum::<f64>() / n;
    let my = y.iter().sum::<f64>() / n;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    let mut sxy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        sxx += (xi - mx) * (xi - mx);
        syy += (yi - my) * (yi - my);
        sxy += (xi - mx) * (yi - my);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some(sxy / (sxx * syy).sqrt())
}

/// Two-sided Mann-Whitney rank-sum test, normal approximation with tie
/// correction and continuity correction. Returns None if either group is
/// empty or all values are identical.
pub fn rank_sum(a: &[f64], b: &[f64]) -> Option<RankSumTest> {
    let n1 = a.len();
    let n2 = b.len();
    if n1 == 0 || n2 == 0 {
        return None;
    }
    let n = n1 + n2;

    let mut pooled: Vec<f64> = Vec::with_capacity(n);
    pooled.extend_from_slice(a);
    pooled.extend_from_slice(b);
    let ranks = average_ranks(&pooled);

    let r1: f64 = ranks[..n1].iter().sum();
    let u = r1 - (n1 * (n1 + 1)) as f64 / 2.0;
    let mean_u = (n1 * n2) as f64 / 2.0;

    // tie correction term sum(t^3 - t) over tied groups
    let mut sorted = pooled.clone();
    sorted.sort_by(|p, q| p.partial_cmp(q).unwrap_or(std::cmp::Ordering::Equal));
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && sorted[j + 1] == sorted[i] {
            j += 1;
        }
        let t = (j - i + 1) as f64;
        tie_term += t * t * t - t;
        i = j + 1;
    }

    let nf = n as f64;
    let var_u = (n1 * n2) as f64 / 12.0 * ((nf + 1.0) - tie_term / (nf * (nf - 1.0)));
    if var_u <= 0.0 {
        return None;
    }

    let cc = 0.5_f64.min((u - mean_u).abs());
    let z = ((u - mean_u).abs() - cc) / var_u.sqrt();
    let dist = Normal::new(0.0, 1.0).ok()?;
    let p_value = 2.0 * (1.0 - dist.cdf(z));

    Some(RankSumTest { u_statistic: u, z, p_value, n1, n2 })
}

/// Pearson chi-squared test of independence on a 2x2 contingency table
/// [[a, b], [c, d]]. Returns None if any margin is empty.
pub fn chi_squared_2x2(table: [[f64; 2]; 2]) -> Option<ChiSquaredTest> {
    let row: [f64; 2] = [table[0][0] + table[0][1], table[1][0] + table[1][1]];
    let col: [f64; 2] = [table[0][0] + table[1][0], table[0][1] + table[1][1]];
    let total = row[0] + row[1];
    if total <= 0.0 || row.contains(&0.0) || col.contains(&0.0) {
        return None;
    }

    let mut statistic = 0.0;
    for i in 0..2 {
        for j in 0..2 {
            let expected = row[i] * col[j] / total;
            let diff = table[i][j] - expected;
            statistic += diff * diff / expected;
        }
    }

    let dist = ChiSquared::new(1.0).ok()?;
    let p_value = 1.0 - dist.cdf(statistic);
    Some(ChiSquaredTest { statistic, p_value, df: 1 })
}

// Linear-interpolation quantile (numpy default), q in [0, 1]
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    if lo == hi {
        Some(sorted[lo])
    } else {
        let frac = pos - lo as f64;
        Some(sorted[lo] * (1.0 - frac) + sorted[hi] * frac)
    }
}

pub fn median(values: &[f64]) -> Option<f64> {
    quantile(values, 0.5)
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

pub fn variance(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some(ss / (values.len() - 1) as f64)
}
