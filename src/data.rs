use serde::{Deserialize, Serialize};

// Whether a reach sits downstream of flow-regulating dam infrastructure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Regulation {
    Regulated,
    Unregulated,
}

impl Regulation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Regulation::Regulated => "regulated",
            Regulation::Unregulated => "unregulated",
        }
    }
}

// One curvature sample along a bend, indexed by sample position and arc length
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CurvatureSample {
    pub bend_id: u32,
    pub sample_idx: usize,
    pub arc_length_m: f64,
    pub curvature: f64,
}

// One migration-rate sample, paired across the two centerline snapshots
// bounding an epoch
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MigrationSample {
    pub bend_id: u32,
    pub sample_idx: usize,
    pub arc_length_m: f64,
    pub rate_m_per_yr: f64,
    pub epoch: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bend {
    pub id: u32,
    pub curvature: Vec<CurvatureSample>,
    pub migration: Vec<MigrationSample>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverReach {
    pub id: String,
    pub regulation: Regulation,
    pub channel_width_m: f64,
    pub bends: Vec<Bend>,
}

impl RiverReach {
    pub fn curvature_samples(&self) -> impl Iterator<Item = &CurvatureSample> {
        self.bends.iter().flat_map(|b| b.curvature.iter())
    }

    pub fn migration_samples(&self) -> impl Iterator<Item = &MigrationSample> {
        self.bends.iter().flat_map(|b| b.migration.iter())
    }
}

// One tested spatial lag and its correlation statistics
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PhaseLagCandidate {
    pub lag_m: f64,
    pub lag_widths: f64,
    pub rho: f64,
    pub p_value: f64,
    pub n_paired: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseLagResult {
    pub river: String,
    pub candidates: Vec<PhaseLagCandidate>,
    pub optimal: PhaseLagCandidate,
    // migration records that found no curvature partner at the optimal lag
    pub unmatched: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ErodibilityRecord {
    pub bend_id: u32,
    pub epoch: u32,
    pub erodibility: f64,
    pub migration_rate: f64,
    pub lagged_curvature: f64,
}

// One row of the mixed-model dataset: a bend observed in one epoch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRow {
    pub river: String,
    pub bend_id: u32,
    pub epoch: u32,
    pub regulation: Regulation,
    pub log_erodibility: f64,
    pub migration_rate: f64,
    pub delta_evi: f64,
    pub flow_cv: f64,
    pub clay_pct: f64,
}
