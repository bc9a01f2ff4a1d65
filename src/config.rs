// Configuration structure for column name mapping
#[derive(Debug, Clone)]
pub struct ColumnConfig {
    pub river: String,
    pub bend: String,
    pub sample: String,
    pub arc_length: String,
    pub curvature: String,
    pub migration_rate: String,
    pub regulation: String,
    pub width: String,
    pub epoch: String,
    pub delta_evi: String,
    pub flow_cv: String,
    pub clay: String,
    pub flow: String,
}

impl ColumnConfig {
    pub fn new() -> Self {
        ColumnConfig {
            river: "river".to_string(),
            bend: "bend_id".to_string(),
            sample: "sample_idx".to_string(),
            arc_length: "arc_length_m".to_string(),
            curvature: "curvature".to_string(),
            migration_rate: "migration_rate".to_string(),
            regulation: "regulated".to_string(),
            width: "channel_width_m".to_string(),
            epoch: "epoch".to_string(),
            delta_evi: "delta_evi".to_string(),
            flow_cv: "flow_cv".to_string(),
            clay: "clay_pct".to_string(),
            flow: "discharge_cms".to_string(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self::new()
    }
}

// Output format configuration
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Csv,
    Json,
    Both,
}

// Tunable parameters for the phase-lag / erodibility / model stages
#[derive(Debug, Clone, Copy)]
pub struct AnalysisParams {
    // tested in this order; ties in rho go to the earliest
    pub candidate_lags_widths: [f64; 4],
    pub min_paired_obs: usize,
    // two-pass |erodibility| trim quantile
    pub trim_quantile: f64,
    // offset inside log(|E| + offset) for the model response
    pub log_offset: f64,
    pub max_reml_iterations: usize,
    pub reml_tolerance: f64,
}

impl AnalysisParams {
    pub fn new() -> Self {
        AnalysisParams {
            candidate_lags_widths: [1.5, 2.0, 2.5, 3.0],
            min_paired_obs: 10,
            trim_quantile: 0.99,
            log_offset: 1e-6,
            max_reml_iterations: 500,
            reml_tolerance: 1e-8,
        }
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::new()
    }
}
