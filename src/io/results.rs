use crate::data::{ErodibilityRecord, PhaseLagResult, Regulation};
use crate::model::ModelReport;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

// Per-river outputs of the estimator and calculator stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiverAnalysis {
    pub river: String,
    pub regulation: Regulation,
    pub phase_lag: PhaseLagResult,
    pub erodibility: Vec<ErodibilityRecord>,
}

/// Everything the figure generator consumes, persisted as one JSON object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResults {
    pub generated_at: String,
    pub rivers: Vec<RiverAnalysis>,
    // rivers that failed phase-lag estimation, with the reason; reported
    // here instead of silently defaulted
    pub failed_rivers: Vec<(String, String)>,
    pub model: Option<ModelReport>,
    pub dormancy_index: Option<f64>,
}

impl AnalysisResults {
    pub fn new(generated_at: String) -> Self {
        AnalysisResults {
            generated_at,
            rivers: Vec::new(),
            failed_rivers: Vec::new(),
            model: None,
            dormancy_index: None,
        }
    }

    pub fn add_river(
        &mut self,
        river: String,
        regulation: Regulation,
        phase_lag: PhaseLagResult,
        erodibility: Vec<ErodibilityRecord>,
    ) {
        self.rivers.push(RiverAnalysis { river, regulation, phase_lag, erodibility });
    }

    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, Box<dyn Error>> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}
