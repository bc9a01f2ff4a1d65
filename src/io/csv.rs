use crate::config::ColumnConfig;
use crate::covariates::{CovariateTables, FlowObservation};
use crate::data::{
    Bend, CurvatureSample, ErodibilityRecord, MigrationSample, PhaseLagResult, Regulation,
    RiverReach,
};
use crate::lme::MixedModelFit;
use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};
use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// One row of the reach table
#[derive(Debug)]
struct ReachRow {
    river: String,
    regulated: bool,
    width_m: f64,
}

impl ReachRow {
    fn from_record(record: &StringRecord, idx: &ColumnIndices) -> Result<Self, Box<dyn Error>> {
        Ok(ReachRow {
            river: record[idx.a].trim().to_string(),
            regulated: matches!(record[idx.b].trim(), "1" | "true" | "regulated"),
            width_m: record[idx.c].trim().parse::<f64>()?,
        })
    }
}

// Resolved positions of up to four named columns
struct ColumnIndices {
    a: usize,
    b: usize,
    c: usize,
    d: usize,
}

fn column_indices(
    headers: &StringRecord,
    names: [&str; 4],
) -> Result<ColumnIndices, Box<dyn Error>> {
    let pos = |name: &str| -> Result<usize, Box<dyn Error>> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("missing column '{name}'").into())
    };
    Ok(ColumnIndices {
        a: pos(names[0])?,
        b: pos(names[1])?,
        c: pos(names[2])?,
        d: if names[3].is_empty() { 0 } else { pos(names[3])? },
    })
}

fn open_reader(path: &Path) -> Result<csv::Reader<BufReader<File>>, Box<dyn Error>> {
    if !path.exists() {
        return Err(format!("input file not found: {}", path.display()).into());
    }
    let file = File::open(path)?;
    Ok(ReaderBuilder::new()
        .has_headers(true)
        .delimiter(b',')
        .trim(csv::Trim::All)
        .from_reader(BufReader::new(file)))
}

/// Load the river reaches with their curvature profiles and migration
/// records from `reaches.csv`, `curvature.csv`, and `migration.csv` in
/// `dir`, with column names taken from the config.
pub fn load_rivers(dir: &Path, config: &ColumnConfig) -> Result<Vec<RiverReach>, Box<dyn Error>> {
    let mut rdr = open_reader(&dir.join("reaches.csv"))?;
    let idx = column_indices(
        rdr.headers()?,
        [config.river.as_str(), &config.regulation, &config.width, ""],
    )?;
    let mut reaches = Vec::new();
    for result in rdr.records() {
        reaches.push(ReachRow::from_record(&result?, &idx)?);
    }

    let mut curvature: HashMap<String, Vec<CurvatureSample>> = HashMap::new();
    let mut rdr = open_reader(&dir.join("curvature.csv"))?;
    let headers = rdr.headers()?.clone();
    let idx = column_indices(
        &headers,
        [config.river.as_str(), &config.bend, &config.sample, &config.arc_length],
    )?;
    let curv_col = headers
        .iter()
        .position(|h| h == config.curvature)
        .ok_or_else(|| format!("missing column '{}'", config.curvature))?;
    for result in rdr.records() {
        let record = result?;
        curvature
            .entry(record[idx.a].to_string())
            .or_default()
            .push(CurvatureSample {
                bend_id: record[idx.b].parse()?,
                sample_idx: record[idx.c].parse()?,
                arc_length_m: record[idx.d].parse()?,
                curvature: record[curv_col].parse()?,
            });
    }

    let mut migration: HashMap<String, Vec<MigrationSample>> = HashMap::new();
    let mut rdr = open_reader(&dir.join("migration.csv"))?;
    let headers = rdr.headers()?.clone();
    let idx = column_indices(
        &headers,
        [config.river.as_str(), &config.bend, &config.sample, &config.arc_length],
    )?;
    let rate_col = headers
        .iter()
        .position(|h| h == config.migration_rate)
        .ok_or_else(|| format!("missing column '{}'", config.migration_rate))?;
    let epoch_col = headers
        .iter()
        .position(|h| h == config.epoch)
        .ok_or_else(|| format!("missing column '{}'", config.epoch))?;
    for result in rdr.records() {
        let record = result?;
        migration
            .entry(record[idx.a].to_string())
            .or_default()
            .push(MigrationSample {
                bend_id: record[idx.b].parse()?,
                sample_idx: record[idx.c].parse()?,
                arc_length_m: record[idx.d].parse()?,
                rate_m_per_yr: record[rate_col].parse()?,
                epoch: record[epoch_col].parse()?,
            });
    }

    let mut rivers = Vec::with_capacity(reaches.len());
    for reach in reaches {
        let curv = curvature.remove(&reach.river).unwrap_or_default();
        let mig = migration.remove(&reach.river).unwrap_or_default();
        let rivers_bends = assemble_bends(curv, mig);
        println!(
            "Loaded river {}: {} bends, width {} m",
            reach.river,
            rivers_bends.len(),
            reach.width_m
        );
        rivers.push(RiverReach {
            id: reach.river,
            regulation: if reach.regulated {
                Regulation::Regulated
            } else {
                Regulation::Unregulated
            },
            channel_width_m: reach.width_m,
            bends: rivers_bends,
        });
    }
    Ok(rivers)
}

// Group flat sample tables into per-bend structures, ordered by bend id and
// sample index
fn assemble_bends(curvature: Vec<CurvatureSample>, migration: Vec<MigrationSample>) -> Vec<Bend> {
    let mut by_bend: HashMap<u32, Bend> = HashMap::new();
    for c in curvature {
        by_bend
            .entry(c.bend_id)
            .or_insert_with(|| Bend { id: c.bend_id, curvature: Vec::new(), migration: Vec::new() })
            .curvature
            .push(c);
    }
    for m in migration {
        by_bend
            .entry(m.bend_id)
            .or_insert_with(|| Bend { id: m.bend_id, curvature: Vec::new(), migration: Vec::new() })
            .migration
            .push(m);
    }

    let mut bends: Vec<Bend> = by_bend.into_values().collect();
    bends.sort_by_key(|b| b.id);
    for bend in &mut bends {
        bend.curvature.sort_by_key(|c| c.sample_idx);
        bend.migration.sort_by_key(|m| (m.epoch, m.sample_idx));
    }
    bends
}

/// Load the covariate tables from `evi.csv`, `clay.csv`, and `flows.csv` in
/// `dir`. Flow CV and the high-flow flags are derived from the raw
/// discharge series.
pub fn load_covariates(
    dir: &Path,
    config: &ColumnConfig,
) -> Result<CovariateTables, Box<dyn Error>> {
    let mut tables = CovariateTables::default();

    let mut rdr = open_reader(&dir.join("evi.csv"))?;
    let idx = column_indices(
        rdr.headers()?,
        [config.river.as_str(), &config.bend, &config.epoch, &config.delta_evi],
    )?;
    for result in rdr.records() {
        let record = result?;
        tables.delta_evi.insert(
            (record[idx.a].to_string(), record[idx.b].parse()?, record[idx.c].parse()?),
            record[idx.d].parse()?,
        );
    }

    let mut rdr = open_reader(&dir.join("clay.csv"))?;
    let idx = column_indices(rdr.headers()?, [config.river.as_str(), &config.bend, &config.clay, ""])?;
    for result in rdr.records() {
        let record = result?;
        tables.clay_pct.insert(
            (record[idx.a].to_string(), record[idx.b].parse()?),
            record[idx.c].parse()?,
        );
    }

    let mut rdr = open_reader(&dir.join("flows.csv"))?;
    let idx = column_indices(rdr.headers()?, [config.river.as_str(), &config.epoch, &config.flow, ""])?;
    let mut observations = Vec::new();
    for result in rdr.records() {
        let record = result?;
        observations.push(FlowObservation {
            river: record[idx.a].to_string(),
            epoch: record[idx.b].parse()?,
            discharge_cms: record[idx.c].parse()?,
        });
    }
    tables.ingest_flows(&observations);

    println!(
        "Loaded covariates: {} EVI, {} clay, {} flow observations",
        tables.delta_evi.len(),
        tables.clay_pct.len(),
        observations.len()
    );
    Ok(tables)
}

/// Write rivers back out as the three input tables (`reaches.csv`,
/// `curvature.csv`, `migration.csv`), so a synthetic dataset can be
/// persisted and re-loaded like real inputs.
pub fn save_rivers(
    dir: &Path,
    config: &ColumnConfig,
    rivers: &[RiverReach],
) -> Result<(), Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(dir.join("reaches.csv"))?;
    wtr.write_record([&config.river, &config.regulation, &config.width])?;
    for river in rivers {
        wtr.write_record(&[
            river.id.clone(),
            match river.regulation {
                Regulation::Regulated => "1".to_string(),
                Regulation::Unregulated => "0".to_string(),
            },
            river.channel_width_m.to_string(),
        ])?;
    }
    wtr.flush()?;

    let mut wtr = WriterBuilder::new().has_headers(true).from_path(dir.join("curvature.csv"))?;
    wtr.write_record([
        &config.river,
        &config.bend,
        &config.sample,
        &config.arc_length,
        &config.curvature,
    ])?;
    for river in rivers {
        for c in river.curvature_samples() {
            wtr.write_record(&[
                river.id.clone(),
                c.bend_id.to_string(),
                c.sample_idx.to_string(),
                c.arc_length_m.to_string(),
                c.curvature.to_string(),
            ])?;
        }
    }
    wtr.flush()?;

    let mut wtr = WriterBuilder::new().has_headers(true).from_path(dir.join("migration.csv"))?;
    wtr.write_record([
        &config.river,
        &config.bend,
        &config.sample,
        &config.arc_length,
        &config.migration_rate,
        &config.epoch,
    ])?;
    for river in rivers {
        for m in river.migration_samples() {
            wtr.write_record(&[
                river.id.clone(),
                m.bend_id.to_string(),
                m.sample_idx.to_string(),
                m.arc_length_m.to_string(),
                m.rate_m_per_yr.to_string(),
                m.epoch.to_string(),
            ])?;
        }
    }
    wtr.flush()?;
    Ok(())
}

// Create CSV writer with headers
pub fn create_phase_lag_writer(path: &Path) -> Result<Writer<File>, Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    wtr.write_record(["river", "lag_m", "lag_widths", "rho", "p_value", "n_paired", "selected"])?;
    Ok(wtr)
}

pub fn write_phase_lag(
    wtr: &mut Writer<File>,
    result: &PhaseLagResult,
) -> Result<(), Box<dyn Error>> {
    for c in &result.candidates {
        let selected = c.lag_widths == result.optimal.lag_widths;
        wtr.write_record(&[
            result.river.clone(),
            c.lag_m.to_string(),
            c.lag_widths.to_string(),
            c.rho.to_string(),
            c.p_value.to_string(),
            c.n_paired.to_string(),
            (selected as u8).to_string(),
        ])?;
    }
    Ok(())
}

pub fn create_erodibility_writer(path: &Path) -> Result<Writer<File>, Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    wtr.write_record([
        "river",
        "bend_id",
        "epoch",
        "erodibility",
        "migration_rate",
        "lagged_curvature",
    ])?;
    Ok(wtr)
}

pub fn write_erodibility(
    wtr: &mut Writer<File>,
    river: &str,
    records: &[ErodibilityRecord],
) -> Result<(), Box<dyn Error>> {
    for r in records {
        wtr.write_record(&[
            river.to_string(),
            r.bend_id.to_string(),
            r.epoch.to_string(),
            r.erodibility.to_string(),
            r.migration_rate.to_string(),
            r.lagged_curvature.to_string(),
        ])?;
    }
    Ok(())
}

pub fn write_model_summary(path: &Path, fit: &MixedModelFit) -> Result<(), Box<dyn Error>> {
    let mut wtr = WriterBuilder::new().has_headers(true).from_path(path)?;
    wtr.write_record(["term", "estimate", "std_error", "t_value", "p_value"])?;
    for effect in &fit.fixed {
        wtr.write_record(&[
            effect.name.clone(),
            effect.estimate.to_string(),
            effect.std_error.to_string(),
            effect.t_value.to_string(),
            effect.p_value.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
