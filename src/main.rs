use anyhow::{Context, Result};
use chrono::Local;
use indicatif::{ProgressBar, ProgressStyle};

use meander_rs::cli::get_args;
use meander_rs::config::{AnalysisParams, ColumnConfig, OutputFormat};
use meander_rs::covariates::build_model_dataset;
use meander_rs::data::Regulation;
use meander_rs::io::csv as table_io;
use meander_rs::io::results::AnalysisResults;
use meander_rs::planform::dormancy_index;
use meander_rs::synth::{SynthParams, generate_pair};
use meander_rs::{erodibility, model, phase_lag};

fn main() -> Result<()> {
    // Configuration
    let (data_dir, out_dir, synthetic, seed) = get_args();
    let column_config = ColumnConfig::new();
    let params = AnalysisParams::new();
    let output_format = OutputFormat::Both;

    // Load or generate inputs
    let (rivers, covariates) = if synthetic {
        println!("Generating synthetic dataset (seed {})...", seed);
        let synth_params = SynthParams { seed, ..SynthParams::default() };
        generate_pair(&synth_params)
    } else {
        println!("Loading input tables from {:?}...", data_dir);
        let rivers = table_io::load_rivers(&data_dir, &column_config)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to load rivers from {:?}", data_dir))?;
        let covariates = table_io::load_covariates(&data_dir, &column_config)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to load covariates from {:?}", data_dir))?;
        (rivers, covariates)
    };

    println!("\nAnalysis Configuration:");
    println!("  Rivers: {}", rivers.len());
    println!("  Candidate lags (widths): {:?}", params.candidate_lags_widths);
    println!("  Min paired observations: {}", params.min_paired_obs);
    println!("  Trim quantile: {}", params.trim_quantile);

    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("failed to create output directory {:?}", out_dir))?;

    // Create progress bar
    let pb = ProgressBar::new(rivers.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rivers ({eta})")?
            .progress_chars("#>-"),
    );

    // Phase lag + erodibility per river
    let mut results = AnalysisResults::new(Local::now().to_rfc3339());
    let mut per_river = Vec::new();
    let mut reg_rates = Vec::new();
    let mut unreg_rates = Vec::new();

    for river in &rivers {
        match phase_lag::estimate_phase_lag(river, &params) {
            Ok(lag_result) => {
                pb.println(format!(
                    "{}: optimal lag {:.1} widths (rho = {:.3}, p = {:.2e}, {} unmatched)",
                    river.id,
                    lag_result.optimal.lag_widths,
                    lag_result.optimal.rho,
                    lag_result.optimal.p_value,
                    lag_result.unmatched
                ));
                let records = erodibility::compute_erodibility(river, &lag_result, &params)
                    .with_context(|| format!("erodibility computation for {}", river.id))?;
                per_river.push((river.id.clone(), river.regulation, records.clone()));
                results.add_river(river.id.clone(), river.regulation, lag_result, records);
            }
            Err(e) => {
                eprintln!("{}: phase-lag estimation failed: {}", river.id, e);
                results.failed_rivers.push((river.id.clone(), e.to_string()));
            }
        }

        let rates: Vec<f64> = river.migration_samples().map(|m| m.rate_m_per_yr).collect();
        match river.regulation {
            Regulation::Regulated => reg_rates.extend(rates),
            Regulation::Unregulated => unreg_rates.extend(rates),
        }
        pb.inc(1);
    }
    pb.finish();

    if results.rivers.is_empty() {
        anyhow::bail!("phase-lag estimation failed for every river");
    }

    results.dormancy_index = dormancy_index(&reg_rates, &unreg_rates);
    if let Some(di) = results.dormancy_index {
        println!(
            "\nGeomorphic dormancy index: {:.3} ({:.0}% reduction in median migration rate)",
            di,
            (1.0 - di) * 100.0
        );
    }

    // Mixed-effects model
    println!("\nFitting mixed-effects model...");
    let dataset = build_model_dataset(&per_river, &covariates, &params);
    println!(
        "  {} rows, {} excluded for missing covariates",
        dataset.rows.len(),
        dataset.excluded_missing_covariate
    );

    let report = model::run(&dataset, &covariates, &params)
        .context("mixed-effects model fit")?;

    println!("\n  Fixed effects:");
    for effect in &report.fit.fixed {
        println!(
            "    {:<22} {:>10.4} (SE {:.4}, p = {:.3e})",
            effect.name, effect.estimate, effect.std_error, effect.p_value
        );
    }
    println!(
        "  R2 marginal = {:.3}, conditional = {:.3}",
        report.fit.r2_marginal, report.fit.r2_conditional
    );
    println!(
        "  Vegetation effect: unregulated {:.4}, regulated {:.4}, total {:.4}",
        report.vegetation.unregulated, report.vegetation.regulated, report.vegetation.total
    );
    if let Some(test) = &report.migration_rate_test {
        println!("  Migration rank-sum: U = {:.1}, p = {:.3e}", test.u_statistic, test.p_value);
    }
    if let Some(test) = &report.erodibility_test {
        println!("  Erodibility rank-sum: U = {:.1}, p = {:.3e}", test.u_statistic, test.p_value);
    }
    if let Some(test) = &report.flood_coupling_test {
        println!(
            "  Flood coupling chi-squared: {:.3} (df {}), p = {:.3e}",
            test.statistic, test.df, test.p_value
        );
    }

    // Write output tables
    if matches!(output_format, OutputFormat::Csv | OutputFormat::Both) {
        let mut lag_writer = table_io::create_phase_lag_writer(&out_dir.join("phase_lags.csv"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        let mut erod_writer = table_io::create_erodibility_writer(&out_dir.join("erodibility.csv"))
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        for river in &results.rivers {
            table_io::write_phase_lag(&mut lag_writer, &river.phase_lag)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
            table_io::write_erodibility(&mut erod_writer, &river.river, &river.erodibility)
                .map_err(|e| anyhow::anyhow!("{e}"))?;
        }
        lag_writer.flush().context("failed to flush phase-lag table")?;
        erod_writer.flush().context("failed to flush erodibility table")?;

        table_io::write_model_summary(&out_dir.join("model_summary.csv"), &report.fit)
            .map_err(|e| anyhow::anyhow!("{e}"))?;
    }

    results.model = Some(report);
    if matches!(output_format, OutputFormat::Json | OutputFormat::Both) {
        let results_path = out_dir.join(format!(
            "meander_results_{}.json",
            Local::now().format("%Y%m%d%H%M")
        ));
        results
            .save(&results_path)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("failed to write {:?}", results_path))?;
    }

    println!("\nAnalysis complete. Outputs written to {:?}", out_dir);
    Ok(())
}
