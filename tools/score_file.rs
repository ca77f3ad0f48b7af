//! Offline scorer
//!
//! Scores a CSV or spreadsheet file with the configured artifacts and writes
//! the export CSV next to it (or to the given path).

use anyhow::Context;
use fraud_batch_scoring::{
    config::AppConfig, export, ingest, logging, models::ModelLoader, pipeline::ScoringPipeline,
    session::PredictionSession,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let Some(input) = args.get(1).map(PathBuf::from) else {
        anyhow::bail!("usage: score_file <input.csv|xlsx|xls> [output.csv] [config.toml]");
    };
    let config = match args.get(3) {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load().unwrap_or_default(),
    };
    logging::init(&config.logging)?;

    let bundle = ModelLoader::with_threads(config.artifacts.onnx_threads)
        .load_bundle(&config.artifacts.bundle_path)
        .with_context(|| format!("Failed to load artifacts from {}", config.artifacts.bundle_path))?;
    let pipeline = ScoringPipeline::new(Arc::new(bundle), config.scoring_options());

    let batch = ingest::read_path(&input)?;
    info!(path = %input.display(), rows = batch.len(), "Input loaded");

    let session = PredictionSession::new();
    let snapshot = pipeline.score_into_session(&batch, &session)?;

    for fallback in &snapshot.report.fallbacks {
        warn!(
            row = fallback.row,
            column = %fallback.column,
            original = %fallback.original,
            substitute = %fallback.substitute,
            "Unseen category substituted"
        );
    }

    let summary = &snapshot.summary;
    info!(
        total_rows = summary.total_rows,
        fraud_count = summary.fraud_count,
        legit_count = summary.legit_count,
        fraud_percentage = summary.fraud_percentage,
        model_fraud_count = summary.model_fraud_count,
        rule_fraud_count = ?summary.rule_fraud_count,
        count_source = ?summary.count_source,
        "Scoring summary"
    );

    let output = match args.get(2) {
        Some(path) => PathBuf::from(path),
        None => input
            .parent()
            .map(|dir| dir.join(export::default_file_name()))
            .unwrap_or_else(|| PathBuf::from(export::default_file_name())),
    };
    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    export::write_csv(&snapshot.scored, BufWriter::new(file))?;
    info!(path = %output.display(), "Predictions written");

    Ok(())
}
