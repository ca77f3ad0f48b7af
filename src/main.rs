//! Fraud Batch Scoring - Main Entry Point
//!
//! Serves batch scoring over NATS request/reply: CSV batches in, JSON
//! summaries out, plus read access to the latest scored batch.

use anyhow::{Context, Result};
use fraud_batch_scoring::{
    config::AppConfig,
    consumer::RequestConsumer,
    logging,
    metrics::{MetricsReporter, PipelineMetrics},
    models::ModelLoader,
    pipeline::ScoringPipeline,
    producer::ReplyPublisher,
    service::ScoringService,
    types::response::ScoreResponse,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = AppConfig::load()?;
    logging::init(&config.logging)?;

    info!("Starting Fraud Batch Scoring service");
    info!(
        "Scoring policy: unseen_category={:?}, count_source={:?}, rules_enabled={}",
        config.scoring.unseen_category,
        config.scoring.fraud_count_source,
        config.scoring.rules_enabled
    );

    // Artifacts are required; failing to load them is fatal
    let bundle = ModelLoader::with_threads(config.artifacts.onnx_threads)
        .load_bundle(&config.artifacts.bundle_path)
        .with_context(|| format!("Failed to load artifacts from {}", config.artifacts.bundle_path))?;
    let bundle = Arc::new(bundle);
    info!(classifier = bundle.classifier().name(), "Artifact bundle loaded");

    // Initialize metrics
    let metrics = Arc::new(PipelineMetrics::new());

    let pipeline =
        ScoringPipeline::new(bundle, config.scoring_options()).with_metrics(metrics.clone());
    let service = Arc::new(ScoringService::new(pipeline, config.pipeline.max_batch_bytes));

    // Connect to NATS
    let client = async_nats::connect(&config.nats.url)
        .await
        .with_context(|| format!("Failed to connect to NATS at {}", config.nats.url))?;
    info!("Connected to NATS at {}", config.nats.url);

    let publisher = ReplyPublisher::new(client.clone());

    // Read-side subjects
    let predictions = RequestConsumer::new(client.clone(), &config.nats.predictions_subject);
    let mut predictions_sub = predictions.subscribe().await?;
    {
        let service = service.clone();
        let publisher = publisher.clone();
        tokio::spawn(async move {
            while let Some(message) = predictions_sub.next().await {
                let sent = match service.handle_predictions() {
                    Ok(snapshot) => publisher.reply_json(&message, snapshot.as_ref()).await,
                    Err(e) => publisher.reply_error(&message, &e).await,
                };
                if let Err(e) = sent {
                    error!(error = %e, "Failed to reply with predictions");
                }
            }
        });
    }

    let export = RequestConsumer::new(client.clone(), &config.nats.export_subject);
    let mut export_sub = export.subscribe().await?;
    {
        let service = service.clone();
        let publisher = publisher.clone();
        tokio::spawn(async move {
            while let Some(message) = export_sub.next().await {
                let sent = match service.handle_export() {
                    Ok(csv) => publisher.reply_bytes(&message, csv).await,
                    Err(e) => publisher.reply_error(&message, &e).await,
                };
                if let Err(e) = sent {
                    error!(error = %e, "Failed to reply with export");
                }
            }
        });
    }

    let health = RequestConsumer::new(client.clone(), &config.nats.health_subject);
    let mut health_sub = health.subscribe().await?;
    {
        let service = service.clone();
        let publisher = publisher.clone();
        tokio::spawn(async move {
            while let Some(message) = health_sub.next().await {
                if let Err(e) = publisher.reply_json(&message, &service.handle_health()).await {
                    error!(error = %e, "Failed to reply to health check");
                }
            }
        });
    }

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let interval = config.pipeline.metrics_interval_secs;
    tokio::spawn(async move {
        let reporter = MetricsReporter::new(metrics_clone, interval);
        reporter.start().await;
    });

    // Semaphore to limit concurrent scoring
    let num_workers = config.pipeline.workers.max(1);
    let semaphore = Arc::new(Semaphore::new(num_workers));
    info!(
        "Starting scoring loop with {} parallel workers on subject {}",
        num_workers, config.nats.score_subject
    );

    let consumer = RequestConsumer::new(client.clone(), &config.nats.score_subject);
    let mut subscription = consumer.subscribe().await?;

    while let Some(message) = subscription.next().await {
        // Acquire permit (limits concurrent tasks)
        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            warn!("Worker pool closed, stopping");
            break;
        };

        let service = service.clone();
        let publisher = publisher.clone();

        tokio::spawn(async move {
            let start_time = Instant::now();
            let reply: std::result::Result<ScoreResponse, _> =
                service.handle_score(&message.payload);

            let sent = match &reply {
                Ok(response) => publisher.reply_json(&message, response).await,
                Err(e) => publisher.reply_error(&message, e).await,
            };
            if let Err(e) = sent {
                error!(error = %e, "Failed to publish scoring reply");
            }

            info!(
                success = reply.is_ok(),
                bytes = message.payload.len(),
                processing_time_us = start_time.elapsed().as_micros() as u64,
                "Scoring request handled"
            );

            // Release permit when done
            drop(permit);
        });
    }

    // Print final summary
    info!("Service shutting down...");
    metrics.print_summary();

    Ok(())
}
