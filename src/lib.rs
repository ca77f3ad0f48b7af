//! Fraud Batch Scoring Library
//!
//! Scores uploaded batches of payment transactions with a pre-trained
//! encoder/scaler/classifier bundle, overlays deterministic fraud rules and
//! keeps the latest scored batch available for retrieval and export.

pub mod aggregator;
pub mod config;
pub mod consumer;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod producer;
pub mod reconciler;
pub mod rules;
pub mod service;
pub mod session;
pub mod types;

pub use aggregator::{summarize, ResultAggregator};
pub use config::AppConfig;
pub use consumer::RequestConsumer;
pub use error::{FeatureStage, PipelineError, ScoringError};
pub use models::{ArtifactBundle, InferenceEngine, ModelLoader};
pub use pipeline::{ScoredOutcome, ScoringOptions, ScoringPipeline};
pub use producer::ReplyPublisher;
pub use reconciler::SchemaReconciler;
pub use rules::{apply_rules, RuleHit, RuleOverlay};
pub use service::ScoringService;
pub use session::{PredictionSession, SessionSnapshot};
pub use types::{Batch, Record, ScoredBatch, Summary, Value};
