//! Test Batch Producer
//!
//! Generates random transaction batches as CSV and sends them to the
//! scoring service over NATS request/reply.

use anyhow::Context;
use fraud_batch_scoring::types::response::{ErrorResponse, ScoreResponse};
use rand::Rng;
use std::time::Duration;
use tracing::{error, info, warn};

const HEADER: [&str; 8] = [
    "TransactionID",
    "Amount",
    "Country",
    "PaymentType",
    "Currency",
    "MerchantCategory",
    "Hour",
    "CustomerAge",
];

/// Transaction row generator for testing
struct BatchGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl BatchGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Generate a random legitimate-looking row
    fn generate_legitimate(&mut self) -> Vec<String> {
        self.transaction_counter += 1;
        vec![
            format!("tx_{:012}", self.transaction_counter),
            format!("{:.2}", self.rng.gen_range(10.0..5000.0)),
            self.random_choice(&["France", "Germany", "Spain", "United Kingdom", "United States"])
                .to_string(),
            self.random_choice(&["Cash", "Debit Card", "Bank Transfer"]).to_string(),
            self.random_choice(&["EUR", "GBP", "USD"]).to_string(),
            self.random_choice(&["Grocery", "Restaurants", "Fashion", "Electronics"])
                .to_string(),
            self.rng.gen_range(7..23).to_string(),
            self.rng.gen_range(25..70).to_string(),
        ]
    }

    /// Generate a row that trips at least one fraud rule
    fn generate_suspicious(&mut self) -> Vec<String> {
        self.transaction_counter += 1;
        let amount = if self.rng.gen_bool(0.5) {
            self.rng.gen_range(13500.0..40000.0) // Over the limit
        } else {
            self.rng.gen_range(10.0..13500.0)
        };
        vec![
            format!("tx_{:012}", self.transaction_counter),
            format!("{:.2}", amount),
            self.random_choice(&["Morocco", "Pakistan", "United Arab Emirates"])
                .to_string(),
            self.random_choice(&["Check", "Credit Card"]).to_string(),
            self.random_choice(&["MAD", "PKR", "AED"]).to_string(),
            self.random_choice(&["Electronics", "Travel"]).to_string(),
            self.rng.gen_range(0..6).to_string(), // Night time
            self.rng.gen_range(18..30).to_string(),
        ]
    }

    /// One CSV batch with the given fraud mix
    fn generate_batch(&mut self, rows: usize, fraud_rate: f64) -> anyhow::Result<(Vec<u8>, usize)> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER)?;

        let mut suspicious = 0;
        for _ in 0..rows {
            let row = if self.rng.gen_bool(fraud_rate) {
                suspicious += 1;
                self.generate_suspicious()
            } else {
                self.generate_legitimate()
            };
            writer.write_record(&row)?;
        }

        let bytes = writer.into_inner().context("Failed to finish CSV batch")?;
        Ok((bytes, suspicious))
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("batch_producer=info".parse()?),
        )
        .init();

    info!("Starting Test Batch Producer");

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let nats_url = args.get(1).map(|s| s.as_str()).unwrap_or("nats://localhost:4222");
    let subject = args.get(2).map(|s| s.as_str()).unwrap_or("scoring.batches");
    let batches: u64 = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let rows: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(0.1);
    let delay_ms: u64 = args.get(6).and_then(|s| s.parse().ok()).unwrap_or(500);

    info!(
        nats_url = %nats_url,
        subject = %subject,
        batches = batches,
        rows = rows,
        fraud_rate = fraud_rate,
        delay_ms = delay_ms,
        "Configuration loaded"
    );

    // Connect to NATS
    let client = match async_nats::connect(nats_url).await {
        Ok(c) => {
            info!("Connected to NATS");
            c
        }
        Err(e) => {
            warn!(error = %e, "Failed to connect to NATS. Running in dry-run mode.");
            return run_dry_mode(batches, rows, fraud_rate).await;
        }
    };

    let mut generator = BatchGenerator::new();
    let mut scored = 0;
    let mut failed = 0;

    for i in 0..batches {
        let (payload, suspicious) = generator.generate_batch(rows, fraud_rate)?;

        let reply = client
            .request(subject.to_string(), payload.into())
            .await
            .context("Scoring request failed")?;

        match serde_json::from_slice::<ScoreResponse>(&reply.payload) {
            Ok(response) => {
                scored += 1;
                info!(
                    batch = i + 1,
                    batch_id = %response.batch_id,
                    rows = response.total_rows,
                    generated_suspicious = suspicious,
                    fraud = response.fraud_count,
                    fraud_percentage = response.fraud_percentage,
                    rule_fraud = ?response.rule_fraud_count,
                    "Batch scored"
                );
            }
            Err(_) => {
                failed += 1;
                match serde_json::from_slice::<ErrorResponse>(&reply.payload) {
                    Ok(e) => error!(batch = i + 1, kind = %e.kind, error = %e.error, "Batch rejected"),
                    Err(e) => error!(batch = i + 1, error = %e, "Unrecognised reply"),
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }

    info!(
        "Completed! Sent {} batches ({} scored, {} rejected)",
        batches, scored, failed
    );

    Ok(())
}

async fn run_dry_mode(batches: u64, rows: usize, fraud_rate: f64) -> anyhow::Result<()> {
    info!("Running in dry-run mode (no NATS connection)");

    let mut generator = BatchGenerator::new();

    for i in 0..batches {
        let (payload, suspicious) = generator.generate_batch(rows, fraud_rate)?;

        if i == 0 {
            info!("Sample batch:\n{}", String::from_utf8_lossy(&payload));
        } else {
            info!(batch = i + 1, rows = rows, suspicious = suspicious, "Generated batch");
        }
    }

    Ok(())
}
