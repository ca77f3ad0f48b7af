//! Deterministic fraud rule overlay.
//!
//! Rules are evaluated per record in priority order and the first match
//! wins. They read raw fields only and never consult the classifier.

use crate::types::record::{Batch, Record, Value};
use serde::{Deserialize, Serialize};

/// Which rule, if any, flagged a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleHit {
    /// Amount above the hard limit
    AmountLimit,
    /// Amount within the limit but from a high-risk country
    HighRiskCountry,
    /// Risky payment type paid in a risky currency
    PaymentCurrency,
    /// No rule matched
    Clear,
}

impl RuleHit {
    pub fn is_fraud(self) -> bool {
        !matches!(self, RuleHit::Clear)
    }

    /// 0/1 flag as exported
    pub fn flag(self) -> u8 {
        u8::from(self.is_fraud())
    }
}

/// Rule thresholds and sets
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuleOverlay {
    pub amount_limit: f64,
    pub high_risk_countries: Vec<String>,
    pub risky_payment_types: Vec<String>,
    pub risky_currencies: Vec<String>,
}

impl Default for RuleOverlay {
    fn default() -> Self {
        Self {
            amount_limit: 13500.0,
            high_risk_countries: vec!["Morocco".to_string(), "Pakistan".to_string()],
            risky_payment_types: vec!["Check".to_string(), "Credit Card".to_string()],
            risky_currencies: vec!["MAD".to_string(), "PKR".to_string(), "AED".to_string()],
        }
    }
}

/// Missing or unparseable amounts count as zero
fn amount(record: &Record) -> f64 {
    record.get("Amount").to_number().unwrap_or(0.0)
}

/// Trimmed text; missing fields are empty and never match a set
fn text(record: &Record, column: &str) -> String {
    match record.get(column) {
        Value::Missing => String::new(),
        value => value.to_text().trim().to_string(),
    }
}

fn contains(set: &[String], value: &str) -> bool {
    set.iter().any(|s| s == value)
}

impl RuleOverlay {
    /// Evaluate one record
    pub fn evaluate(&self, record: &Record) -> RuleHit {
        let amount = amount(record);

        if amount > self.amount_limit {
            RuleHit::AmountLimit
        } else if amount <= self.amount_limit
            && contains(&self.high_risk_countries, &text(record, "Country"))
        {
            RuleHit::HighRiskCountry
        } else if contains(&self.risky_payment_types, &text(record, "PaymentType"))
            && contains(&self.risky_currencies, &text(record, "Currency"))
        {
            RuleHit::PaymentCurrency
        } else {
            RuleHit::Clear
        }
    }

    /// Matched rule per record, in batch order
    pub fn hits(&self, batch: &Batch) -> Vec<RuleHit> {
        batch.records.iter().map(|r| self.evaluate(r)).collect()
    }

    /// 0/1 fraud flag per record, in batch order
    pub fn apply(&self, batch: &Batch) -> Vec<u8> {
        batch.records.iter().map(|r| self.evaluate(r).flag()).collect()
    }
}

/// Apply the default rule set to a batch
pub fn apply_rules(batch: &Batch) -> Vec<u8> {
    RuleOverlay::default().apply(batch)
}
