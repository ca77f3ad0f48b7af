//! Categorical label encoders
//!
//! Artifacts ship either one encoder per categorical column or a single
//! encoder shared by a list of columns. Both shapes implement
//! [`CategoricalEncoding`] and are chosen once when the bundle loads.

use anyhow::{bail, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// What to do with a label the encoder never saw during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenCategoryPolicy {
    /// Substitute the first vocabulary entry (code 0) and keep going
    #[default]
    FirstEntry,
    /// Fail the column transform
    Strict,
}

/// A label the encoder does not know, under the strict policy
#[derive(Error, Debug, Clone, PartialEq)]
#[error("column '{column}' row {row}: unseen label '{label}'")]
pub struct UnseenLabel {
    pub column: String,
    pub row: usize,
    pub label: String,
}

/// Ordered vocabulary with label -> index lookup
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    pub fn new(classes: Vec<String>) -> Result<Self> {
        if classes.is_empty() {
            bail!("encoder vocabulary is empty");
        }

        let mut index = HashMap::with_capacity(classes.len());
        for (code, label) in classes.iter().enumerate() {
            if index.insert(label.clone(), code).is_some() {
                bail!("duplicate label '{}' in encoder vocabulary", label);
            }
        }

        Ok(Self { classes, index })
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn code(&self, label: &str) -> Option<usize> {
        self.index.get(label).copied()
    }

    /// Label substituted for unseen values
    pub fn fallback_label(&self) -> &str {
        &self.classes[0]
    }
}

/// Codes for one column plus the rows that fell back
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedColumn {
    pub codes: Vec<i64>,
    /// `(row, original label)` for every substituted value
    pub fallbacks: Vec<(usize, String)>,
}

/// Capability shared by the per-column and shared encoder shapes
pub trait CategoricalEncoding: Send + Sync + fmt::Debug {
    /// Declared categorical columns, in declaration order
    fn columns(&self) -> Vec<&str>;

    /// Encoder responsible for `column`
    fn encoder_for(&self, column: &str) -> Option<&LabelEncoder>;

    /// Encode one column's text values.
    ///
    /// Returns `Ok(None)` when the column is not declared by this encoding.
    fn encode(
        &self,
        column: &str,
        values: &[String],
        policy: UnseenCategoryPolicy,
    ) -> Result<Option<EncodedColumn>, UnseenLabel> {
        let Some(encoder) = self.encoder_for(column) else {
            return Ok(None);
        };

        let mut encoded = EncodedColumn {
            codes: Vec::with_capacity(values.len()),
            fallbacks: Vec::new(),
        };

        for (row, label) in values.iter().enumerate() {
            match (encoder.code(label), policy) {
                (Some(code), _) => encoded.codes.push(code as i64),
                (None, UnseenCategoryPolicy::FirstEntry) => {
                    encoded.codes.push(0);
                    encoded.fallbacks.push((row, label.clone()));
                }
                (None, UnseenCategoryPolicy::Strict) => {
                    return Err(UnseenLabel {
                        column: column.to_string(),
                        row,
                        label: label.clone(),
                    });
                }
            }
        }

        Ok(Some(encoded))
    }
}

/// One encoder per categorical column
#[derive(Debug, Clone)]
pub struct PerColumnEncoders {
    encoders: Vec<(String, LabelEncoder)>,
}

impl PerColumnEncoders {
    pub fn new(encoders: Vec<(String, LabelEncoder)>) -> Self {
        Self { encoders }
    }
}

impl CategoricalEncoding for PerColumnEncoders {
    fn columns(&self) -> Vec<&str> {
        self.encoders.iter().map(|(c, _)| c.as_str()).collect()
    }

    fn encoder_for(&self, column: &str) -> Option<&LabelEncoder> {
        self.encoders
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, e)| e)
    }
}

/// A single encoder applied to every declared column
#[derive(Debug, Clone)]
pub struct SharedEncoder {
    columns: Vec<String>,
    encoder: LabelEncoder,
}

impl SharedEncoder {
    pub fn new(columns: Vec<String>, encoder: LabelEncoder) -> Self {
        Self { columns, encoder }
    }
}

impl CategoricalEncoding for SharedEncoder {
    fn columns(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    fn encoder_for(&self, column: &str) -> Option<&LabelEncoder> {
        self.columns
            .iter()
            .any(|c| c == column)
            .then_some(&self.encoder)
    }
}
