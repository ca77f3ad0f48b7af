//! Numeric feature scaler

use anyhow::{bail, Result};

/// Per-feature affine transform `(x - mean) / scale`
#[derive(Debug, Clone)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(feature_names: Vec<String>, mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        if feature_names.len() != mean.len() || feature_names.len() != scale.len() {
            bail!(
                "scaler declares {} features but has {} means and {} scales",
                feature_names.len(),
                mean.len(),
                scale.len()
            );
        }
        if mean.iter().chain(scale.iter()).any(|v| !v.is_finite()) {
            bail!("scaler parameters must be finite");
        }

        // Constant features were fitted with zero spread; leave them unscaled.
        let scale = scale
            .into_iter()
            .map(|s| if s == 0.0 { 1.0 } else { s })
            .collect();

        Ok(Self {
            feature_names,
            mean,
            scale,
        })
    }

    /// Expected numeric features, in declaration order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Scale one column of values for the feature at `index`
    pub fn transform_column(&self, index: usize, values: &mut [f64]) {
        let (mean, scale) = (self.mean[index], self.scale[index]);
        for v in values.iter_mut() {
            *v = (*v - mean) / scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_column() {
        let scaler = StandardScaler::new(
            vec!["Amount".to_string(), "Age".to_string()],
            vec![100.0, 40.0],
            vec![50.0, 10.0],
        )
        .unwrap();

        let mut amounts = vec![100.0, 200.0, f64::NAN];
        scaler.transform_column(0, &mut amounts);
        assert_eq!(amounts[0], 0.0);
        assert_eq!(amounts[1], 2.0);
        assert!(amounts[2].is_nan());

        let mut ages = vec![30.0];
        scaler.transform_column(1, &mut ages);
        assert_eq!(ages, vec![-1.0]);
    }

    #[test]
    fn test_zero_scale_is_identity_spread() {
        let scaler = StandardScaler::new(vec!["x".to_string()], vec![5.0], vec![0.0]).unwrap();
        let mut values = vec![7.0];
        scaler.transform_column(0, &mut values);
        assert_eq!(values, vec![2.0]);
    }

    #[test]
    fn test_rejects_mismatched_parameters() {
        assert!(StandardScaler::new(vec!["x".to_string()], vec![], vec![1.0]).is_err());
        assert!(StandardScaler::new(vec!["x".to_string()], vec![f64::NAN], vec![1.0]).is_err());
    }
}
