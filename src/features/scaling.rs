//! Per-column scalers fit on training data.
//!
//! NaN values are ignored when fitting and pass through unchanged when
//! applied.

use serde::{Deserialize, Serialize};

/// A fitted affine transform `(x - offset) / scale` for one column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnScaler {
    /// Zero mean, unit (population) variance.
    Standard { mean: f64, scale: f64 },
    /// Maps the fitted range onto [0, 1].
    MinMax { min: f64, scale: f64 },
}

impl ColumnScaler {
    /// Fits a standardizing scaler. A constant column is centered only.
    pub fn fit_standard(values: &[f64]) -> Self {
        let observed: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if observed.is_empty() {
            return Self::Standard {
                mean: 0.0,
                scale: 1.0,
            };
        }

        let n = observed.len() as f64;
        let mean = observed.iter().sum::<f64>() / n;
        let variance = observed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        Self::Standard {
            mean,
            scale: non_zero(variance.sqrt()),
        }
    }

    /// Fits a min-max scaler. A constant column is shifted to zero only.
    pub fn fit_min_max(values: &[f64]) -> Self {
        let (min, max) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return Self::MinMax {
                min: 0.0,
                scale: 1.0,
            };
        }
        Self::MinMax {
            min,
            scale: non_zero(max - min),
        }
    }

    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Self::Standard { mean, scale } => (value - mean) / scale,
            Self::MinMax { min, scale } => (value - min) / scale,
        }
    }
}

fn non_zero(scale: f64) -> f64 {
    if scale == 0.0 || !scale.is_finite() {
        1.0
    } else {
        scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_scaler_uses_population_std() {
        let scaler = ColumnScaler::fit_standard(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert_eq!(
            scaler,
            ColumnScaler::Standard {
                mean: 5.0,
                scale: 2.0
            }
        );
        assert_eq!(scaler.apply(9.0), 2.0);
    }

    #[test]
    fn test_standard_scaler_constant_column() {
        let scaler = ColumnScaler::fit_standard(&[3.0, 3.0, f64::NAN]);
        assert_eq!(scaler.apply(3.0), 0.0);
        assert_eq!(scaler.apply(4.0), 1.0);
        assert!(scaler.apply(f64::NAN).is_nan());
    }

    #[test]
    fn test_min_max_scaler() {
        let scaler = ColumnScaler::fit_min_max(&[10.0, f64::NAN, 30.0, 20.0]);
        assert_eq!(scaler.apply(10.0), 0.0);
        assert_eq!(scaler.apply(20.0), 0.5);
        assert_eq!(scaler.apply(30.0), 1.0);
        // Values outside the training range are not clipped.
        assert_eq!(scaler.apply(40.0), 1.5);
    }

    #[test]
    fn test_min_max_scaler_degenerate_inputs() {
        assert_eq!(
            ColumnScaler::fit_min_max(&[]),
            ColumnScaler::MinMax {
                min: 0.0,
                scale: 1.0
            }
        );
        let constant = ColumnScaler::fit_min_max(&[7.0, 7.0]);
        assert_eq!(constant.apply(7.0), 0.0);
    }
}
