//! Confidence normalization
//!
//! Engines report confidence either as a fraction (0-1) or as a percentage
//! (0-100). Everything that leaves the pipeline uses whole percentages.

use serde::Serialize;

/// Qualitative confidence bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    VeryLow,
}

impl ConfidenceLevel {
    /// Bucket a normalized (0-100) confidence
    pub fn from_percentage(percentage: f64) -> Self {
        match percentage {
            p if p >= 80.0 => Self::High,
            p if p >= 60.0 => Self::Medium,
            p if p >= 40.0 => Self::Low,
            _ => Self::VeryLow,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::VeryLow => "Very low",
        }
    }
}

/// Normalize a raw confidence value into a whole percentage.
///
/// Values in `0..=1` are read as fractions, larger values as percentages.
/// Missing, non-finite and negative values map to 0; anything above 100 is
/// clamped.
pub fn normalize_confidence(value: Option<f64>) -> f64 {
    let Some(raw) = value.filter(|v| v.is_finite()) else {
        return 0.0;
    };

    if raw <= 0.0 {
        return 0.0;
    }

    let percentage = if raw <= 1.0 { raw * 100.0 } else { raw };
    percentage.round().min(100.0)
}

/// Normalize a value and bucket it in one step
pub fn classify_confidence(value: Option<f64>) -> (f64, ConfidenceLevel) {
    let percentage = normalize_confidence(value);
    (percentage, ConfidenceLevel::from_percentage(percentage))
}

/// Arithmetic mean, 0 for an empty slice
pub fn mean_confidence(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_fraction() {
        assert_eq!(normalize_confidence(Some(0.42)), 42.0);
        assert_eq!(normalize_confidence(Some(1.0)), 100.0);
    }

    #[test]
    fn test_normalize_percentage() {
        assert_eq!(normalize_confidence(Some(87.0)), 87.0);
        assert_eq!(normalize_confidence(Some(150.0)), 100.0);
    }

    #[test]
    fn test_normalize_missing_and_invalid() {
        assert_eq!(normalize_confidence(None), 0.0);
        assert_eq!(normalize_confidence(Some(f64::NAN)), 0.0);
        assert_eq!(normalize_confidence(Some(-3.0)), 0.0);
    }

    #[test]
    fn test_levels() {
        assert_eq!(classify_confidence(Some(0.95)).1, ConfidenceLevel::High);
        assert_eq!(classify_confidence(Some(65.0)).1, ConfidenceLevel::Medium);
        assert_eq!(classify_confidence(Some(0.41)).1, ConfidenceLevel::Low);
        assert_eq!(classify_confidence(None).1, ConfidenceLevel::VeryLow);
        assert_eq!(ConfidenceLevel::VeryLow.label(), "Very low");
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean_confidence(&[]), 0.0);
        assert_eq!(mean_confidence(&[80.0, 90.0, 100.0]), 90.0);
    }
}
