//! Token estimation.
//!
//! The budget layer never tokenizes for real. It estimates from character
//! counts using a fixed characters-per-token ratio per content type, which
//! keeps estimation pure and cheap. Anything that needs exact counts can
//! implement [`TokenEstimator`] over a real tokenizer and be passed in
//! wherever an estimator is accepted.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of text being estimated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Source code, JSON, and other symbol-dense text.
    Code,
    /// Natural language.
    Prose,
    /// Anything else.
    #[default]
    Mixed,
}

impl ContentType {
    /// Characters per token for this content type.
    pub fn chars_per_token(self) -> f64 {
        match self {
            Self::Code => 3.0,
            Self::Prose => 4.0,
            Self::Mixed => 3.5,
        }
    }

    /// Name used in configuration and on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Prose => "prose",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "code" => Ok(Self::Code),
            "prose" => Ok(Self::Prose),
            "mixed" => Ok(Self::Mixed),
            other => Err(format!(
                "unknown content type '{}', expected code, prose or mixed",
                other
            )),
        }
    }
}

/// Converts text into an approximate token count.
///
/// Implementations must be pure: the same input always yields the same count.
pub trait TokenEstimator: Send + Sync {
    /// Estimate the number of tokens in `text`.
    fn estimate(&self, text: &str, content_type: ContentType) -> usize;
}

/// Character-ratio estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator {
    /// Overrides the per-content-type ratio when set.
    calibrated_chars_per_token: Option<f64>,
}

impl HeuristicEstimator {
    /// Create an estimator using the fixed per-content-type ratios.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an estimator with a calibrated chars-per-token ratio, e.g. one
    /// derived from provider-reported usage. Non-positive ratios are ignored.
    pub fn with_calibration(chars_per_token: Option<f64>) -> Self {
        Self {
            calibrated_chars_per_token: chars_per_token.filter(|r| r.is_finite() && *r > 0.0),
        }
    }

    fn divisor(&self, content_type: ContentType) -> f64 {
        self.calibrated_chars_per_token
            .unwrap_or_else(|| content_type.chars_per_token())
    }
}

impl TokenEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str, content_type: ContentType) -> usize {
        if text.is_empty() {
            return 0;
        }
        let chars = text.chars().count() as f64;
        (chars / self.divisor(content_type)).ceil() as usize
    }
}

/// Estimate tokens with the default heuristic.
pub fn estimate_tokens(text: &str, content_type: ContentType) -> usize {
    HeuristicEstimator::new().estimate(text, content_type)
}
