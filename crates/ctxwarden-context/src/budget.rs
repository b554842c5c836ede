//! Token budget calculation.

use ctxwarden_core::config::BudgetConfig;
use ctxwarden_core::{ContentType, HeuristicEstimator, TokenEstimator};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A named piece of text that goes into the model call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSection {
    pub name: String,
    pub text: String,
    pub content_type: ContentType,
}

impl ContentSection {
    pub fn new(name: impl Into<String>, text: impl Into<String>, content_type: ContentType) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            content_type,
        }
    }
}

/// Budget health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStatus {
    Ok,
    /// At or above the compaction threshold.
    Warning,
    /// At or above the hard limit.
    Critical,
}

impl BudgetStatus {
    /// Classify a utilization percentage against the two cut points.
    pub fn from_utilization(utilization_percent: f64, threshold_percent: f64, hard_limit_percent: f64) -> Self {
        if utilization_percent >= hard_limit_percent {
            Self::Critical
        } else if utilization_percent >= threshold_percent {
            Self::Warning
        } else {
            Self::Ok
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token count for one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionUsage {
    pub name: String,
    pub tokens: usize,
}

/// Point-in-time token accounting for an assembled context.
///
/// `total == reserved + used + available` always holds; `available` goes
/// negative when the context is over budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BudgetSnapshot {
    pub total: usize,
    pub reserved: usize,
    pub used: usize,
    pub available: i64,
    pub utilization_percent: f64,
    pub status: BudgetStatus,
    pub sections: Vec<SectionUsage>,
}

impl BudgetSnapshot {
    /// Tokens usable by content: total minus the reserve.
    pub fn effective_window(&self) -> usize {
        self.total - self.reserved
    }

    /// Tokens used by the named section, if present.
    pub fn section_tokens(&self, name: &str) -> Option<usize> {
        self.sections.iter().find(|s| s.name == name).map(|s| s.tokens)
    }
}

/// Turns content sections into a [`BudgetSnapshot`].
#[derive(Clone)]
pub struct BudgetCalculator {
    config: BudgetConfig,
    estimator: Arc<dyn TokenEstimator>,
}

impl BudgetCalculator {
    /// Create a calculator using the heuristic estimator.
    pub fn new(config: BudgetConfig) -> Self {
        Self {
            config,
            estimator: Arc::new(HeuristicEstimator::new()),
        }
    }

    /// Replace the token estimator.
    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &BudgetConfig {
        &self.config
    }

    pub fn estimator(&self) -> &Arc<dyn TokenEstimator> {
        &self.estimator
    }

    /// Estimate a single piece of text.
    pub fn estimate(&self, text: &str, content_type: ContentType) -> usize {
        self.estimator.estimate(text, content_type)
    }

    /// Tokens held back from content for the response.
    pub fn reserved_tokens(&self) -> usize {
        let reserved = (self.config.total_tokens as f64 * self.config.reserve_fraction).ceil() as usize;
        reserved.min(self.config.total_tokens)
    }

    /// Account for `sections` against the budget.
    pub fn estimate_budget(&self, sections: &[ContentSection]) -> BudgetSnapshot {
        let usage: Vec<SectionUsage> = sections
            .iter()
            .map(|s| SectionUsage {
                name: s.name.clone(),
                tokens: self.estimator.estimate(&s.text, s.content_type),
            })
            .collect();
        let used: usize = usage.iter().map(|s| s.tokens).sum();

        let total = self.config.total_tokens;
        let reserved = self.reserved_tokens();
        let effective = total - reserved;
        let available = effective as i64 - used as i64;

        let utilization_percent = match (effective, used) {
            (0, 0) => 0.0,
            (0, _) => 100.0,
            (window, used) => used as f64 / window as f64 * 100.0,
        };
        let status = BudgetStatus::from_utilization(
            utilization_percent,
            self.config.compaction_threshold_percent,
            self.config.hard_limit_percent,
        );

        BudgetSnapshot {
            total,
            reserved,
            used,
            available,
            utilization_percent,
            status,
            sections: usage,
        }
    }

    /// Tokens that must be freed for `snapshot` to drop below the compaction
    /// threshold. Zero when it already does.
    pub fn tokens_to_reach_ok(&self, snapshot: &BudgetSnapshot) -> usize {
        if snapshot.status == BudgetStatus::Ok {
            return 0;
        }
        let threshold_tokens =
            snapshot.effective_window() as f64 * self.config.compaction_threshold_percent / 100.0;
        let excess = snapshot.used as f64 - threshold_tokens;
        if excess < 0.0 {
            return 0;
        }
        excess.floor() as usize + 1
    }
}

impl fmt::Debug for BudgetCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BudgetCalculator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(total_tokens: usize) -> BudgetConfig {
        BudgetConfig {
            total_tokens,
            reserve_fraction: 0.0,
            compaction_threshold_percent: 75.0,
            hard_limit_percent: 90.0,
        }
    }

    fn prose(name: &str, chars: usize) -> ContentSection {
        ContentSection::new(name, "a".repeat(chars), ContentType::Prose)
    }

    #[test]
    fn test_estimate_budget_breakdown() {
        let calc = BudgetCalculator::new(config(1000));
        let snapshot = calc.estimate_budget(&[prose("system", 400), prose("history", 800)]);

        assert_eq!(snapshot.sections.len(), 2);
        assert_eq!(snapshot.section_tokens("system"), Some(100));
        assert_eq!(snapshot.section_tokens("history"), Some(200));
        assert_eq!(snapshot.used, 300);
        assert_eq!(snapshot.available, 700);
        assert_eq!(snapshot.status, BudgetStatus::Ok);
    }

    #[test]
    fn test_reserve_is_rounded_up() {
        let calc = BudgetCalculator::new(BudgetConfig {
            reserve_fraction: 0.1,
            ..config(1005)
        });
        let snapshot = calc.estimate_budget(&[]);
        assert_eq!(snapshot.reserved, 101);
        assert_eq!(snapshot.available, 904);
        assert_eq!(snapshot.utilization_percent, 0.0);
    }

    #[test]
    fn test_status_cut_points() {
        let calc = BudgetCalculator::new(config(1000));
        assert_eq!(calc.estimate_budget(&[prose("s", 2996)]).status, BudgetStatus::Ok);
        assert_eq!(calc.estimate_budget(&[prose("s", 3000)]).status, BudgetStatus::Warning);
        assert_eq!(calc.estimate_budget(&[prose("s", 3600)]).status, BudgetStatus::Critical);
    }

    #[test]
    fn test_over_budget_goes_negative() {
        let calc = BudgetCalculator::new(config(100));
        let snapshot = calc.estimate_budget(&[prose("s", 480)]);
        assert_eq!(snapshot.used, 120);
        assert_eq!(snapshot.available, -20);
        assert_eq!(snapshot.utilization_percent, 120.0);
        assert_eq!(snapshot.status, BudgetStatus::Critical);
    }

    #[test]
    fn test_zero_window() {
        let calc = BudgetCalculator::new(config(0));
        assert_eq!(calc.estimate_budget(&[]).utilization_percent, 0.0);
        assert_eq!(calc.estimate_budget(&[prose("s", 4)]).utilization_percent, 100.0);
    }

    #[test]
    fn test_tokens_to_reach_ok() {
        let calc = BudgetCalculator::new(config(1000));
        let snapshot = calc.estimate_budget(&[prose("s", 3200)]);
        assert_eq!(snapshot.used, 800);
        // threshold is 750 tokens; 749 is the first healthy count
        assert_eq!(calc.tokens_to_reach_ok(&snapshot), 51);

        let healthy = calc.estimate_budget(&[prose("s", 400)]);
        assert_eq!(calc.tokens_to_reach_ok(&healthy), 0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn accounting_always_balances(
                total in 0usize..500_000,
                reserve in 0.0f64..0.99,
                lens in proptest::collection::vec(0usize..5_000, 0..8),
            ) {
                let calc = BudgetCalculator::new(BudgetConfig { reserve_fraction: reserve, ..config(total) });
                let sections: Vec<ContentSection> = lens
                    .iter()
                    .enumerate()
                    .map(|(i, len)| ContentSection::new(format!("s{}", i), "x".repeat(*len), ContentType::Mixed))
                    .collect();
                let snapshot = calc.estimate_budget(&sections);

                let summed: usize = sections.iter().map(|s| calc.estimate(&s.text, s.content_type)).sum();
                prop_assert_eq!(snapshot.used, summed);
                prop_assert_eq!(
                    snapshot.used as i64 + snapshot.reserved as i64 + snapshot.available,
                    snapshot.total as i64
                );
            }

            #[test]
            fn status_is_monotonic(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                let lo_status = BudgetStatus::from_utilization(lo, 75.0, 90.0);
                let hi_status = BudgetStatus::from_utilization(hi, 75.0, 90.0);
                prop_assert!(lo_status <= hi_status);
            }
        }
    }
}
