//! Maps a fraud probability (and rule signals) to a decision.

use super::RuleHit;
use crate::config::ScoringConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Flag,
    /// Scoring failed; hold for manual review
    Review,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Flag => "flag",
            Decision::Review => "review",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    config: ScoringConfig,
}

impl DecisionPolicy {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, probability: f64, rule_hits: &[RuleHit]) -> Decision {
        if probability >= self.config.decision_threshold {
            Decision::Flag
        } else if self.config.escalate_rule_hits && !rule_hits.is_empty() {
            Decision::Flag
        } else {
            Decision::Allow
        }
    }

    /// Decision when scoring could not complete.
    pub fn on_failure(&self) -> Decision {
        if self.config.fail_open {
            Decision::Allow
        } else {
            Decision::Review
        }
    }

    pub fn threshold(&self) -> f64 {
        self.config.decision_threshold
    }
}
