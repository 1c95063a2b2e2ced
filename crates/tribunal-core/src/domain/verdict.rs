//! Per-criterion and final verdicts.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::evidence::EvidenceKind;

/// Synthesis rule tags, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionRule {
    NoOpinions,
    SecurityOverride,
    FactSupremacy,
    WeightedAverage,
}

impl ResolutionRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionRule::NoOpinions => "no_opinions",
            ResolutionRule::SecurityOverride => "security_override",
            ResolutionRule::FactSupremacy => "fact_supremacy",
            ResolutionRule::WeightedAverage => "weighted_average",
        }
    }
}

impl fmt::Display for ResolutionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionVerdict {
    pub criterion_id: String,
    pub criterion_name: String,
    pub score: u32,
    pub maximum: u32,
    /// Every rule that fired, in precedence order.
    pub rules: Vec<ResolutionRule>,
    /// Highest minus lowest `ok` score.
    pub variance: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dissent_note: Option<String>,
    pub failed_personas: Vec<String>,
    /// Personas whose opinions were down-weighted for unsupported citations.
    pub down_weighted: Vec<String>,
    pub remediation: Vec<String>,
}

impl CriterionVerdict {
    /// The highest-precedence rule that determined the score.
    pub fn applied_rule(&self) -> ResolutionRule {
        self.rules
            .first()
            .copied()
            .unwrap_or(ResolutionRule::WeightedAverage)
    }

    pub fn has_rule(&self, rule: ResolutionRule) -> bool {
        self.rules.contains(&rule)
    }
}

/// The terminal artifact of a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalVerdict {
    pub trace_id: String,
    pub target: String,
    pub rubric_name: String,
    pub created_at: DateTime<Utc>,
    pub criteria: Vec<CriterionVerdict>,
    /// Weight-normalized mean of criterion scores.
    pub overall_score: f64,
    /// Weight-normalized mean of criterion maxima.
    pub max_possible: f64,
    pub percentage: u32,
    /// Distinct rules triggered across all criteria, other than plain averaging.
    pub triggered_rules: BTreeSet<ResolutionRule>,
    pub missing_evidence: BTreeSet<EvidenceKind>,
    /// Plain-text digest of the evidence bundle judged.
    pub evidence_summary: String,
}

impl FinalVerdict {
    pub fn criterion(&self, id: &str) -> Option<&CriterionVerdict> {
        self.criteria.iter().find(|c| c.criterion_id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applied_rule_is_first_in_precedence() {
        let v = CriterionVerdict {
            criterion_id: "c".into(),
            criterion_name: "C".into(),
            score: 2,
            maximum: 5,
            rules: vec![ResolutionRule::SecurityOverride, ResolutionRule::FactSupremacy],
            variance: 0,
            dissent_note: None,
            failed_personas: vec![],
            down_weighted: vec![],
            remediation: vec![],
        };
        assert_eq!(v.applied_rule(), ResolutionRule::SecurityOverride);
        assert!(v.has_rule(ResolutionRule::FactSupremacy));
        assert!(!v.has_rule(ResolutionRule::NoOpinions));
    }

    #[test]
    fn test_rule_serializes_snake_case() {
        let json = serde_json::to_string(&ResolutionRule::SecurityOverride).unwrap();
        assert_eq!(json, "\"security_override\"");
    }
}
