//! Replaceable synthesis policies and their tunables.
//!
//! The precedence algorithm in [`super::engine`] consumes two predicates:
//! whether an opinion raises a security finding, and whether its citations
//! resolve against the evidence bundle. Both are traits so callers can swap
//! the keyword/structural defaults for something smarter.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::{Citation, EvidenceBundle, JudicialOpinion, Result, TribunalError};

/// Tunable synthesis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPolicy {
    /// Maximum criterion score when any opinion raises a security finding.
    pub security_ceiling: u32,
    /// Weight given to opinions whose citations do not resolve.
    pub fact_min_weight: f64,
    /// A dissent note is attached when `max - min` exceeds this.
    pub dissent_threshold: u32,
    /// Characters of justification quoted in dissent notes and remediation.
    pub dissent_excerpt_chars: usize,
    pub security_keywords: Vec<String>,
}

impl Default for SynthesisPolicy {
    fn default() -> Self {
        Self {
            security_ceiling: 2,
            fact_min_weight: 0.0,
            dissent_threshold: 2,
            dissent_excerpt_chars: 120,
            security_keywords: ["security", "vulnerability", "bypass", "injection"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl SynthesisPolicy {
    pub fn validate(&self) -> Result<()> {
        if !self.fact_min_weight.is_finite() || self.fact_min_weight < 0.0 {
            return Err(TribunalError::Config(format!(
                "fact_min_weight must be a non-negative number, got {}",
                self.fact_min_weight
            )));
        }
        Ok(())
    }
}

/// Decides whether an `ok` opinion raises a security-relevant finding.
pub trait SecurityPredicate: Send + Sync {
    fn flags(&self, opinion: &JudicialOpinion) -> bool;
}

/// Decides whether an opinion's claims are supported by the evidence.
pub trait CitationCheck: Send + Sync {
    fn is_supported(&self, opinion: &JudicialOpinion, bundle: &EvidenceBundle) -> bool;
}

/// Case-insensitive whole-word keyword match over justification and citations.
#[derive(Debug, Clone)]
pub struct KeywordSecurityPredicate {
    pattern: Option<Regex>,
}

impl KeywordSecurityPredicate {
    pub fn new(keywords: &[String]) -> Result<Self> {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Ok(Self { pattern: None });
        }
        let pattern = Regex::new(&format!(r"(?i)\b(?:{})\b", alternatives.join("|")))
            .map_err(|e| TribunalError::Config(format!("security keywords: {e}")))?;
        Ok(Self {
            pattern: Some(pattern),
        })
    }
}

impl SecurityPredicate for KeywordSecurityPredicate {
    fn flags(&self, opinion: &JudicialOpinion) -> bool {
        let Some(pattern) = &self.pattern else {
            return false;
        };
        pattern.is_match(&opinion.justification)
            || opinion.citations.iter().any(|c| pattern.is_match(c))
    }
}

/// Structural check of `<kind>[:<key>]` citations against the bundle.
///
/// Every citation must name a known kind that is not missing and has an
/// `ok` payload; a key, when given, must be a top-level field of that payload.
/// An opinion with no citations is supported.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleCitationCheck;

impl CitationCheck for BundleCitationCheck {
    fn is_supported(&self, opinion: &JudicialOpinion, bundle: &EvidenceBundle) -> bool {
        opinion.citations.iter().all(|raw| {
            let Some(citation) = Citation::parse(raw) else {
                return false;
            };
            if bundle.missing().contains(&citation.kind) {
                return false;
            }
            let Some(payload) = bundle.ok_payload(citation.kind) else {
                return false;
            };
            match &citation.key {
                None => true,
                Some(key) => payload.get(key).is_some(),
            }
        })
    }
}
