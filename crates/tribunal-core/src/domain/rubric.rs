//! Rubric criteria and judge personas.
//!
//! The rubric is process-wide configuration: loaded once, validated, then
//! shared read-only by every stage of every run.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::error::{Result, TribunalError};

/// Scoring viewpoint of a persona.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stance {
    Critical,
    Lenient,
    Pragmatic,
}

impl Stance {
    /// Guiding philosophy handed to a judge adopting this stance.
    pub fn philosophy(&self) -> &'static str {
        match self {
            Stance::Critical => {
                "Trust no one. Scrutinize the evidence for gaps, security flaws and \
                 unintegrated code. Score 4-5 only when the evidence is irrefutable."
            }
            Stance::Lenient => {
                "Reward effort and intent. Give partial credit for partial \
                 implementations and credit creative workarounds."
            }
            Stance::Pragmatic => {
                "Does it actually work and is it maintainable? Side with a proven \
                 security flaw, side with genuine innovation, otherwise find the middle."
            }
        }
    }
}

impl fmt::Display for Stance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stance::Critical => "critical",
            Stance::Lenient => "lenient",
            Stance::Pragmatic => "pragmatic",
        };
        f.write_str(s)
    }
}

/// A configured judge persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    pub id: String,
    pub stance: Stance,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl Persona {
    pub fn new(id: impl Into<String>, stance: Stance, weight: f64) -> Self {
        Self {
            id: id.into(),
            stance,
            weight,
        }
    }

    /// Prosecutor, defense and tech lead with equal weight.
    pub fn default_panel() -> Vec<Persona> {
        vec![
            Persona::new("prosecutor", Stance::Critical, 1.0),
            Persona::new("defense", Stance::Lenient, 1.0),
            Persona::new("tech_lead", Stance::Pragmatic, 1.0),
        ]
    }
}

/// Validate a persona panel: non-empty, unique ids, finite non-negative weights.
pub fn validate_personas(personas: &[Persona]) -> Result<()> {
    if personas.is_empty() {
        return Err(TribunalError::Config("at least one persona is required".into()));
    }
    let mut seen = BTreeSet::new();
    for p in personas {
        if !seen.insert(p.id.as_str()) {
            return Err(TribunalError::Config(format!("duplicate persona id: {}", p.id)));
        }
        if !p.weight.is_finite() || p.weight < 0.0 {
            return Err(TribunalError::Config(format!(
                "persona {} has invalid weight {}",
                p.id, p.weight
            )));
        }
    }
    Ok(())
}

fn default_weight() -> f64 {
    1.0
}

fn default_max_score() -> u32 {
    5
}

/// One rubric dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriterionSpec {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(rename = "max_score", default = "default_max_score")]
    pub maximum: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact: Option<String>,
    #[serde(default)]
    pub forensic_instruction: String,
    /// Persona id to criterion-specific guidance.
    #[serde(default)]
    pub judicial_logic: BTreeMap<String, String>,
}

impl CriterionSpec {
    pub fn guidance_for(&self, persona_id: &str) -> Option<&str> {
        self.judicial_logic.get(persona_id).map(String::as_str)
    }
}

/// The full rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rubric {
    #[serde(default = "default_rubric_name")]
    pub name: String,
    pub dimensions: Vec<CriterionSpec>,
}

fn default_rubric_name() -> String {
    "unnamed rubric".to_string()
}

impl Rubric {
    /// Parse and validate a rubric from JSON text.
    pub fn from_json(text: &str) -> Result<Self> {
        let rubric: Rubric = serde_json::from_str(text)
            .map_err(|e| TribunalError::RubricInvalid(format!("parse: {e}")))?;
        rubric.validate()?;
        Ok(rubric)
    }

    /// Load and validate a rubric JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions.is_empty() {
            return Err(TribunalError::RubricInvalid(
                "rubric has no dimensions".to_string(),
            ));
        }
        let mut ids = BTreeSet::new();
        for c in &self.dimensions {
            if c.id.trim().is_empty() {
                return Err(TribunalError::RubricInvalid("empty criterion id".to_string()));
            }
            if !ids.insert(c.id.as_str()) {
                return Err(TribunalError::RubricInvalid(format!(
                    "duplicate criterion id: {}",
                    c.id
                )));
            }
            if !c.weight.is_finite() || c.weight <= 0.0 {
                return Err(TribunalError::RubricInvalid(format!(
                    "criterion {} has invalid weight {}",
                    c.id, c.weight
                )));
            }
            if c.maximum == 0 {
                return Err(TribunalError::RubricInvalid(format!(
                    "criterion {} has zero max_score",
                    c.id
                )));
            }
        }
        Ok(())
    }

    pub fn criterion(&self, id: &str) -> Option<&CriterionSpec> {
        self.dimensions.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Sum of `weight * maximum` over all criteria.
    pub fn max_possible(&self) -> f64 {
        self.dimensions
            .iter()
            .map(|c| c.weight * f64::from(c.maximum))
            .sum()
    }
}

impl Default for Rubric {
    fn default() -> Self {
        fn criterion(
            id: &str,
            name: &str,
            target: &str,
            instruction: &str,
            logic: [&str; 3],
        ) -> CriterionSpec {
            CriterionSpec {
                id: id.to_string(),
                name: name.to_string(),
                description: String::new(),
                weight: 1.0,
                maximum: 5,
                target_artifact: Some(target.to_string()),
                forensic_instruction: instruction.to_string(),
                judicial_logic: [
                    ("prosecutor".to_string(), logic[0].to_string()),
                    ("defense".to_string(), logic[1].to_string()),
                    ("tech_lead".to_string(), logic[2].to_string()),
                ]
                .into_iter()
                .collect(),
            }
        }

        Rubric {
            name: "default repository audit".to_string(),
            dimensions: vec![
                criterion(
                    "forensic_accuracy_code",
                    "Forensic Accuracy (Codebase)",
                    "repository",
                    "Verify code structure and tool registration",
                    [
                        "Check for missing error handling",
                        "Look for creative solutions",
                        "Assess maintainability",
                    ],
                ),
                criterion(
                    "forensic_accuracy_docs",
                    "Forensic Accuracy (Documentation)",
                    "document",
                    "Verify theoretical depth and cross-reference claims against the code",
                    [
                        "Check for hallucinated claims",
                        "Identify theoretical alignment",
                        "Verify implementation matches docs",
                    ],
                ),
                criterion(
                    "judicial_nuance",
                    "Judicial Nuance & Dialectics",
                    "repository",
                    "Verify distinct judge personas and parallel execution",
                    [
                        "Check for persona collusion",
                        "Look for contrarian instructions",
                        "Evaluate the synthesis algorithm",
                    ],
                ),
                criterion(
                    "orchestration_rigor",
                    "Orchestration Rigor",
                    "repository",
                    "Analyze the workflow graph for parallel branches and error handling",
                    [
                        "Check for linear execution disguised as parallel",
                        "Support robust state transitions",
                        "Evaluate checkpointing",
                    ],
                ),
                criterion(
                    "architecture_diagrams",
                    "Architecture Diagrams",
                    "visual",
                    "Compare diagrams against the implemented topology",
                    [
                        "Check for diagrams that misrepresent the flow",
                        "Credit clear visual explanation",
                        "Verify the diagram matches the code",
                    ],
                ),
            ],
        }
    }
}
