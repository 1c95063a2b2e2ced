//! Judicial opinions and per-criterion opinion sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::rubric::Persona;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OpinionStatus {
    Ok,
    Failed { reason: String },
}

/// One persona's structured verdict on one criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudicialOpinion {
    pub criterion_id: String,
    pub persona: String,
    pub status: OpinionStatus,
    /// Meaningful only when `status` is `Ok`.
    pub score: u32,
    pub justification: String,
    pub citations: Vec<String>,
}

impl JudicialOpinion {
    pub fn ok(
        criterion_id: impl Into<String>,
        persona: impl Into<String>,
        score: u32,
        justification: impl Into<String>,
        citations: Vec<String>,
    ) -> Self {
        Self {
            criterion_id: criterion_id.into(),
            persona: persona.into(),
            status: OpinionStatus::Ok,
            score,
            justification: justification.into(),
            citations,
        }
    }

    pub fn failed(
        criterion_id: impl Into<String>,
        persona: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            criterion_id: criterion_id.into(),
            persona: persona.into(),
            status: OpinionStatus::Failed {
                reason: reason.into(),
            },
            score: 0,
            justification: String::new(),
            citations: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, OpinionStatus::Ok)
    }
}

/// All persona opinions for one criterion: exactly one slot per persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpinionSet {
    criterion_id: String,
    opinions: BTreeMap<String, JudicialOpinion>,
}

impl OpinionSet {
    /// Build a set with one slot per persona. Personas with no matching
    /// opinion get a `failed` slot; opinions for other criteria or unknown
    /// personas are ignored. If a persona appears twice the first wins.
    pub fn assemble(
        criterion_id: &str,
        personas: &[Persona],
        opinions: impl IntoIterator<Item = JudicialOpinion>,
    ) -> Self {
        let mut slots: BTreeMap<String, JudicialOpinion> = BTreeMap::new();
        for op in opinions {
            if op.criterion_id != criterion_id || !personas.iter().any(|p| p.id == op.persona) {
                continue;
            }
            slots.entry(op.persona.clone()).or_insert(op);
        }
        for p in personas {
            slots
                .entry(p.id.clone())
                .or_insert_with(|| JudicialOpinion::failed(criterion_id, &p.id, "no opinion produced"));
        }
        Self {
            criterion_id: criterion_id.to_string(),
            opinions: slots,
        }
    }

    pub fn criterion_id(&self) -> &str {
        &self.criterion_id
    }

    pub fn len(&self) -> usize {
        self.opinions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.opinions.is_empty()
    }

    pub fn get(&self, persona: &str) -> Option<&JudicialOpinion> {
        self.opinions.get(persona)
    }

    /// Opinions ordered by persona id.
    pub fn iter(&self) -> impl Iterator<Item = &JudicialOpinion> {
        self.opinions.values()
    }

    pub fn ok_opinions(&self) -> impl Iterator<Item = &JudicialOpinion> {
        self.opinions.values().filter(|o| o.is_ok())
    }

    pub fn all_failed(&self) -> bool {
        self.opinions.values().all(|o| !o.is_ok())
    }
}
