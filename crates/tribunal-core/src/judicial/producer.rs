//! Opinion producer adapter contract.

use async_trait::async_trait;

use crate::domain::{CriterionSpec, EvidenceBundle, JudicialOpinion, Persona};

/// Produces one structured opinion per (criterion, persona).
///
/// Implementations must not fail: transport errors, refusals and unparsable
/// replies are returned as `failed` opinions.
#[async_trait]
pub trait OpinionProducer: Send + Sync {
    async fn produce(
        &self,
        bundle: &EvidenceBundle,
        criterion: &CriterionSpec,
        persona: &Persona,
    ) -> JudicialOpinion;
}
