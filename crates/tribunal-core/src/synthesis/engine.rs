//! Deterministic synthesis of opinion sets into verdicts.
//!
//! Precedence per criterion:
//! 1. all opinions failed: score 0, `no_opinions`
//! 2. any `ok` opinion flagged by the security predicate: cap at the ceiling
//! 3. opinions whose citations do not resolve: down-weighted to `fact_min_weight`
//!    and counted at the lowest raw score of the set
//! 4. weighted mean of the rest, round-half-up, clamped to `[0, maximum]`
//! 5. `max - min` of all `ok` scores recorded; a dissent note above the threshold
//!
//! Synthesis reads only its arguments; identical inputs give identical verdicts.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::domain::{
    CriterionSpec, CriterionVerdict, EvidenceBundle, FinalVerdict, OpinionSet, Persona,
    ResolutionRule, Result, Rubric, RunContext, TribunalError,
};
use crate::synthesis::policy::{
    BundleCitationCheck, CitationCheck, KeywordSecurityPredicate, SecurityPredicate,
    SynthesisPolicy,
};
use crate::synthesis::remediation::{self, excerpt};

/// Round half up with a small tolerance for accumulated float error.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5 + 1e-9).floor()
}

pub struct SynthesisEngine {
    policy: SynthesisPolicy,
    personas: Vec<Persona>,
    security: Arc<dyn SecurityPredicate>,
    citations: Arc<dyn CitationCheck>,
}

impl SynthesisEngine {
    /// Engine with the keyword security predicate and structural citation check.
    pub fn new(policy: SynthesisPolicy, personas: Vec<Persona>) -> Result<Self> {
        policy.validate()?;
        let security = Arc::new(KeywordSecurityPredicate::new(&policy.security_keywords)?);
        Ok(Self {
            policy,
            personas,
            security,
            citations: Arc::new(BundleCitationCheck),
        })
    }

    pub fn with_security_predicate(mut self, predicate: Arc<dyn SecurityPredicate>) -> Self {
        self.security = predicate;
        self
    }

    pub fn with_citation_check(mut self, check: Arc<dyn CitationCheck>) -> Self {
        self.citations = check;
        self
    }

    pub fn policy(&self) -> &SynthesisPolicy {
        &self.policy
    }

    pub fn personas(&self) -> &[Persona] {
        &self.personas
    }

    fn check_invariants(&self, set: &OpinionSet, spec: &CriterionSpec) -> Result<()> {
        if set.criterion_id() != spec.id {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "opinion set for {} synthesized against criterion {}",
                set.criterion_id(),
                spec.id
            )));
        }
        if set.len() != self.personas.len()
            || self.personas.iter().any(|p| set.get(&p.id).is_none())
        {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "criterion {} has {} opinion slots for {} personas",
                spec.id,
                set.len(),
                self.personas.len()
            )));
        }
        if let Some(op) = set.ok_opinions().find(|o| o.score > spec.maximum) {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "criterion {}: {} scored {} above maximum {}",
                spec.id, op.persona, op.score, spec.maximum
            )));
        }
        Ok(())
    }

    fn weight_of(&self, persona: &str) -> f64 {
        self.personas
            .iter()
            .find(|p| p.id == persona)
            .map(|p| p.weight)
            .unwrap_or(0.0)
    }

    /// Resolve one criterion.
    pub fn synthesize(
        &self,
        set: &OpinionSet,
        spec: &CriterionSpec,
        bundle: &EvidenceBundle,
    ) -> Result<CriterionVerdict> {
        self.check_invariants(set, spec)?;

        let failed_personas: Vec<String> = set
            .iter()
            .filter(|o| !o.is_ok())
            .map(|o| o.persona.clone())
            .collect();

        if set.all_failed() {
            return Ok(CriterionVerdict {
                criterion_id: spec.id.clone(),
                criterion_name: spec.name.clone(),
                score: 0,
                maximum: spec.maximum,
                rules: vec![ResolutionRule::NoOpinions],
                variance: 0,
                dissent_note: None,
                failed_personas,
                down_weighted: Vec::new(),
                remediation: remediation::plan(
                    spec,
                    set,
                    &self.personas,
                    0,
                    self.policy.dissent_excerpt_chars,
                ),
            });
        }

        let ok: Vec<_> = set.ok_opinions().collect();
        let min_raw = ok.iter().map(|o| o.score).min().unwrap_or(0);
        let max_raw = ok.iter().map(|o| o.score).max().unwrap_or(0);

        let mut rules = Vec::new();
        let flagged = ok.iter().any(|o| self.security.flags(o));
        if flagged {
            rules.push(ResolutionRule::SecurityOverride);
        }

        let down_weighted: Vec<String> = ok
            .iter()
            .filter(|o| !self.citations.is_supported(o, bundle))
            .map(|o| o.persona.clone())
            .collect();
        if !down_weighted.is_empty() {
            rules.push(ResolutionRule::FactSupremacy);
        }

        let supported: Vec<_> = ok
            .iter()
            .filter(|o| !down_weighted.contains(&o.persona))
            .collect();

        let raw = if supported.is_empty() {
            0.0
        } else {
            rules.push(ResolutionRule::WeightedAverage);
            let mut weighted = 0.0;
            let mut total = 0.0;
            for op in &ok {
                let (w, s) = if down_weighted.contains(&op.persona) {
                    (self.policy.fact_min_weight, min_raw)
                } else {
                    (self.weight_of(&op.persona), op.score)
                };
                weighted += w * f64::from(s);
                total += w;
            }
            if total > 0.0 {
                weighted / total
            } else {
                // zero-weight panel: plain mean of the supported scores
                supported.iter().map(|o| f64::from(o.score)).sum::<f64>() / supported.len() as f64
            }
        };

        let mut score = round_half_up(raw).clamp(0.0, f64::from(spec.maximum)) as u32;
        if flagged {
            score = score.min(self.policy.security_ceiling.min(spec.maximum));
        }

        let variance = max_raw - min_raw;
        let dissent_note = (variance > self.policy.dissent_threshold).then(|| {
            let mut extremes: Vec<_> = ok
                .iter()
                .filter(|o| o.score == min_raw || o.score == max_raw)
                .collect();
            extremes.sort_by(|a, b| a.score.cmp(&b.score).then(a.persona.cmp(&b.persona)));
            let voices: Vec<String> = extremes
                .iter()
                .map(|o| {
                    format!(
                        "{} scored {}: \"{}\"",
                        o.persona,
                        o.score,
                        excerpt(&o.justification, self.policy.dissent_excerpt_chars)
                    )
                })
                .collect();
            format!(
                "Judges disagreed (variance {} > {}). {}",
                variance,
                self.policy.dissent_threshold,
                voices.join("; ")
            )
        });

        Ok(CriterionVerdict {
            criterion_id: spec.id.clone(),
            criterion_name: spec.name.clone(),
            score,
            maximum: spec.maximum,
            rules,
            variance,
            dissent_note,
            failed_personas,
            down_weighted,
            remediation: remediation::plan(
                spec,
                set,
                &self.personas,
                score,
                self.policy.dissent_excerpt_chars,
            ),
        })
    }

    /// Synthesize every criterion and reduce to the final verdict.
    ///
    /// `sets` must hold exactly one set per rubric criterion, in rubric order.
    pub fn synthesize_all(
        &self,
        ctx: &RunContext,
        rubric: &Rubric,
        sets: &[OpinionSet],
        bundle: &EvidenceBundle,
    ) -> Result<FinalVerdict> {
        if sets.len() != rubric.len() {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "{} opinion sets for {} criteria",
                sets.len(),
                rubric.len()
            )));
        }
        let verdicts = sets
            .iter()
            .map(|set| {
                let spec = rubric.criterion(set.criterion_id()).ok_or_else(|| {
                    TribunalError::SynthesisInvariantViolation(format!(
                        "opinion set for unknown criterion {}",
                        set.criterion_id()
                    ))
                })?;
                self.synthesize(set, spec, bundle)
            })
            .collect::<Result<Vec<_>>>()?;
        finalize(ctx, rubric, verdicts, bundle)
    }
}

/// Reduce criterion verdicts into the final verdict.
///
/// Overall score is the weight-normalized mean of criterion scores; the
/// maximum is normalized the same way, so the percentage equals
/// `sum(w * score) / sum(w * maximum) * 100`, rounded half up.
pub fn finalize(
    ctx: &RunContext,
    rubric: &Rubric,
    verdicts: Vec<CriterionVerdict>,
    bundle: &EvidenceBundle,
) -> Result<FinalVerdict> {
    if verdicts.len() != rubric.len() {
        return Err(TribunalError::SynthesisInvariantViolation(format!(
            "{} verdicts for {} criteria",
            verdicts.len(),
            rubric.len()
        )));
    }

    let mut weighted = 0.0;
    let mut weighted_max = 0.0;
    let mut total_weight = 0.0;
    for (verdict, spec) in verdicts.iter().zip(&rubric.dimensions) {
        if verdict.criterion_id != spec.id {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "verdict {} out of rubric order (expected {})",
                verdict.criterion_id, spec.id
            )));
        }
        if verdict.score > spec.maximum {
            return Err(TribunalError::SynthesisInvariantViolation(format!(
                "verdict {} scored {} above maximum {}",
                spec.id, verdict.score, spec.maximum
            )));
        }
        weighted += spec.weight * f64::from(verdict.score);
        weighted_max += spec.weight * f64::from(spec.maximum);
        total_weight += spec.weight;
    }

    let overall_score = weighted / total_weight;
    let max_possible = weighted_max / total_weight;
    let percentage = round_half_up(weighted / weighted_max * 100.0) as u32;

    let triggered_rules: BTreeSet<ResolutionRule> = verdicts
        .iter()
        .flat_map(|v| v.rules.iter().copied())
        .filter(|r| *r != ResolutionRule::WeightedAverage)
        .collect();

    Ok(FinalVerdict {
        trace_id: ctx.trace_id.clone(),
        target: ctx.target.clone(),
        rubric_name: rubric.name.clone(),
        created_at: ctx.created_at,
        criteria: verdicts,
        overall_score,
        max_possible,
        percentage,
        triggered_rules,
        missing_evidence: bundle.missing().clone(),
        evidence_summary: bundle.summary(),
    })
}
