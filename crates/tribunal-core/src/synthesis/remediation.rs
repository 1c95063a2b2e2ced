//! Deterministic remediation steps per criterion, chosen by score band.

use crate::domain::{CriterionSpec, JudicialOpinion, OpinionSet, Persona, Stance};

/// Truncate to `max` characters, marking the cut with `...`.
pub fn excerpt(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= max {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(max).collect();
    format!("{}...", cut.trim_end())
}

fn stance_of(personas: &[Persona], id: &str) -> Option<Stance> {
    personas.iter().find(|p| p.id == id).map(|p| p.stance)
}

fn lowest<'a>(ops: impl Iterator<Item = &'a JudicialOpinion>) -> Option<&'a JudicialOpinion> {
    ops.min_by(|a, b| a.score.cmp(&b.score).then(a.persona.cmp(&b.persona)))
}

fn by_stance<'a>(
    set: &'a OpinionSet,
    personas: &[Persona],
    stance: Stance,
) -> impl Iterator<Item = &'a JudicialOpinion> {
    let ids: Vec<String> = personas
        .iter()
        .filter(|p| p.stance == stance)
        .map(|p| p.id.clone())
        .collect();
    set.ok_opinions().filter(move |o| ids.contains(&o.persona))
}

/// Remediation plan for one criterion.
///
/// - score <= 40% of maximum: `Critical:` from the lowest critical opinion
///   (or the lowest opinion overall) plus the rubric's forensic instruction
/// - score >= 80%: `Polish:` from the lenient persona
/// - otherwise: `Refine:` from the pragmatic persona
/// - always: `Review evidence:` with up to three critical-persona citations
pub fn plan(
    spec: &CriterionSpec,
    set: &OpinionSet,
    personas: &[Persona],
    score: u32,
    excerpt_chars: usize,
) -> Vec<String> {
    let mut steps = Vec::new();

    if set.all_failed() {
        steps.push("Critical: no judge produced a usable opinion; re-run this criterion.".to_string());
        if !spec.forensic_instruction.is_empty() {
            steps.push(format!("Investigate: {}", spec.forensic_instruction));
        }
        return steps;
    }

    let ratio = f64::from(score) / f64::from(spec.maximum.max(1));

    if ratio <= 0.4 {
        let source = lowest(by_stance(set, personas, Stance::Critical))
            .or_else(|| lowest(set.ok_opinions()));
        if let Some(op) = source {
            steps.push(format!(
                "Critical: {}",
                excerpt(&op.justification, excerpt_chars)
            ));
        }
        if !spec.forensic_instruction.is_empty() {
            steps.push(format!("Investigate: {}", spec.forensic_instruction));
        }
    } else if ratio >= 0.8 {
        let source = by_stance(set, personas, Stance::Lenient)
            .next()
            .or_else(|| set.ok_opinions().max_by_key(|o| o.score));
        if let Some(op) = source {
            steps.push(format!("Polish: {}", excerpt(&op.justification, excerpt_chars)));
        }
    } else {
        let source = by_stance(set, personas, Stance::Pragmatic)
            .next()
            .or_else(|| set.ok_opinions().next());
        if let Some(op) = source {
            steps.push(format!("Refine: {}", excerpt(&op.justification, excerpt_chars)));
        }
    }

    let citations: Vec<&str> = set
        .ok_opinions()
        .filter(|o| stance_of(personas, &o.persona) == Some(Stance::Critical))
        .flat_map(|o| o.citations.iter().map(String::as_str))
        .take(3)
        .collect();
    if !citations.is_empty() {
        steps.push(format!("Review evidence: {}", citations.join(", ")));
    }

    steps
}
