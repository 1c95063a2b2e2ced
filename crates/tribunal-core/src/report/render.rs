//! Markdown rendering of a [`FinalVerdict`].

use crate::domain::{CriterionVerdict, FinalVerdict, ResolutionRule};

fn marker(v: &CriterionVerdict) -> &'static str {
    let ratio = f64::from(v.score) / f64::from(v.maximum.max(1));
    if ratio >= 0.8 {
        "✅"
    } else if ratio <= 0.4 {
        "❌"
    } else {
        "⚠️"
    }
}

fn join_rules<'a>(rules: impl Iterator<Item = &'a ResolutionRule>) -> String {
    let names: Vec<&str> = rules.map(ResolutionRule::as_str).collect();
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

/// Full report: executive summary, evidence, per-criterion breakdown.
pub fn render_report_md(verdict: &FinalVerdict) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Audit Report: {}\n\n", verdict.target));
    out.push_str(&format!(
        "- trace: `{}`\n- rubric: {}\n- created: {}\n\n",
        verdict.trace_id,
        verdict.rubric_name,
        verdict.created_at.to_rfc3339()
    ));

    out.push_str("## Executive Summary\n\n");
    out.push_str(&format!(
        "Overall score: **{:.2} / {:.2}** ({}%)\n\n",
        verdict.overall_score, verdict.max_possible, verdict.percentage
    ));
    out.push_str(&format!(
        "Synthesis rules triggered: {}\n\n",
        join_rules(verdict.triggered_rules.iter())
    ));

    out.push_str("### Key Findings\n\n");
    for c in &verdict.criteria {
        out.push_str(&format!(
            "- {} {}: {}/{}\n",
            marker(c),
            c.criterion_name,
            c.score,
            c.maximum
        ));
    }
    out.push('\n');

    out.push_str("## Evidence\n\n");
    out.push_str("```text\n");
    out.push_str(&verdict.evidence_summary);
    out.push_str("```\n\n");

    if !verdict.missing_evidence.is_empty() {
        out.push_str("### Missing Evidence\n\n");
        for kind in &verdict.missing_evidence {
            out.push_str(&format!("- {}\n", kind));
        }
        let compensated: Vec<&CriterionVerdict> = verdict
            .criteria
            .iter()
            .filter(|c| c.has_rule(ResolutionRule::FactSupremacy))
            .collect();
        if !compensated.is_empty() {
            out.push_str("\nCompensated by `fact_supremacy` in: ");
            let ids: Vec<&str> = compensated.iter().map(|c| c.criterion_id.as_str()).collect();
            out.push_str(&ids.join(", "));
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("## Criterion Breakdown\n");
    for c in &verdict.criteria {
        out.push_str(&format!("\n### {} (`{}`)\n\n", c.criterion_name, c.criterion_id));
        out.push_str(&format!(
            "- score: {}/{}\n- rule: {}\n- rules: {}\n- variance: {}\n",
            c.score,
            c.maximum,
            c.applied_rule(),
            join_rules(c.rules.iter()),
            c.variance
        ));
        if !c.failed_personas.is_empty() {
            out.push_str(&format!("- failed judges: {}\n", c.failed_personas.join(", ")));
        }
        if !c.down_weighted.is_empty() {
            out.push_str(&format!("- down-weighted: {}\n", c.down_weighted.join(", ")));
        }
        if let Some(note) = &c.dissent_note {
            out.push_str(&format!("\n> {}\n", note));
        }
        if !c.remediation.is_empty() {
            out.push_str("\n**Remediation**\n\n");
            for (i, step) in c.remediation.iter().enumerate() {
                out.push_str(&format!("{}. {}\n", i + 1, step));
            }
        }
    }
    out
}

/// One-table summary.
pub fn render_summary_md(verdict: &FinalVerdict) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Audit Summary: {}\n\n", verdict.target));
    out.push_str("| Criterion | Score | Rule | Variance |\n");
    out.push_str("|---|---|---|---|\n");
    for c in &verdict.criteria {
        out.push_str(&format!(
            "| {} | {}/{} | {} | {} |\n",
            c.criterion_name,
            c.score,
            c.maximum,
            c.applied_rule(),
            c.variance
        ));
    }
    out.push_str(&format!(
        "| **Overall** | **{:.2}/{:.2} ({}%)** | | |\n",
        verdict.overall_score, verdict.max_possible, verdict.percentage
    ));
    out
}
