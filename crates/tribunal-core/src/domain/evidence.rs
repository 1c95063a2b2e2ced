//! Evidence records and the aggregated evidence bundle.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Category of external input gathered for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Repository,
    Document,
    Visual,
}

impl EvidenceKind {
    pub const ALL: [EvidenceKind; 3] = [
        EvidenceKind::Repository,
        EvidenceKind::Document,
        EvidenceKind::Visual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EvidenceKind::Repository => "repository",
            EvidenceKind::Document => "document",
            EvidenceKind::Visual => "visual",
        }
    }

    /// Resolve a kind name or one of its aliases (case-insensitive).
    pub fn from_alias(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "repository" | "repo" | "git" | "code" => Some(EvidenceKind::Repository),
            "document" | "doc" | "pdf" => Some(EvidenceKind::Document),
            "visual" | "image" | "diagram" | "vision" => Some(EvidenceKind::Visual),
            _ => None,
        }
    }
}

impl fmt::Display for EvidenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one collector invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EvidenceStatus {
    Ok,
    /// `retryable == false` means the target itself could not be resolved.
    Failed { reason: String, retryable: bool },
    Skipped { reason: String },
}

/// A single typed evidence record produced by a collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRecord {
    pub kind: EvidenceKind,
    pub status: EvidenceStatus,
    /// Collector-specific payload, present only when `status` is `Ok`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Dispatch attempt that produced this record (0 = first dispatch).
    #[serde(default)]
    pub attempt: u32,
}

impl EvidenceRecord {
    pub fn ok(kind: EvidenceKind, payload: Value) -> Self {
        Self {
            kind,
            status: EvidenceStatus::Ok,
            payload: Some(payload),
            attempt: 0,
        }
    }

    pub fn failed(kind: EvidenceKind, reason: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind,
            status: EvidenceStatus::Failed {
                reason: reason.into(),
                retryable,
            },
            payload: None,
            attempt: 0,
        }
    }

    pub fn skipped(kind: EvidenceKind, reason: impl Into<String>) -> Self {
        Self {
            kind,
            status: EvidenceStatus::Skipped {
                reason: reason.into(),
            },
            payload: None,
            attempt: 0,
        }
    }

    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn is_ok(&self) -> bool {
        matches!(self.status, EvidenceStatus::Ok)
    }

    pub fn is_unresolvable(&self) -> bool {
        matches!(
            self.status,
            EvidenceStatus::Failed {
                retryable: false,
                ..
            }
        )
    }
}

/// Merged evidence for one aggregation attempt.
///
/// Built only by [`crate::evidence::aggregate`]; read-only afterwards.
/// Re-aggregation produces a new bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBundle {
    records: BTreeMap<EvidenceKind, EvidenceRecord>,
    required: BTreeSet<EvidenceKind>,
    missing: BTreeSet<EvidenceKind>,
    attempt: u32,
}

impl EvidenceBundle {
    pub(crate) fn from_parts(
        records: BTreeMap<EvidenceKind, EvidenceRecord>,
        required: BTreeSet<EvidenceKind>,
        attempt: u32,
    ) -> Self {
        let missing = required
            .iter()
            .filter(|kind| !records.get(kind).is_some_and(EvidenceRecord::is_ok))
            .copied()
            .collect();
        Self {
            records,
            required,
            missing,
            attempt,
        }
    }

    pub fn records(&self) -> &BTreeMap<EvidenceKind, EvidenceRecord> {
        &self.records
    }

    pub fn record(&self, kind: EvidenceKind) -> Option<&EvidenceRecord> {
        self.records.get(&kind)
    }

    pub fn required(&self) -> &BTreeSet<EvidenceKind> {
        &self.required
    }

    /// Required kinds without an `ok` record.
    pub fn missing(&self) -> &BTreeSet<EvidenceKind> {
        &self.missing
    }

    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Payload of the `ok` record for `kind`, if any.
    pub fn ok_payload(&self, kind: EvidenceKind) -> Option<&Value> {
        self.records
            .get(&kind)
            .filter(|r| r.is_ok())
            .and_then(|r| r.payload.as_ref())
    }

    /// Deterministic plain-text digest of the bundle, used in judge prompts.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "evidence attempt {} ({})\n",
            self.attempt,
            if self.is_complete() {
                "complete"
            } else {
                "incomplete"
            }
        );
        for kind in EvidenceKind::ALL {
            let line = match self.records.get(&kind) {
                None => "not collected".to_string(),
                Some(record) => match &record.status {
                    EvidenceStatus::Ok => {
                        let keys = match record.payload.as_ref() {
                            Some(Value::Object(map)) => {
                                let mut keys: Vec<&str> = map.keys().map(String::as_str).collect();
                                keys.sort_unstable();
                                keys.join(", ")
                            }
                            Some(_) => "(scalar)".to_string(),
                            None => "(empty)".to_string(),
                        };
                        format!("ok; keys: {keys}")
                    }
                    EvidenceStatus::Failed { reason, .. } => format!("failed ({reason})"),
                    EvidenceStatus::Skipped { reason } => format!("skipped ({reason})"),
                },
            };
            out.push_str(&format!("- {kind}: {line}\n"));
        }
        if !self.missing.is_empty() {
            let names: Vec<&str> = self.missing.iter().map(EvidenceKind::as_str).collect();
            out.push_str(&format!("missing: {}\n", names.join(", ")));
        }
        out
    }
}

/// A judge's reference to a piece of evidence: `<kind>[:<key>]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub kind: EvidenceKind,
    pub key: Option<String>,
}

impl Citation {
    /// Parse a citation string. Returns `None` when the kind is not recognized.
    pub fn parse(raw: &str) -> Option<Self> {
        let (kind, key) = match raw.split_once(':') {
            Some((kind, key)) => (kind, Some(key.trim())),
            None => (raw, None),
        };
        let kind = EvidenceKind::from_alias(kind)?;
        let key = key.filter(|k| !k.is_empty()).map(str::to_string);
        Some(Self { kind, key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bundle(records: Vec<EvidenceRecord>, required: &[EvidenceKind]) -> EvidenceBundle {
        let map = records.into_iter().map(|r| (r.kind, r)).collect();
        EvidenceBundle::from_parts(map, required.iter().copied().collect(), 0)
    }

    #[test]
    fn test_kind_aliases() {
        assert_eq!(EvidenceKind::from_alias("Git"), Some(EvidenceKind::Repository));
        assert_eq!(EvidenceKind::from_alias("pdf"), Some(EvidenceKind::Document));
        assert_eq!(EvidenceKind::from_alias("diagram"), Some(EvidenceKind::Visual));
        assert_eq!(EvidenceKind::from_alias("tarot"), None);
    }

    #[test]
    fn test_citation_parse() {
        assert_eq!(
            Citation::parse("repo:commit_history"),
            Some(Citation {
                kind: EvidenceKind::Repository,
                key: Some("commit_history".to_string()),
            })
        );
        assert_eq!(
            Citation::parse("document"),
            Some(Citation {
                kind: EvidenceKind::Document,
                key: None,
            })
        );
        assert_eq!(Citation::parse("vision: "), Citation::parse("vision"));
        assert_eq!(Citation::parse("src/main.rs:12"), None);
    }

    #[test]
    fn test_missing_and_completeness() {
        let b = bundle(
            vec![
                EvidenceRecord::ok(EvidenceKind::Repository, json!({"files": 3})),
                EvidenceRecord::failed(EvidenceKind::Document, "pdf unreadable", true),
            ],
            &[EvidenceKind::Repository, EvidenceKind::Document],
        );
        assert!(!b.is_complete());
        assert_eq!(
            b.missing().iter().copied().collect::<Vec<_>>(),
            vec![EvidenceKind::Document]
        );
        assert!(b.ok_payload(EvidenceKind::Document).is_none());
        assert_eq!(b.ok_payload(EvidenceKind::Repository), Some(&json!({"files": 3})));
    }

    #[test]
    fn test_summary_is_deterministic() {
        let b = bundle(
            vec![
                EvidenceRecord::ok(EvidenceKind::Repository, json!({"zeta": 1, "alpha": 2})),
                EvidenceRecord::skipped(EvidenceKind::Visual, "no images"),
            ],
            &[EvidenceKind::Repository],
        );
        assert_eq!(
            b.summary(),
            "evidence attempt 0 (complete)\n\
             - repository: ok; keys: alpha, zeta\n\
             - document: not collected\n\
             - visual: skipped (no images)\n"
        );
    }

    #[test]
    fn test_status_serializes_tagged() {
        let rec = EvidenceRecord::failed(EvidenceKind::Repository, "clone failed", false);
        let v = serde_json::to_value(&rec).unwrap();
        assert_eq!(v["status"]["status"], json!("failed"));
        assert_eq!(v["status"]["retryable"], json!(false));
        assert!(rec.is_unresolvable());
    }
}
