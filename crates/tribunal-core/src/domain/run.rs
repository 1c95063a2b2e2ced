//! Run identity.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::evidence::EvidenceKind;

/// Identifies one audit run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    /// Repository URL or local path.
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    pub trace_id: String,
    pub created_at: DateTime<Utc>,
}

impl RunContext {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            document: None,
            images: Vec::new(),
            trace_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_document(mut self, document: impl Into<String>) -> Self {
        self.document = Some(document.into());
        self
    }

    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = images;
        self
    }

    pub fn with_trace_id(mut self, trace_id: impl Into<String>) -> Self {
        self.trace_id = trace_id.into();
        self
    }

    /// Whether the run carries input for `kind`.
    pub fn has_input(&self, kind: EvidenceKind) -> bool {
        match kind {
            EvidenceKind::Repository => true,
            EvidenceKind::Document => self.document.is_some(),
            EvidenceKind::Visual => !self.images.is_empty(),
        }
    }

    /// Kinds that must be `ok` for the bundle to be complete.
    pub fn required_kinds(&self) -> BTreeSet<EvidenceKind> {
        EvidenceKind::ALL
            .into_iter()
            .filter(|k| self.has_input(*k))
            .collect()
    }
}
