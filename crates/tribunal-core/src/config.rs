//! Audit configuration, loadable from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration:
//!
//! ```toml
//! report_dir = "audit/reports"
//!
//! [pipeline]
//! max_evidence_retries = 1
//! opinion_timeout_secs = 60
//!
//! [synthesis]
//! security_ceiling = 2
//!
//! [[personas]]
//! id = "prosecutor"
//! stance = "critical"
//!
//! [collectors.repository]
//! program = "repo-inspector"
//! args = ["--json", "{target}"]
//! unresolvable_exit_code = 2
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{validate_personas, EvidenceKind, Persona, Result, Rubric, TribunalError};
use crate::pipeline::dispatch::DispatchLimits;
use crate::synthesis::SynthesisPolicy;

/// Pipeline controller knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_evidence_retries: u32,
    pub collector_timeout_secs: u64,
    pub opinion_timeout_secs: u64,
    pub max_concurrent_opinions: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_evidence_retries: 1,
            collector_timeout_secs: 120,
            opinion_timeout_secs: 90,
            max_concurrent_opinions: 8,
        }
    }
}

impl PipelineConfig {
    pub fn collector_limits(&self) -> DispatchLimits {
        DispatchLimits {
            timeout: Duration::from_secs(self.collector_timeout_secs),
            max_concurrent: EvidenceKind::ALL.len(),
        }
    }

    pub fn opinion_limits(&self) -> DispatchLimits {
        DispatchLimits {
            timeout: Duration::from_secs(self.opinion_timeout_secs),
            max_concurrent: self.max_concurrent_opinions,
        }
    }
}

/// OpenAI-compatible chat-completion endpoint used by the judges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    /// Environment variables consulted in order for the API key.
    pub api_key_env: Vec<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: "https://openrouter.ai/api/v1".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
            temperature: 0.2,
            api_key_env: ["OPENROUTER_API_KEY", "DEEPSEEK_API_KEY", "OPENAI_API_KEY"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ChatConfig {
    /// First non-empty API key among `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key_env
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty())
    }
}

/// External program that gathers one kind of evidence.
///
/// Placeholders in `args`: `{target}`, `{document}`, and a standalone
/// `{images}` argument that expands to one argument per image. Without any
/// placeholder, the kind's inputs are appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandCollectorConfig {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Exit code meaning "the target cannot be resolved at all".
    #[serde(default)]
    pub unresolvable_exit_code: Option<i32>,
}

/// Top-level audit configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub pipeline: PipelineConfig,
    pub synthesis: SynthesisPolicy,
    pub personas: Vec<Persona>,
    pub chat: ChatConfig,
    pub collectors: BTreeMap<EvidenceKind, CommandCollectorConfig>,
    pub rubric_path: Option<PathBuf>,
    pub report_dir: PathBuf,
    /// Local checkpoint database directory (SurrealKV).
    pub state_dir: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            synthesis: SynthesisPolicy::default(),
            personas: Persona::default_panel(),
            chat: ChatConfig::default(),
            collectors: BTreeMap::new(),
            rubric_path: None,
            report_dir: PathBuf::from("reports"),
            state_dir: PathBuf::from(".tribunal/state"),
        }
    }
}

impl AuditConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: AuditConfig =
            toml::from_str(text).map_err(|e| TribunalError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            TribunalError::Config(format!("read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        validate_personas(&self.personas)?;
        self.synthesis.validate()?;
        if self.pipeline.max_concurrent_opinions == 0 {
            return Err(TribunalError::Config(
                "max_concurrent_opinions must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured rubric, or the built-in default when no path is set.
    pub fn rubric(&self) -> Result<Rubric> {
        match &self.rubric_path {
            Some(path) => Rubric::load(path),
            None => Ok(Rubric::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Stance;

    #[test]
    fn test_empty_toml_is_default() {
        let config = AuditConfig::from_toml_str("").unwrap();
        assert_eq!(config, AuditConfig::default());
        assert_eq!(config.pipeline.max_evidence_retries, 1);
        assert_eq!(config.personas.len(), 3);
    }

    #[test]
    fn test_full_toml() {
        let config = AuditConfig::from_toml_str(
            r#"
            report_dir = "out"

            [pipeline]
            opinion_timeout_secs = 30

            [synthesis]
            security_ceiling = 1
            security_keywords = ["rce"]

            [[personas]]
            id = "skeptic"
            stance = "critical"
            weight = 2.0

            [[personas]]
            id = "fan"
            stance = "lenient"

            [collectors.repository]
            program = "inspect-repo"
            args = ["{target}"]
            unresolvable_exit_code = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.report_dir, PathBuf::from("out"));
        assert_eq!(config.pipeline.opinion_timeout_secs, 30);
        assert_eq!(config.pipeline.collector_timeout_secs, 120);
        assert_eq!(config.synthesis.security_ceiling, 1);
        assert_eq!(config.synthesis.dissent_threshold, 2);
        assert_eq!(config.personas[0].stance, Stance::Critical);
        assert_eq!(config.personas[1].weight, 1.0);
        assert_eq!(
            config.collectors[&EvidenceKind::Repository].unresolvable_exit_code,
            Some(3)
        );
        assert_eq!(
            config.pipeline.opinion_limits().timeout,
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(AuditConfig::from_toml_str("personas = []").is_err());
        assert!(AuditConfig::from_toml_str("[pipeline]\nmax_concurrent_opinions = 0").is_err());
        assert!(AuditConfig::from_toml_str("report_dir = 7").is_err());
    }
}
