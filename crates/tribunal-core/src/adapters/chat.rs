//! Judge backed by an OpenAI-compatible chat-completion endpoint.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ChatConfig;
use crate::domain::{CriterionSpec, EvidenceBundle, JudicialOpinion, Persona, Result, TribunalError};
use crate::judicial::{parse_opinion, OpinionProducer};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReplyMessage,
}

#[derive(Debug, Deserialize)]
struct ChatReplyMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct ChatOpinionProducer {
    config: ChatConfig,
    api_key: Option<String>,
    http_client: reqwest::Client,
}

impl ChatOpinionProducer {
    pub fn new(config: ChatConfig, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("tribunal/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| TribunalError::Config(format!("http client: {e}")))?;
        let api_key = config.resolve_api_key();
        Ok(Self {
            config,
            api_key,
            http_client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, system: &str, user: &str) -> std::result::Result<String, String> {
        let body = ChatRequest {
            model: &self.config.model,
            temperature: self.config.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
        };
        let mut request = self.http_client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| format!("transport: {e}"))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("http {status}: {}", text.trim()));
        }
        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| format!("invalid reply: {e}"))?;
        reply
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "empty reply".to_string())
    }
}

/// System prompt: who the judge is and how to answer.
pub fn system_prompt(criterion: &CriterionSpec, persona: &Persona) -> String {
    let mut out = String::new();
    out.push_str(&format!("You are the {} on an audit tribunal.\n", persona.id));
    out.push_str(persona.stance.philosophy());
    out.push_str("\n\n");
    out.push_str(&format!(
        "Score only the criterion \"{}\" ({}) on an integer scale from 0 to {}.\n",
        criterion.name, criterion.id, criterion.maximum
    ));
    if let Some(guidance) = criterion.guidance_for(&persona.id) {
        out.push_str(&format!("Judicial guidance: {guidance}\n"));
    }
    out.push_str(
        "Cite evidence as \"<kind>\" or \"<kind>:<key>\" where kind is repository, \
         document or visual and key is a field of that evidence.\n",
    );
    out.push_str(
        "Reply with one JSON object: {\"score\": <int>, \"justification\": <string>, \
         \"citations\": [<string>, ...]}.\n",
    );
    out
}

/// User prompt: the criterion and the evidence digest.
pub fn user_prompt(bundle: &EvidenceBundle, criterion: &CriterionSpec) -> String {
    let mut out = String::new();
    out.push_str(&format!("Criterion: {}\n", criterion.name));
    if !criterion.description.is_empty() {
        out.push_str(&format!("{}\n", criterion.description));
    }
    if !criterion.forensic_instruction.is_empty() {
        out.push_str(&format!("Forensic instruction: {}\n", criterion.forensic_instruction));
    }
    out.push_str("\nEvidence:\n");
    out.push_str(&bundle.summary());
    out
}

#[async_trait]
impl OpinionProducer for ChatOpinionProducer {
    async fn produce(
        &self,
        bundle: &EvidenceBundle,
        criterion: &CriterionSpec,
        persona: &Persona,
    ) -> JudicialOpinion {
        let system = system_prompt(criterion, persona);
        let user = user_prompt(bundle, criterion);
        debug!(criterion = %criterion.id, persona = %persona.id, model = %self.config.model, "requesting opinion");
        match self.complete(&system, &user).await {
            Ok(raw) => parse_opinion(&raw, criterion, &persona.id),
            Err(reason) => JudicialOpinion::failed(&criterion.id, &persona.id, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{EvidenceKind, EvidenceRecord, Rubric};
    use crate::evidence::aggregate;
    use serde_json::json;

    fn bundle() -> EvidenceBundle {
        aggregate(
            vec![EvidenceRecord::ok(EvidenceKind::Repository, json!({"commits": 3}))],
            &[EvidenceKind::Repository].into_iter().collect(),
            0,
        )
    }

    #[test]
    fn test_system_prompt_carries_stance_and_guidance() {
        let rubric = Rubric::default();
        let criterion = &rubric.dimensions[0];
        let persona = &Persona::default_panel()[0];
        let prompt = system_prompt(criterion, persona);
        assert!(prompt.contains("prosecutor"));
        assert!(prompt.contains(persona.stance.philosophy()));
        assert!(prompt.contains(&format!("0 to {}", criterion.maximum)));
        assert!(prompt.contains("Judicial guidance:"));
    }

    #[test]
    fn test_user_prompt_includes_evidence_summary() {
        let rubric = Rubric::default();
        let prompt = user_prompt(&bundle(), &rubric.dimensions[0]);
        assert!(prompt.contains("Verify code structure and tool registration"));
        assert!(prompt.contains("keys: commits"));
    }

    #[tokio::test]
    async fn test_transport_error_is_failed_opinion() {
        let config = ChatConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            api_key_env: Vec::new(),
            ..ChatConfig::default()
        };
        let producer = ChatOpinionProducer::new(config, Duration::from_secs(5)).unwrap();
        let rubric = Rubric::default();
        let persona = &Persona::default_panel()[1];
        let opinion = producer
            .produce(&bundle(), &rubric.dimensions[0], persona)
            .await;
        assert!(!opinion.is_ok());
        assert_eq!(opinion.persona, "defense");
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let config = ChatConfig {
            base_url: "https://llm.example/v1/".to_string(),
            ..ChatConfig::default()
        };
        let producer = ChatOpinionProducer::new(config, Duration::from_secs(1)).unwrap();
        assert_eq!(producer.endpoint(), "https://llm.example/v1/chat/completions");
    }
}
