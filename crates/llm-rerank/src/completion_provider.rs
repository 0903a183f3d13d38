//! Chat-completion-backed rerank provider (spec §4.8).
//!
//! Sends the mention and its top blended candidates to a completion model
//! and asks for a strict JSON ranking. The model's response is parsed and
//! validated against the input candidate set before being trusted; a
//! malformed or invalid response is treated the same as a transport
//! failure (recoverable, blend order survives).

use crate::error::LlmRerankError;
use crate::provider::{validate_ranking, RerankProvider, RerankedCandidate};
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_openai::Client;
use async_trait::async_trait;
use reconcile_core::config::LlmRerankConfig;
use reconcile_core::entities::Candidate;
use reconcile_core::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are re-ranking candidate authority records for an entity \
reconciliation service. You are given a mention string and a list of candidates, each with a \
numeric id and a label. Return a JSON object with a single key \"ranking\": an array containing \
every input id exactly once, ordered from most to least likely to be the correct match, each \
with a \"confidence\" number between 0 and 1. Never invent an id that is not in the input, never \
omit one, never duplicate one.";

#[derive(Serialize)]
struct PromptCandidate<'a> {
    id: i64,
    label: &'a str,
}

#[derive(Deserialize)]
struct RankingResponse {
    ranking: Vec<RankingEntry>,
}

#[derive(Deserialize)]
struct RankingEntry {
    id: i64,
    confidence: f64,
}

pub struct CompletionRerankProvider {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl CompletionRerankProvider {
    pub fn new(config: &LlmRerankConfig) -> Self {
        let mut openai_config = OpenAIConfig::new();
        if let Some(base_url) = &config.api_base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        if let Some(api_key) = &config.api_key {
            openai_config = openai_config.with_api_key(api_key);
        }
        Self {
            client: Client::with_config(openai_config),
            model: config.model.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    async fn complete(&self, mention: &str, candidates: &[Candidate]) -> std::result::Result<RankingResponse, LlmRerankError> {
        let prompt_candidates: Vec<PromptCandidate> = candidates
            .iter()
            .map(|c| PromptCandidate { id: c.id, label: &c.label })
            .collect();

        let user_content = serde_json::json!({
            "mention": mention,
            "candidates": prompt_candidates,
        })
        .to_string();

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.model.clone())
            .response_format(ResponseFormat::JsonObject)
            .messages(vec![
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(SYSTEM_PROMPT)
                    .build()
                    .map_err(|e| LlmRerankError::ConfigError(e.to_string()))?
                    .into(),
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user_content)
                    .build()
                    .map_err(|e| LlmRerankError::ConfigError(e.to_string()))?
                    .into(),
            ])
            .build()
            .map_err(|e| LlmRerankError::ConfigError(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmRerankError::InferenceError("request timed out".to_string()))?
            .map_err(|e| LlmRerankError::InferenceError(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmRerankError::MalformedResponse("empty completion".to_string()))?;

        serde_json::from_str(&content).map_err(|e| LlmRerankError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl RerankProvider for CompletionRerankProvider {
    async fn rerank(&self, mention: &str, candidates: &[Candidate]) -> Result<Vec<RerankedCandidate>> {
        let response = self.complete(mention, candidates).await?;
        let ranked: Vec<RerankedCandidate> = response
            .ranking
            .into_iter()
            .map(|entry| RerankedCandidate {
                id: entry.id,
                llm_confidence: entry.confidence,
            })
            .collect();

        if let Err(reason) = validate_ranking(candidates, &ranked) {
            warn!(reason, "llm rerank produced an invalid ranking, falling back to blend order");
            return Err(LlmRerankError::InvalidRanking(reason).into());
        }

        Ok(ranked)
    }
}
