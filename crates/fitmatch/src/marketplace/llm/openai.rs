use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::runtime::Runtime;
use tracing::debug;

use super::{
    CapabilityError, ProfileLine, RankingContext, RankingOracle, RankingOutcome, SkillExtractor,
    Summarizer,
};
use crate::config::LlmConfig;

const SUMMARIZE_SYSTEM_PROMPT: &str = "You review the submitted profile of a service \
professional. Write a short paragraph summarizing their expertise, experience, and \
qualifications, suitable for showing to prospective clients. Reply with the paragraph only.";

const EXTRACT_SYSTEM_PROMPT: &str = "You review the submitted profile of a service \
professional. List the distinct professional skills it mentions. Reply with a single \
comma-separated list of skill names and nothing else.";

const RANK_SYSTEM_PROMPT: &str = "You match a client's service request against a pool of \
verified professionals. Reply with strict JSON only, no prose and no code fences, matching: \
{\"rationale\": string, \"ranked\": [{\"professional_id\": string, \"rank\": number, \
\"rationale\": string}]}. Include at most 3 entries, rank them 1-based starting at the best \
fit, and use only professional ids present in the submitted pool.";

/// Adapter for any OpenAI-compatible `/chat/completions` endpoint.
///
/// The capability traits are synchronous, so the adapter keeps its own tokio
/// runtime and blocks on it, the same way the Drive-style gateways wrap their
/// async hubs. Requests carry the configured timeout; a slow or dead endpoint
/// surfaces as a `Transport` error for the caller to degrade on.
pub struct OpenAiClient {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
    runtime: Runtime,
}

impl OpenAiClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, CapabilityError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or(CapabilityError::Unconfigured)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| CapabilityError::Transport(err.to_string()))?;
        let runtime =
            Runtime::new().map_err(|err| CapabilityError::Transport(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key,
            model: config.model.clone(),
            runtime,
        })
    }

    fn complete(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user.to_string(),
                },
            ],
            temperature: 0.0,
        };

        let url = format!("{}/chat/completions", self.endpoint.trim_end_matches('/'));
        debug!(%url, model = %self.model, "dispatching chat completion");

        let response = self.runtime.block_on(async {
            self.client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&request)
                .send()
                .await?
                .error_for_status()?
                .json::<ChatResponse>()
                .await
        });

        let response = response.map_err(|err| CapabilityError::Transport(err.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CapabilityError::Protocol("completion carried no choices".to_string()))
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl Summarizer for OpenAiClient {
    fn summarize(&self, profile_corpus: &str) -> Result<String, CapabilityError> {
        let summary = self.complete(SUMMARIZE_SYSTEM_PROMPT, profile_corpus)?;
        Ok(summary.trim().to_string())
    }
}

impl SkillExtractor for OpenAiClient {
    fn extract(&self, profile_corpus: &str) -> Result<String, CapabilityError> {
        let skills = self.complete(EXTRACT_SYSTEM_PROMPT, profile_corpus)?;
        Ok(skills.trim().to_string())
    }
}

impl RankingOracle for OpenAiClient {
    fn rank(
        &self,
        context: &RankingContext,
        pool: &[ProfileLine],
    ) -> Result<RankingOutcome, CapabilityError> {
        let profiles = pool
            .iter()
            .map(ProfileLine::render)
            .collect::<Vec<_>>()
            .join("\n---\n");
        let prompt = format!(
            "Service request:\ncategory: {}\ndescription: {}\nbudget: {}\n\nProfessional pool:\n{}",
            context.category,
            context.description,
            context.budget.as_deref().unwrap_or("not stated"),
            profiles,
        );

        let content = self.complete(RANK_SYSTEM_PROMPT, &prompt)?;
        serde_json::from_str::<RankingOutcome>(content.trim()).map_err(|err| {
            CapabilityError::Protocol(format!("ranking payload did not validate: {err}"))
        })
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
