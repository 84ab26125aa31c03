use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::GroqConfig;

/// Fixed sampling temperature for all prompts.
const TEMPERATURE: f32 = 0.7;

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

/// Outcome of one completion call. Failures carry a structured cause plus
/// the raw body so the caller decides how to present them; there is no error
/// path past this type.
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Answer(String),
    Failed { cause: String, raw_body: String },
}

impl CompletionOutcome {
    /// Text for the reply message: the answer verbatim, or the diagnostic
    /// fallback including the raw provider response.
    pub fn into_reply_text(self) -> String {
        match self {
            CompletionOutcome::Answer(text) => text,
            CompletionOutcome::Failed { cause, raw_body } => {
                format!("Could not get AI response: {cause}\n\nRaw response: {raw_body}")
            }
        }
    }
}

pub struct CompletionClient {
    client: reqwest::Client,
    config: GroqConfig,
}

impl CompletionClient {
    pub fn new(config: GroqConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Issue one chat-completion request. Network errors, non-2xx statuses,
    /// and malformed bodies all fold into `CompletionOutcome::Failed`; this
    /// call never returns an error and never panics.
    pub async fn complete(&self, prompt: &str) -> CompletionOutcome {
        let request = ChatRequest {
            model: self.config.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: TEMPERATURE,
        };

        let url = format!("{}/chat/completions", self.config.base_url);

        debug!("Sending completion request to {}", url);

        let response = match self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Completion request failed: {}", e);
                return CompletionOutcome::Failed {
                    cause: e.to_string(),
                    raw_body: String::new(),
                };
            }
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to read completion response body: {}", e);
                return CompletionOutcome::Failed {
                    cause: e.to_string(),
                    raw_body: String::new(),
                };
            }
        };

        if !status.is_success() {
            warn!("Completion provider returned {}", status);
            return CompletionOutcome::Failed {
                cause: format!("provider returned {status}"),
                raw_body: body,
            };
        }

        match extract_content(&body) {
            Ok(content) => CompletionOutcome::Answer(content),
            Err(cause) => {
                warn!("Malformed completion response: {}", cause);
                CompletionOutcome::Failed {
                    cause,
                    raw_body: body,
                }
            }
        }
    }
}

/// Pull `choices[0].message.content` out of a response body, verbatim.
fn extract_content(body: &str) -> Result<String, String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| e.to_string())?;
    parsed
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content)
        .ok_or_else(|| "response contained no choices".to_string())
}
