use async_trait::async_trait;
use llm::builder::{LLMBackend, LLMBuilder};
use llm::chat::ChatMessage;
use tracing::{debug, info};

use archwright_core::{ai_configured, ConversationTurn, Role, Settings};

/// Failure of an external collaborator (model or retrieval). Never retried here.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        collaborator: &'static str,
        reason: String,
    },
    #[error("model returned an empty reply")]
    EmptyReply,
}

impl CollaboratorError {
    pub fn model(reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            collaborator: "model",
            reason: reason.into(),
        }
    }

    pub fn retrieval(reason: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            collaborator: "retrieval",
            reason: reason.into(),
        }
    }
}

/// Everything one model call needs. `history` excludes the outbound `message`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRequest {
    pub system: String,
    pub history: Vec<ConversationTurn>,
    pub message: String,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn reply(&self, request: &ModelRequest) -> Result<String, CollaboratorError>;
}

fn map_backend(provider: &str) -> Result<LLMBackend, CollaboratorError> {
    match provider {
        "openai" => Ok(LLMBackend::OpenAI),
        "anthropic" => Ok(LLMBackend::Anthropic),
        "google" => Ok(LLMBackend::Google),
        "ollama" => Ok(LLMBackend::Ollama),
        "groq" => Ok(LLMBackend::Groq),
        "mistral" => Ok(LLMBackend::Mistral),
        "deepseek" => Ok(LLMBackend::DeepSeek),
        other => Err(CollaboratorError::model(format!("unknown provider: {other}"))),
    }
}

/// Model client backed by the `llm` crate, configured from user settings.
#[derive(Debug, Clone)]
pub struct LlmModelClient {
    settings: Settings,
}

impl LlmModelClient {
    pub fn new(settings: Settings) -> Result<Self, CollaboratorError> {
        if !ai_configured(&settings) {
            return Err(CollaboratorError::model(
                "no provider configured; set provider, model and api key",
            ));
        }
        map_backend(&settings.provider)?;
        Ok(Self { settings })
    }
}

#[async_trait]
impl ModelClient for LlmModelClient {
    async fn reply(&self, request: &ModelRequest) -> Result<String, CollaboratorError> {
        let backend = map_backend(&self.settings.provider)?;

        let mut builder = LLMBuilder::new()
            .backend(backend)
            .model(&self.settings.model)
            .max_tokens(self.settings.max_output_tokens)
            .system(&request.system);

        if !self.settings.api_key.is_empty() {
            builder = builder.api_key(&self.settings.api_key);
        }

        let llm = builder
            .build()
            .map_err(|e| CollaboratorError::model(format!("build LLM: {e}")))?;

        let mut messages: Vec<ChatMessage> = request
            .history
            .iter()
            .map(|turn| match turn.role {
                Role::User => ChatMessage::user().content(&turn.text).build(),
                Role::Assistant => ChatMessage::assistant().content(&turn.text).build(),
            })
            .collect();
        messages.push(ChatMessage::user().content(&request.message).build());

        info!(
            provider = %self.settings.provider,
            model = %self.settings.model,
            history = request.history.len(),
            "sending model request"
        );
        let response = llm
            .chat(&messages)
            .await
            .map_err(|e| CollaboratorError::model(format!("chat: {e}")))?;

        match response.text() {
            Some(text) if !text.trim().is_empty() => {
                debug!(chars = text.len(), "model replied");
                Ok(text)
            }
            _ => Err(CollaboratorError::EmptyReply),
        }
    }
}
