use std::collections::VecDeque;
use std::sync::Arc;

use archwright_core::BlobStore;
use archwright_sync::{
    CollaboratorError, Collaborators, ModelClient, ModelRequest, Retriever,
};
use async_trait::async_trait;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<String>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Arc::new(Mutex::new(replies.into_iter().map(Into::into).collect())),
            requests: Arc::default(),
        }
    }

    #[allow(dead_code)]
    pub async fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn reply(&self, request: &ModelRequest) -> Result<String, CollaboratorError> {
        self.requests.lock().await.push(request.clone());
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| CollaboratorError::model("script exhausted"))
    }
}

#[allow(dead_code)]
pub struct NoRetrieval;

#[async_trait]
impl Retriever for NoRetrieval {
    async fn query(&self, _: &str, _: &str, _: usize) -> Result<Vec<String>, CollaboratorError> {
        Ok(vec![])
    }
}

pub fn collaborators(
    model: ScriptedModel,
    store: Arc<dyn BlobStore>,
    retriever: Arc<dyn Retriever>,
) -> Collaborators {
    Collaborators {
        model: Arc::new(model),
        store,
        retriever,
    }
}

/// A model reply: prose followed by one fenced json block.
pub fn reply(text: &str, payload: serde_json::Value) -> String {
    format!("{text}\n```json\n{payload}\n```")
}
