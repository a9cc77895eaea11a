//! Scripted collaborators for unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use archwright_core::{BlobStore, MemoryBlobStore, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, Notify};

use crate::conversation::Collaborators;
use crate::engine::{CollaboratorError, ModelClient, ModelRequest};
use crate::retrieval::Retriever;

/// Replies with canned strings in order and records every request.
#[derive(Clone, Default)]
pub struct ScriptedModel {
    replies: Arc<Mutex<VecDeque<Result<String, CollaboratorError>>>>,
    requests: Arc<Mutex<Vec<ModelRequest>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<String>) -> Self {
        Self::with_results(replies.into_iter().map(Ok).collect())
    }

    pub fn with_results(replies: Vec<Result<String, CollaboratorError>>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

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
            .unwrap_or_else(|| Err(CollaboratorError::model("script exhausted")))
    }
}

/// Blocks every reply until released.
pub struct GatedModel {
    pub entered: Notify,
    pub release: Notify,
    pub reply: String,
}

impl GatedModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            entered: Notify::new(),
            release: Notify::new(),
            reply: reply.into(),
        }
    }
}

#[async_trait]
impl ModelClient for GatedModel {
    async fn reply(&self, _request: &ModelRequest) -> Result<String, CollaboratorError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(self.reply.clone())
    }
}

#[derive(Default)]
pub struct StaticRetriever {
    fragments: Vec<String>,
}

impl StaticRetriever {
    pub fn new(fragments: Vec<String>) -> Self {
        Self { fragments }
    }
}

#[async_trait]
impl Retriever for StaticRetriever {
    async fn query(
        &self,
        _knowledge_base_id: &str,
        _topic: &str,
        k: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.fragments.iter().take(k).cloned().collect())
    }
}

/// Every query fails, as an unreachable knowledge base would.
pub struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn query(&self, _: &str, _: &str, _: usize) -> Result<Vec<String>, CollaboratorError> {
        Err(CollaboratorError::retrieval("index offline"))
    }
}

/// Wraps a store and fails writes to keys under chosen prefixes.
pub struct FlakyStore {
    inner: Arc<MemoryBlobStore>,
    failing: Mutex<Vec<String>>,
}

impl FlakyStore {
    pub fn new(inner: Arc<MemoryBlobStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(vec![]),
        }
    }

    pub async fn fail_writes_with_prefix(&self, prefix: &str) {
        self.failing.lock().await.push(prefix.to_string());
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn read_blob(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.inner.read_blob(key).await
    }

    async fn write_blob(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        if self.failing.lock().await.iter().any(|p| key.starts_with(p)) {
            return Err(StoreError::Backend(format!("injected failure for {key}")));
        }
        self.inner.write_blob(key, value).await
    }

    async fn delete_blob(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete_blob(key).await
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.inner.list_keys(prefix).await
    }
}

pub fn collaborators(model: impl ModelClient + 'static) -> Collaborators {
    Collaborators {
        model: Arc::new(model),
        store: Arc::new(MemoryBlobStore::new()),
        retriever: Arc::new(StaticRetriever::default()),
    }
}
