//! Knowledge-base retrieval for lesson grounding and plan drafting.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::engine::CollaboratorError;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// Files a knowledge base is built from.
pub const DEFAULT_PATTERNS: &[&str] =
    &["*.md", "*.txt", "*.rs", "*.ts", "*.tsx", "*.js", "*.jsx"];

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Up to `k` text fragments relevant to `topic`, best first.
    async fn query(
        &self,
        knowledge_base_id: &str,
        topic: &str,
        k: usize,
    ) -> Result<Vec<String>, CollaboratorError>;
}

#[derive(Debug, Clone)]
struct Chunk {
    text: String,
    terms: HashSet<String>,
}

/// Each knowledge base is a directory under `root`, named by its id.
/// Chunks are built on first query and cached for the process lifetime.
pub struct DirectoryRetriever {
    root: PathBuf,
    patterns: Vec<glob::Pattern>,
    cache: Mutex<HashMap<String, Arc<Vec<Chunk>>>>,
}

impl DirectoryRetriever {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let patterns = DEFAULT_PATTERNS
            .iter()
            .filter_map(|p| glob::Pattern::new(p).ok())
            .collect();
        Self {
            root: root.into(),
            patterns,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_patterns(mut self, patterns: &[&str]) -> Result<Self, glob::PatternError> {
        self.patterns = patterns
            .iter()
            .map(|p| glob::Pattern::new(p))
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    async fn chunks(&self, knowledge_base_id: &str) -> Result<Arc<Vec<Chunk>>, CollaboratorError> {
        let valid = !knowledge_base_id.is_empty()
            && !knowledge_base_id.starts_with('.')
            && !knowledge_base_id.contains(['/', '\\']);
        if !valid {
            return Err(CollaboratorError::retrieval(format!(
                "invalid knowledge base id '{knowledge_base_id}'"
            )));
        }

        if let Some(chunks) = self.cache.lock().await.get(knowledge_base_id) {
            return Ok(Arc::clone(chunks));
        }

        let dir = self.root.join(knowledge_base_id);
        if !dir.is_dir() {
            warn!(
                knowledge_base = knowledge_base_id,
                path = %dir.display(),
                "knowledge base directory missing, no fragments"
            );
            return Ok(Arc::new(Vec::new()));
        }

        let patterns = self.patterns.clone();
        let chunks = tokio::task::spawn_blocking(move || load_chunks(&dir, &patterns))
            .await
            .map_err(|e| CollaboratorError::retrieval(format!("indexing task failed: {e}")))?;
        info!(
            knowledge_base = knowledge_base_id,
            chunks = chunks.len(),
            "knowledge base indexed"
        );

        // Indexing runs unlocked; if two queries raced, the first insert wins.
        let mut cache = self.cache.lock().await;
        let chunks = cache
            .entry(knowledge_base_id.to_string())
            .or_insert_with(|| Arc::new(chunks));
        Ok(Arc::clone(chunks))
    }
}

#[async_trait]
impl Retriever for DirectoryRetriever {
    async fn query(
        &self,
        knowledge_base_id: &str,
        topic: &str,
        k: usize,
    ) -> Result<Vec<String>, CollaboratorError> {
        let chunks = self.chunks(knowledge_base_id).await?;
        let wanted = terms(topic);
        if wanted.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<(usize, usize)> = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.terms.intersection(&wanted).count(), i))
            .filter(|(score, _)| *score > 0)
            .collect();
        // Stable on index so equal scores keep document order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));

        let hits: Vec<String> = scored
            .into_iter()
            .take(k)
            .map(|(_, i)| chunks[i].text.clone())
            .collect();
        debug!(knowledge_base = knowledge_base_id, topic, hits = hits.len(), "retrieval query");
        Ok(hits)
    }
}

fn load_chunks(dir: &Path, patterns: &[glob::Pattern]) -> Vec<Chunk> {
    let mut files: Vec<PathBuf> = ignore::WalkBuilder::new(dir)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|name| patterns.iter().any(|p| p.matches(name)))
        })
        .collect();
    files.sort();

    let mut chunks = Vec::new();
    for path in files {
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable knowledge file");
                continue;
            }
        };
        chunks.extend(split_text(&text, CHUNK_SIZE, CHUNK_OVERLAP).into_iter().map(|text| Chunk {
            terms: terms(&text),
            text,
        }));
    }
    chunks
}

/// Split into windows of at most `size` chars that overlap by about
/// `overlap` chars. Windows end at a newline or space when one falls in
/// the second half of the window.
pub fn split_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = size.max(1);
    let overlap = overlap.min(size / 2);
    let mut out = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let hard_end = (start + size).min(chars.len());
        let end = if hard_end == chars.len() {
            hard_end
        } else {
            (start + size / 2..hard_end)
                .rev()
                .find(|&i| chars[i] == '\n' || chars[i] == ' ')
                .map(|i| i + 1)
                .unwrap_or(hard_end)
        };

        let piece: String = chars[start..end].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            out.push(piece.to_string());
        }
        if end == chars.len() {
            break;
        }
        start = end.saturating_sub(overlap).max(start + 1);
    }
    out
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect()
}
