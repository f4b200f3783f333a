//! Prompt ingestion: an ordered list of prompt texts per tournament.

use crate::types::Prompt;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

pub type PromptSourceResult<T> = Result<T, PromptSourceError>;

#[derive(Debug, thiserror::Error)]
pub enum PromptSourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait that all prompt sources must implement
#[async_trait]
pub trait PromptSource: Send + Sync {
    /// Raw prompt texts for `name` in source order; empty if there are none
    async fn fetch(&self, name: &str) -> PromptSourceResult<Vec<String>>;
}

/// Trim texts, drop blanks and give each remaining prompt a fresh id
pub fn prompts_from_texts(texts: Vec<String>) -> Vec<Prompt> {
    texts
        .into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .map(Prompt::new)
        .collect()
}

#[derive(Debug, Default)]
pub struct MemoryPromptSource {
    lists: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryPromptSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set(&self, name: &str, texts: &[&str]) {
        self.lists.write().await.insert(
            name.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
    }
}

#[async_trait]
impl PromptSource for MemoryPromptSource {
    async fn fetch(&self, name: &str) -> PromptSourceResult<Vec<String>> {
        Ok(self.lists.read().await.get(name).cloned().unwrap_or_default())
    }
}

/// Reads `<dir>/<name>.txt`, one prompt per line. A missing file means no prompts.
#[derive(Debug, Clone)]
pub struct FilePromptSource {
    dir: PathBuf,
}

impl FilePromptSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PromptSource for FilePromptSource {
    async fn fetch(&self, name: &str) -> PromptSourceResult<Vec<String>> {
        let path = self.dir.join(format!("{}.txt", name));
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Ok(raw.lines().map(str::to_string).collect()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!("No prompt file at {}", path.display());
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_from_texts_trims_and_skips_blanks() {
        let prompts = prompts_from_texts(vec![
            "  Dogs ".to_string(),
            "".to_string(),
            "   ".to_string(),
            "Cats".to_string(),
        ]);
        let texts: Vec<_> = prompts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Dogs", "Cats"]);
        assert_ne!(prompts[0].id, prompts[1].id);
    }

    #[tokio::test]
    async fn test_file_source_reads_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("period-2.txt"), "Alpha\n\nBeta\r\nGamma\n").unwrap();

        let source = FilePromptSource::new(dir.path());
        let prompts = prompts_from_texts(source.fetch("period-2").await.unwrap());
        let texts: Vec<_> = prompts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha", "Beta", "Gamma"]);
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FilePromptSource::new(dir.path());
        assert!(source.fetch("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_memory_source() {
        let source = MemoryPromptSource::new();
        source.set("t", &["A", "B"]).await;
        assert_eq!(source.fetch("t").await.unwrap(), vec!["A", "B"]);
        assert!(source.fetch("other").await.unwrap().is_empty());
    }
}
