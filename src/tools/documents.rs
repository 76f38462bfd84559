//! Local document search over indexed plain-text files.
//!
//! Indexed files are copied as plain text into the configured documents
//! directory; retrieval ranks paragraphs by token overlap with the query.
//! Embedding-based retrieval backends stay outside this crate — this store
//! is the registry-facing stand-in with the same tool surface.

use crate::error::{AssistantError, Result};
use crate::speech::SpeechSynthesizer;
use crate::tools::{Tool, ToolOutput, text_arg};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::error;

/// A retrieval hit: source file name plus the matching paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentHit {
    pub file: String,
    pub paragraph: String,
}

/// Directory-backed plain-text document store.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    dir: PathBuf,
}

impl DocumentStore {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Copy a file's text content into the index.
    ///
    /// # Errors
    ///
    /// `Tool` when the source cannot be read as text or the index cannot be
    /// written.
    pub fn index_file(&self, source: &Path) -> Result<String> {
        let content = std::fs::read_to_string(source)
            .map_err(|e| AssistantError::Tool(format!("cannot read {}: {e}", source.display())))?;

        let name = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| {
                AssistantError::Tool(format!("unusable file name: {}", source.display()))
            })?;

        std::fs::create_dir_all(&self.dir)?;
        let target = self.dir.join(format!("{name}.txt"));
        std::fs::write(&target, content)?;
        Ok(name.to_owned())
    }

    /// Find the paragraph best matching `query` across all indexed files.
    ///
    /// Returns `None` when nothing overlaps the query at all.
    #[must_use]
    pub fn search(&self, query: &str) -> Option<DocumentHit> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return None;
        }

        let entries = std::fs::read_dir(&self.dir).ok()?;
        let mut best: Option<(f32, DocumentHit)> = None;

        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("txt") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            let file = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("documento")
                .to_owned();

            for paragraph in content.split("\n\n") {
                let paragraph = paragraph.trim();
                if paragraph.is_empty() {
                    continue;
                }
                let score = overlap_score(&query_tokens, paragraph);
                if score > 0.0 && best.as_ref().is_none_or(|(s, _)| score > *s) {
                    best = Some((
                        score,
                        DocumentHit {
                            file: file.clone(),
                            paragraph: paragraph.to_owned(),
                        },
                    ));
                }
            }
        }

        best.map(|(_, hit)| hit)
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_owned())
        .filter(|t| !t.is_empty())
        .collect()
}

/// Fraction of query tokens present in the paragraph.
fn overlap_score(query_tokens: &HashSet<String>, paragraph: &str) -> f32 {
    let paragraph_tokens = tokenize(paragraph);
    let hits = query_tokens
        .iter()
        .filter(|t| paragraph_tokens.contains(*t))
        .count();
    hits as f32 / query_tokens.len() as f32
}

async fn announce(voice: &Arc<dyn SpeechSynthesizer>, text: &str) {
    if let Err(e) = voice.speak(text).await {
        error!("speech synthesis failed: {e}");
    }
}

/// Answers questions from indexed documents.
pub struct DocSearchTool {
    store: DocumentStore,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl DocSearchTool {
    #[must_use]
    pub fn new(store: DocumentStore, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { store, voice }
    }
}

#[async_trait]
impl Tool for DocSearchTool {
    fn name(&self) -> &'static str {
        "doc_search"
    }

    fn description(&self) -> &'static str {
        "perguntas sobre documentos ou arquivos locais já indexados."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("consulta.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(query) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "O que você gostaria de pesquisar nos seus arquivos?",
            ));
        };

        announce(&self.voice, "Pesquisando nos seus arquivos...").await;

        let store = self.store.clone();
        let query_for_worker = query.clone();
        let hit = tokio::task::spawn_blocking(move || store.search(&query_for_worker))
            .await
            .unwrap_or_else(|e| {
                error!("document search worker failed: {e}");
                None
            });

        match hit {
            Some(hit) => Ok(ToolOutput::text(format!(
                "Encontrei no arquivo {}: {}",
                hit.file, hit.paragraph
            ))),
            None => Ok(ToolOutput::text(
                "Não encontrei nada sobre isso nos seus arquivos.",
            )),
        }
    }
}

/// Ingests a file into the local index.
pub struct DocIndexTool {
    store: DocumentStore,
    voice: Arc<dyn SpeechSynthesizer>,
}

impl DocIndexTool {
    #[must_use]
    pub fn new(store: DocumentStore, voice: Arc<dyn SpeechSynthesizer>) -> Self {
        Self { store, voice }
    }
}

#[async_trait]
impl Tool for DocIndexTool {
    fn name(&self) -> &'static str {
        "doc_index"
    }

    fn description(&self) -> &'static str {
        "aprender ou indexar um arquivo local."
    }

    fn args_hint(&self) -> Option<&'static str> {
        Some("caminho do arquivo.")
    }

    async fn invoke(&self, args: Option<serde_json::Value>) -> Result<ToolOutput> {
        let Some(raw_path) = text_arg(args.as_ref()) else {
            return Ok(ToolOutput::text(
                "Qual arquivo você gostaria que eu aprendesse?",
            ));
        };
        let path = PathBuf::from(raw_path.trim_matches(['"', '\'']));
        let basename = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("arquivo")
            .to_owned();

        announce(&self.voice, &format!("Processando o arquivo {basename}...")).await;

        let store = self.store.clone();
        let outcome = tokio::task::spawn_blocking(move || store.index_file(&path))
            .await
            .unwrap_or_else(|e| Err(AssistantError::Task(format!("index worker: {e}"))));

        match outcome {
            Ok(_name) => Ok(ToolOutput::text(format!(
                "Arquivo {basename} aprendido com sucesso!"
            ))),
            Err(e) => {
                error!("failed to index '{basename}': {e}");
                Ok(ToolOutput::text(
                    "Não consegui ler o arquivo. Verifique se o caminho está correto.",
                ))
            }
        }
    }
}
