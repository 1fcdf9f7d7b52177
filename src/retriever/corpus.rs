//! Local corpus retriever.
//!
//! Walks `corpus_dir`, chunks every matching text file with the paragraph
//! chunker, and serves queries from an [`InMemoryRetriever`]. The corpus
//! is the plain-text output of the document translation job; PDF
//! extraction and translation happen before this point.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use scheme_nav_core::chunk::chunk_text;
use scheme_nav_core::retriever::memory::InMemoryRetriever;
use scheme_nav_core::{Passage, Retriever, SearchHit};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::path::Path;
use walkdir::WalkDir;

use crate::config::RetrieverConfig;

pub struct CorpusRetriever {
    index: InMemoryRetriever,
    documents: usize,
}

impl CorpusRetriever {
    /// Index the configured corpus directory.
    pub fn load(config: &RetrieverConfig) -> Result<Self> {
        let root = config
            .corpus_dir
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("retriever.corpus_dir is not configured"))?;
        Self::from_dir(
            root,
            &config.include_globs,
            &config.exclude_globs,
            config.chunk_max_tokens,
        )
    }

    pub fn from_dir(
        root: &Path,
        include_globs: &[String],
        exclude_globs: &[String],
        max_tokens: usize,
    ) -> Result<Self> {
        if !root.is_dir() {
            bail!("Corpus directory does not exist: {}", root.display());
        }

        let include_set = build_globset(include_globs)?;
        let mut excludes = vec!["**/.git/**".to_string()];
        excludes.extend(exclude_globs.iter().cloned());
        let exclude_set = build_globset(&excludes)?;

        let mut files = Vec::new();
        for entry in WalkDir::new(root) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let relative = path.strip_prefix(root).unwrap_or(path);
            let rel_str = relative.to_string_lossy().replace('\\', "/");

            if exclude_set.is_match(&rel_str) || !include_set.is_match(&rel_str) {
                continue;
            }
            files.push((rel_str, path.to_path_buf()));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut index = InMemoryRetriever::new();
        let mut seen = HashSet::new();
        let mut documents = 0;

        for (rel_str, path) in &files {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read corpus file: {}", path.display()))?;
            let chunks = chunk_text(rel_str, &body, max_tokens);
            if !chunks.is_empty() {
                documents += 1;
            }
            for chunk in chunks {
                if !seen.insert(chunk.hash) {
                    continue;
                }
                let mut metadata = Map::new();
                metadata.insert("source".to_string(), Value::String(rel_str.clone()));
                metadata.insert("chunk_index".to_string(), Value::from(chunk.chunk_index));
                index.push(Passage {
                    id: chunk.id,
                    text: chunk.text,
                    metadata,
                });
            }
        }

        Ok(Self { index, documents })
    }

    /// Indexed passages.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Files that contributed at least one passage.
    pub fn documents(&self) -> usize {
        self.documents
    }
}

#[async_trait]
impl Retriever for CorpusRetriever {
    fn name(&self) -> &str {
        "local"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        self.index.search(query).await
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}
