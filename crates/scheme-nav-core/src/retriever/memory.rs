//! In-memory [`Retriever`] used for local corpora and tests.
//!
//! Ranking is plain term overlap: the score of a passage is the number of
//! distinct query terms it contains. Terms are lower-cased runs of word
//! characters: alphanumerics plus the combining signs of Indic scripts
//! (viramas, nuktas) and zero-width joiners, so a Kannada conjunct such as
//! `ಕೃಷ್ಣ` stays one term.
//! Ties keep insertion order and passages scoring zero are dropped.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;

use super::Retriever;
use crate::models::{Passage, SearchHit};

/// Default maximum number of hits returned per search.
pub const DEFAULT_LIMIT: usize = 20;

struct IndexedPassage {
    passage: Passage,
    terms: HashSet<String>,
}

pub struct InMemoryRetriever {
    passages: Vec<IndexedPassage>,
    limit: usize,
}

impl InMemoryRetriever {
    pub fn new() -> Self {
        Self {
            passages: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Index a passage. Later pushes rank after earlier ones on ties.
    pub fn push(&mut self, passage: Passage) {
        let terms = tokenize(&passage.text);
        self.passages.push(IndexedPassage { passage, terms });
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}

impl Default for InMemoryRetriever {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<Passage> for InMemoryRetriever {
    fn from_iter<I: IntoIterator<Item = Passage>>(iter: I) -> Self {
        let mut retriever = Self::new();
        for passage in iter {
            retriever.push(passage);
        }
        retriever
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric()
        || matches!(c, '\u{0300}'..='\u{036F}' | '\u{200C}' | '\u{200D}')
        // Indic blocks, Devanagari through Sinhala, minus the danda stops.
        || (matches!(c, '\u{0900}'..='\u{0DFF}') && !matches!(c, '\u{0964}' | '\u{0965}'))
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !is_word_char(c))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

#[async_trait]
impl Retriever for InMemoryRetriever {
    fn name(&self) -> &str {
        "memory"
    }

    async fn search(&self, query: &str) -> Result<Vec<SearchHit>> {
        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, &IndexedPassage)> = self
            .passages
            .iter()
            .map(|p| (query_terms.intersection(&p.terms).count(), p))
            .filter(|(score, _)| *score > 0)
            .collect();

        // sort_by is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(self.limit)
            .map(|(_, p)| SearchHit {
                id: Some(p.passage.id.clone()),
                text: Some(p.passage.text.clone()),
                metadata: Some(p.passage.metadata.clone()),
            })
            .collect())
    }
}
