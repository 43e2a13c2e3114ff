//! Course retrieval engine.
//!
//! Wraps a [`CourseIndex`]: resolves fuzzy course references to canonical
//! titles, builds metadata filters, runs similarity search over course
//! content and reports everything through a uniform [`SearchResults`]
//! envelope. Search never returns `Err`; failures land in the envelope.

mod resolver;

pub use resolver::{IndexNameResolver, NameResolver, StaticNameResolver};

use crate::embedding::Embedder;
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk};
use crate::vector_store::{ContentMatch, CourseIndex, IndexedChunk, SearchFilter};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Metadata attached to a matched chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkMetadata {
    pub course_title: String,
    pub lesson_number: Option<u32>,
    pub chunk_index: u32,
}

/// Result envelope of a content search.
///
/// `documents`, `metadata` and `distances` always have equal length, ordered
/// most similar first. When `error` is set all three are empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResults {
    documents: Vec<String>,
    metadata: Vec<ChunkMetadata>,
    distances: Vec<f32>,
    error: Option<String>,
}

impl SearchResults {
    /// Build an envelope from ranked index matches.
    pub fn from_matches(matches: Vec<ContentMatch>) -> Self {
        let mut results = Self::default();
        for m in matches {
            let CourseChunk {
                content,
                course_title,
                lesson_number,
                chunk_index,
            } = m.chunk;
            results.documents.push(content);
            results.metadata.push(ChunkMetadata {
                course_title,
                lesson_number,
                chunk_index,
            });
            results.distances.push(m.distance);
        }
        results
    }

    /// An empty envelope carrying an error message.
    pub fn empty(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn metadata(&self) -> &[ChunkMetadata] {
        &self.metadata
    }

    pub fn distances(&self) -> &[f32] {
        &self.distances
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Iterate `(document, metadata, distance)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ChunkMetadata, f32)> {
        self.documents
            .iter()
            .zip(&self.metadata)
            .zip(&self.distances)
            .map(|((d, m), dist)| (d.as_str(), m, *dist))
    }
}

/// Combine course and lesson constraints into a single filter.
///
/// No constraint yields `None`, one yields a single equality clause and two
/// yield an `And` with the course clause first.
pub fn build_filter(course_title: Option<&str>, lesson_number: Option<u32>) -> Option<SearchFilter> {
    let mut clauses: Vec<SearchFilter> = course_title
        .map(|t| SearchFilter::CourseTitle(t.to_string()))
        .into_iter()
        .chain(lesson_number.map(SearchFilter::LessonNumber))
        .collect();

    match clauses.len() {
        0 => None,
        1 => clauses.pop(),
        _ => Some(SearchFilter::And(clauses)),
    }
}

/// Retrieval engine over the course index.
pub struct SearchEngine {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
    resolver: Arc<dyn NameResolver>,
    max_results: usize,
}

impl SearchEngine {
    /// Create an engine that resolves course names against the index catalog.
    ///
    /// `max_results` must be positive: a zero cap would make every content
    /// search come back empty, so it is rejected here.
    pub fn new(
        index: Arc<dyn CourseIndex>,
        embedder: Arc<dyn Embedder>,
        max_results: usize,
    ) -> Result<Self> {
        if max_results == 0 {
            return Err(KursError::Config(
                "max_results must be a positive integer".to_string(),
            ));
        }

        let resolver = Arc::new(IndexNameResolver::new(index.clone(), embedder.clone()));
        Ok(Self {
            index,
            embedder,
            resolver,
            max_results,
        })
    }

    /// Treat catalog matches farther than `max_distance` as unresolved.
    pub fn with_resolve_distance(mut self, max_distance: f32) -> Self {
        self.resolver = Arc::new(
            IndexNameResolver::new(self.index.clone(), self.embedder.clone())
                .with_max_distance(max_distance),
        );
        self
    }

    /// Swap in a different course name resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn NameResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Search course content, optionally constrained to a course and lesson.
    #[instrument(skip(self), fields(max_results = self.max_results))]
    pub async fn search(
        &self,
        query: &str,
        course_name: Option<&str>,
        lesson_number: Option<u32>,
    ) -> SearchResults {
        let course_title = match course_name {
            Some(name) => match self.resolver.resolve(name).await {
                Ok(Some(title)) => Some(title),
                Ok(None) => {
                    info!("No course matched {:?}", name);
                    return SearchResults::empty(format!("No course found matching '{}'", name));
                }
                Err(e) => {
                    warn!("Course resolution failed: {}", e);
                    return SearchResults::empty(format!("Search error: {}", e));
                }
            },
            None => None,
        };

        let filter = build_filter(course_title.as_deref(), lesson_number);
        debug!("Content search filter: {:?}", filter);

        match self.query_content(query, filter.as_ref()).await {
            Ok(matches) => SearchResults::from_matches(matches),
            Err(e) => {
                warn!("Content search failed: {}", e);
                SearchResults::empty(format!("Search error: {}", e))
            }
        }
    }

    async fn query_content(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>> {
        let embedding = self.embedder.embed(query).await?;
        self.index
            .query_content(&embedding, self.max_results, filter)
            .await
    }

    /// Resolve a free-text course reference to its canonical title.
    pub async fn resolve_course_name(&self, course_name: &str) -> Result<Option<String>> {
        self.resolver.resolve(course_name).await
    }

    /// Full catalog record for a canonical title.
    pub async fn get_course_outline(&self, course_title: &str) -> Result<Option<Course>> {
        self.index.get_course(course_title).await
    }

    /// Course link by canonical title; `None` when absent or on lookup failure.
    pub async fn get_course_link(&self, course_title: &str) -> Option<String> {
        match self.index.get_course(course_title).await {
            Ok(course) => course.and_then(|c| c.course_link),
            Err(e) => {
                warn!("Course link lookup failed for {}: {}", course_title, e);
                None
            }
        }
    }

    /// Lesson link by canonical title and lesson number; `None` when absent
    /// or on lookup failure.
    pub async fn get_lesson_link(&self, course_title: &str, lesson_number: u32) -> Option<String> {
        match self.index.get_course(course_title).await {
            Ok(course) => course
                .and_then(|c| c.lesson(lesson_number).and_then(|l| l.lesson_link.clone())),
            Err(e) => {
                warn!(
                    "Lesson link lookup failed for {} lesson {}: {}",
                    course_title, lesson_number, e
                );
                None
            }
        }
    }

    /// Titles of every indexed course.
    pub async fn get_existing_course_titles(&self) -> Result<Vec<String>> {
        Ok(self
            .index
            .list_courses()
            .await?
            .into_iter()
            .map(|c| c.title)
            .collect())
    }

    pub async fn get_course_count(&self) -> Result<usize> {
        self.index.course_count().await
    }

    /// Every catalog record, lessons included.
    pub async fn get_all_courses_metadata(&self) -> Result<Vec<Course>> {
        self.index.list_courses().await
    }

    /// Write a course's catalog record.
    #[instrument(skip(self, course), fields(title = %course.title))]
    pub async fn add_course_metadata(&self, course: &Course) -> Result<()> {
        course.validate()?;
        let embedding = self.embedder.embed(&course.catalog_text()).await?;
        self.index.upsert_course(course, &embedding).await
    }

    /// Write content chunks, replacing each affected course's prior chunks.
    ///
    /// Chunks are grouped by course; each group is the course's complete new
    /// chunk set.
    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    pub async fn add_course_content(&self, chunks: &[CourseChunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let mut by_course: BTreeMap<&str, Vec<&CourseChunk>> = BTreeMap::new();
        for chunk in chunks {
            by_course.entry(&chunk.course_title).or_default().push(chunk);
        }

        let mut written = 0;
        for (course_title, group) in by_course {
            let texts: Vec<String> = group.iter().map(|c| c.content.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != group.len() {
                return Err(KursError::Embedding(format!(
                    "Expected {} embeddings, got {}",
                    group.len(),
                    embeddings.len()
                )));
            }

            let indexed: Vec<IndexedChunk> = group
                .into_iter()
                .zip(embeddings)
                .map(|(chunk, embedding)| IndexedChunk {
                    chunk: chunk.clone(),
                    embedding,
                })
                .collect();

            written += self
                .index
                .replace_course_content(course_title, &indexed)
                .await?;
        }

        Ok(written)
    }

    /// Drop every course and chunk.
    pub async fn clear_all_data(&self) -> Result<()> {
        self.index.clear().await
    }
}
