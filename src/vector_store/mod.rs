//! Course index abstraction for Kurs.
//!
//! The index holds two logical collections: a course catalog (one record per
//! course, used for name resolution and outlines) and course content (many
//! chunks per course, used for semantic search). Backends implement
//! [`CourseIndex`]; distances are cosine distances, lower is more similar.

mod memory;
mod sqlite;

pub use memory::MemoryCourseIndex;
pub use sqlite::SqliteCourseIndex;

use crate::error::Result;
use crate::models::{Course, CourseChunk};
use async_trait::async_trait;

/// Metadata constraint applied to a content query.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchFilter {
    /// `course_title == value`
    CourseTitle(String),
    /// `lesson_number == value`
    LessonNumber(u32),
    /// Every clause must hold.
    And(Vec<SearchFilter>),
}

impl SearchFilter {
    /// Evaluate the filter against a chunk's metadata.
    pub fn matches(&self, chunk: &CourseChunk) -> bool {
        match self {
            SearchFilter::CourseTitle(title) => chunk.course_title == *title,
            SearchFilter::LessonNumber(n) => chunk.lesson_number == Some(*n),
            SearchFilter::And(clauses) => clauses.iter().all(|c| c.matches(chunk)),
        }
    }
}

/// A chunk paired with its embedding, ready to be written.
#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: CourseChunk,
    pub embedding: Vec<f32>,
}

/// A content query hit.
#[derive(Debug, Clone)]
pub struct ContentMatch {
    pub chunk: CourseChunk,
    /// Cosine distance to the query (lower is better).
    pub distance: f32,
}

/// A catalog query hit.
#[derive(Debug, Clone)]
pub struct CatalogMatch {
    pub course: Course,
    /// Cosine distance to the query (lower is better).
    pub distance: f32,
}

/// Trait for course index backends.
#[async_trait]
pub trait CourseIndex: Send + Sync {
    /// Insert or replace a course's catalog record.
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()>;

    /// Nearest catalog records to the query embedding.
    async fn query_catalog(&self, query_embedding: &[f32], limit: usize)
        -> Result<Vec<CatalogMatch>>;

    /// Point lookup of a catalog record by canonical title.
    async fn get_course(&self, title: &str) -> Result<Option<Course>>;

    /// All catalog records, ordered by title.
    async fn list_courses(&self) -> Result<Vec<Course>>;

    /// Number of catalog records.
    async fn course_count(&self) -> Result<usize>;

    /// Replace every chunk of a course with the given set.
    ///
    /// Readers never observe a mix of old and new chunks for the course.
    async fn replace_course_content(&self, course_title: &str, chunks: &[IndexedChunk])
        -> Result<usize>;

    /// Nearest content chunks matching the filter, ascending by distance.
    async fn query_content(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>>;

    /// Number of content chunks.
    async fn content_count(&self) -> Result<usize>;

    /// Remove all catalog records and content chunks.
    async fn clear(&self) -> Result<()>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Cosine distance in `[0, 2]`.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}

/// Sort hits ascending by distance and keep the first `limit`.
pub(crate) fn rank_by_distance<T>(mut hits: Vec<T>, limit: usize, distance: impl Fn(&T) -> f32) -> Vec<T> {
    hits.sort_by(|a, b| {
        distance(a)
            .partial_cmp(&distance(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    hits.truncate(limit);
    hits
}
