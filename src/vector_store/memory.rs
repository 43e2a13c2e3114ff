//! In-memory course index implementation.
//!
//! Useful for testing and small course sets.

use super::{
    cosine_distance, rank_by_distance, CatalogMatch, ContentMatch, CourseIndex, IndexedChunk,
    SearchFilter,
};
use crate::error::{KursError, Result};
use crate::models::Course;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

struct CatalogEntry {
    course: Course,
    embedding: Vec<f32>,
}

/// In-memory course index.
pub struct MemoryCourseIndex {
    catalog: RwLock<HashMap<String, CatalogEntry>>,
    content: RwLock<Vec<IndexedChunk>>,
}

impl MemoryCourseIndex {
    /// Create a new in-memory course index.
    pub fn new() -> Self {
        Self {
            catalog: RwLock::new(HashMap::new()),
            content: RwLock::new(Vec::new()),
        }
    }
}

impl Default for MemoryCourseIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: PoisonError<T>) -> KursError {
    KursError::Index(format!("Index lock poisoned: {}", e))
}

#[async_trait]
impl CourseIndex for MemoryCourseIndex {
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let mut catalog = self.catalog.write().map_err(poisoned)?;
        catalog.insert(
            course.title.clone(),
            CatalogEntry {
                course: course.clone(),
                embedding: embedding.to_vec(),
            },
        );
        Ok(())
    }

    async fn query_catalog(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogMatch>> {
        let catalog = self.catalog.read().map_err(poisoned)?;
        let hits: Vec<CatalogMatch> = catalog
            .values()
            .map(|entry| CatalogMatch {
                course: entry.course.clone(),
                distance: cosine_distance(query_embedding, &entry.embedding),
            })
            .collect();
        Ok(rank_by_distance(hits, limit, |m: &CatalogMatch| m.distance))
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let catalog = self.catalog.read().map_err(poisoned)?;
        Ok(catalog.get(title).map(|entry| entry.course.clone()))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let catalog = self.catalog.read().map_err(poisoned)?;
        let mut courses: Vec<Course> = catalog.values().map(|e| e.course.clone()).collect();
        courses.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(courses)
    }

    async fn course_count(&self) -> Result<usize> {
        Ok(self.catalog.read().map_err(poisoned)?.len())
    }

    async fn replace_course_content(
        &self,
        course_title: &str,
        chunks: &[IndexedChunk],
    ) -> Result<usize> {
        // Single write guard: readers see either the old set or the new one.
        let mut content = self.content.write().map_err(poisoned)?;
        content.retain(|c| c.chunk.course_title != course_title);
        content.extend(chunks.iter().cloned());
        Ok(chunks.len())
    }

    async fn query_content(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>> {
        let content = self.content.read().map_err(poisoned)?;
        let hits: Vec<ContentMatch> = content
            .iter()
            .filter(|c| filter.map_or(true, |f| f.matches(&c.chunk)))
            .map(|c| ContentMatch {
                chunk: c.chunk.clone(),
                distance: cosine_distance(query_embedding, &c.embedding),
            })
            .collect();
        Ok(rank_by_distance(hits, limit, |m: &ContentMatch| m.distance))
    }

    async fn content_count(&self) -> Result<usize> {
        Ok(self.content.read().map_err(poisoned)?.len())
    }

    async fn clear(&self) -> Result<()> {
        self.catalog.write().map_err(poisoned)?.clear();
        self.content.write().map_err(poisoned)?.clear();
        Ok(())
    }
}
