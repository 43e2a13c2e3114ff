//! Course name resolution.
//!
//! Maps a free-text course reference ("python", "MCP course") to the
//! canonical course title used as the index key.

use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::CourseIndex;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Resolves a user-supplied course reference to a canonical title.
#[async_trait]
pub trait NameResolver: Send + Sync {
    /// Best canonical title for `course_name`, or `None` if nothing matches.
    async fn resolve(&self, course_name: &str) -> Result<Option<String>>;
}

/// Resolves names by similarity search over the course catalog.
pub struct IndexNameResolver {
    index: Arc<dyn CourseIndex>,
    embedder: Arc<dyn Embedder>,
    max_distance: Option<f32>,
}

impl IndexNameResolver {
    pub fn new(index: Arc<dyn CourseIndex>, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            index,
            embedder,
            max_distance: None,
        }
    }

    /// Reject catalog matches farther than `max_distance`.
    pub fn with_max_distance(mut self, max_distance: f32) -> Self {
        self.max_distance = Some(max_distance);
        self
    }
}

#[async_trait]
impl NameResolver for IndexNameResolver {
    async fn resolve(&self, course_name: &str) -> Result<Option<String>> {
        let embedding = self.embedder.embed(course_name).await?;
        let best = self.index.query_catalog(&embedding, 1).await?.into_iter().next();

        let resolved = best
            .filter(|m| self.max_distance.map_or(true, |max| m.distance <= max))
            .map(|m| m.course.title);

        debug!("Resolved course name {:?} -> {:?}", course_name, resolved);
        Ok(resolved)
    }
}

/// Resolves names against a fixed title list.
///
/// An exact (case-insensitive) match wins; otherwise the first title that
/// contains the query as a substring.
pub struct StaticNameResolver {
    titles: Vec<String>,
}

impl StaticNameResolver {
    pub fn new<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            titles: titles.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl NameResolver for StaticNameResolver {
    async fn resolve(&self, course_name: &str) -> Result<Option<String>> {
        let needle = course_name.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(None);
        }

        let exact = self.titles.iter().find(|t| t.to_lowercase() == needle);
        let partial = || self.titles.iter().find(|t| t.to_lowercase().contains(&needle));

        Ok(exact.or_else(partial).cloned())
    }
}
