//! Deterministic doubles shared by unit tests.

use crate::embedding::Embedder;
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk, Lesson};
use crate::rag::{LanguageModel, ModelRequest, ModelResponse, ToolCallRequest};
use crate::vector_store::{
    CatalogMatch, ContentMatch, CourseIndex, IndexedChunk, MemoryCourseIndex, SearchFilter,
};
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::sync::Mutex;

const DIMENSIONS: usize = 512;

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
///
/// Texts sharing words land close together; texts with no words in common
/// are orthogonal.
pub struct KeywordEmbedder;

impl KeywordEmbedder {
    pub fn new() -> Self {
        Self
    }

    fn embed_sync(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0; DIMENSIONS];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            vector[(hasher.finish() as usize) % DIMENSIONS] += 1.0;
        }
        vector
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::embed_sync(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::embed_sync(t)).collect())
    }

    fn dimensions(&self) -> usize {
        DIMENSIONS
    }
}

/// Keyword embedder whose first `n` batch calls fail.
pub struct FlakyEmbedder {
    inner: KeywordEmbedder,
    failures_left: Mutex<usize>,
}

impl FlakyEmbedder {
    pub fn failing_batches(n: usize) -> Self {
        Self {
            inner: KeywordEmbedder::new(),
            failures_left: Mutex::new(n),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(KursError::Embedding("rate limited".to_string()));
            }
        }
        self.inner.embed_batch(texts).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}

/// Index whose every call fails, for exercising error paths.
pub struct FailingIndex {
    pub message: String,
}

impl FailingIndex {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }

    fn fail<T>(&self) -> Result<T> {
        Err(KursError::Index(self.message.clone()))
    }
}

#[async_trait]
impl CourseIndex for FailingIndex {
    async fn upsert_course(&self, _course: &Course, _embedding: &[f32]) -> Result<()> {
        self.fail()
    }

    async fn query_catalog(&self, _embedding: &[f32], _limit: usize) -> Result<Vec<CatalogMatch>> {
        self.fail()
    }

    async fn get_course(&self, _title: &str) -> Result<Option<Course>> {
        self.fail()
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        self.fail()
    }

    async fn course_count(&self) -> Result<usize> {
        self.fail()
    }

    async fn replace_course_content(&self, _title: &str, _chunks: &[IndexedChunk]) -> Result<usize> {
        self.fail()
    }

    async fn query_content(
        &self,
        _embedding: &[f32],
        _limit: usize,
        _filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>> {
        self.fail()
    }

    async fn content_count(&self) -> Result<usize> {
        self.fail()
    }

    async fn clear(&self) -> Result<()> {
        self.fail()
    }
}

/// Wraps a memory index and records every content query's filter.
#[derive(Default)]
pub struct RecordingIndex {
    pub inner: MemoryCourseIndex,
    pub content_queries: Mutex<Vec<(usize, Option<SearchFilter>)>>,
}

impl RecordingIndex {
    pub fn content_queries(&self) -> Vec<(usize, Option<SearchFilter>)> {
        self.content_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl CourseIndex for RecordingIndex {
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        self.inner.upsert_course(course, embedding).await
    }

    async fn query_catalog(&self, embedding: &[f32], limit: usize) -> Result<Vec<CatalogMatch>> {
        self.inner.query_catalog(embedding, limit).await
    }

    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        self.inner.get_course(title).await
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        self.inner.list_courses().await
    }

    async fn course_count(&self) -> Result<usize> {
        self.inner.course_count().await
    }

    async fn replace_course_content(&self, title: &str, chunks: &[IndexedChunk]) -> Result<usize> {
        self.inner.replace_course_content(title, chunks).await
    }

    async fn query_content(
        &self,
        embedding: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>> {
        self.content_queries
            .lock()
            .unwrap()
            .push((limit, filter.cloned()));
        self.inner.query_content(embedding, limit, filter).await
    }

    async fn content_count(&self) -> Result<usize> {
        self.inner.content_count().await
    }

    async fn clear(&self) -> Result<()> {
        self.inner.clear().await
    }
}

/// Sample catalog used across engine and tool tests.
pub fn sample_courses() -> Vec<Course> {
    vec![
        Course::new("Python Programming")
            .with_link("https://example.com/python")
            .with_instructor("John Doe")
            .with_lesson(Lesson::new(2, "Variables").with_link("https://example.com/python/2"))
            .with_lesson(Lesson::new(1, "Introduction").with_link("https://example.com/python/1")),
        Course::new("Advanced Python")
            .with_link("https://example.com/advanced")
            .with_lesson(Lesson::new(1, "Decorators").with_link("https://example.com/advanced/1"))
            .with_lesson(Lesson::new(2, "Generators").with_link("https://example.com/advanced/2")),
    ]
}

/// Sample content chunks for [`sample_courses`].
pub fn sample_chunks() -> Vec<CourseChunk> {
    vec![
        CourseChunk::new("Python variables hold values", "Python Programming", Some(2), 0),
        CourseChunk::new("Python is a programming language", "Python Programming", Some(1), 1),
        CourseChunk::new("Generators yield values lazily", "Advanced Python", Some(2), 0),
        CourseChunk::new("Generators keep state between yields", "Advanced Python", Some(2), 1),
        CourseChunk::new("Decorators wrap functions", "Advanced Python", Some(1), 2),
    ]
}

/// Replays canned model responses and records every request.
pub struct ScriptedModel {
    responses: Mutex<VecDeque<Result<ModelResponse>>>,
    requests: Mutex<Vec<ModelRequest>>,
    repeat_tool_call: bool,
}

impl ScriptedModel {
    pub fn new(responses: Vec<Result<ModelResponse>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            repeat_tool_call: false,
        }
    }

    /// Calls a `search` tool whenever tools are offered, answers otherwise.
    pub fn always_calls_tools() -> Self {
        Self {
            repeat_tool_call: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse> {
        let n = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };

        if self.repeat_tool_call {
            return Ok(match request.tools {
                Some(_) => ModelResponse::tool_calls(vec![ToolCallRequest {
                    id: format!("call_{}", n),
                    name: "search".to_string(),
                    arguments: serde_json::json!({"query": "python"}),
                }]),
                None => ModelResponse::text("forced answer"),
            });
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(KursError::Model("script exhausted".to_string())))
    }
}
