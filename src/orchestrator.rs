//! Query and ingestion orchestrator for Kurs.
//!
//! Wires the course index, retrieval engine, tools, reasoning loop and
//! sessions together behind the entry points used by the CLI and HTTP API.

use crate::config::{IndexProvider, Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk, CourseDocument};
use crate::rag::{LanguageModel, OpenAIChatModel, ResponseGenerator};
use crate::search::SearchEngine;
use crate::session::SessionManager;
use crate::tools::{CourseOutlineTool, CourseSearchTool, QueryContext, Source, ToolRegistry};
use crate::vector_store::{CourseIndex, MemoryCourseIndex, SqliteCourseIndex};
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The main orchestrator for Kurs.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    engine: Arc<SearchEngine>,
    registry: ToolRegistry,
    generator: ResponseGenerator,
    sessions: SessionManager,
}

impl Orchestrator {
    /// Create an orchestrator from settings, using OpenAI for embeddings and
    /// chat.
    pub fn new(settings: Settings) -> Result<Self> {
        let prompts = Prompts::load(settings.prompts.custom_dir.as_deref())?;

        let embedder: Arc<dyn Embedder> =
            Arc::new(OpenAIEmbedder::from_settings(&settings.embedding)?);

        let index: Arc<dyn CourseIndex> = match settings.vector_store.provider {
            IndexProvider::Sqlite => {
                let path = settings.sqlite_path();
                info!("Opening course index at {}", path.display());
                Arc::new(SqliteCourseIndex::new(&path)?)
            }
            IndexProvider::Memory => Arc::new(MemoryCourseIndex::new()),
        };

        let model: Arc<dyn LanguageModel> = Arc::new(OpenAIChatModel::new(&settings.generation)?);

        Self::with_components(settings, prompts, index, embedder, model)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        prompts: Prompts,
        index: Arc<dyn CourseIndex>,
        embedder: Arc<dyn Embedder>,
        model: Arc<dyn LanguageModel>,
    ) -> Result<Self> {
        settings.validate()?;

        let mut engine = SearchEngine::new(index, embedder, settings.search.max_results)?;
        if let Some(distance) = settings.search.max_resolve_distance {
            engine = engine.with_resolve_distance(distance);
        }
        let engine = Arc::new(engine);

        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CourseSearchTool::new(engine.clone())))?;
        registry.register(Arc::new(CourseOutlineTool::new(engine.clone())))?;

        let generator = ResponseGenerator::new(model, settings.generation.max_rounds)?;
        let sessions = SessionManager::new(settings.session.max_history);

        Ok(Self {
            settings,
            prompts,
            engine,
            registry,
            generator,
            sessions,
        })
    }

    /// Swap in a different retrieval engine and rebuild the tools on top of it.
    pub fn with_engine(mut self, engine: SearchEngine) -> Result<Self> {
        let engine = Arc::new(engine);
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(CourseSearchTool::new(engine.clone())))?;
        registry.register(Arc::new(CourseOutlineTool::new(engine.clone())))?;
        self.engine = engine;
        self.registry = registry;
        Ok(self)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn engine(&self) -> Arc<SearchEngine> {
        self.engine.clone()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    /// Answer a question, optionally within a conversation session.
    #[instrument(skip(self), fields(query = %query))]
    pub async fn query(&self, query: &str, session_id: Option<&str>) -> Result<QueryResponse> {
        let prompt = self.prompts.assistant.render_query(query);

        let history = match session_id {
            Some(id) => self.sessions.get_conversation_history(id)?,
            None => None,
        };
        let system = self.prompts.assistant.system_with_history(history.as_deref());

        let mut ctx = QueryContext::new();
        let answer = self
            .generator
            .generate(&prompt, &system, Some(&self.registry), &mut ctx)
            .await?;
        let sources = self.registry.take_sources(&mut ctx);

        if let Some(id) = session_id {
            self.sessions.add_exchange(id, query, &answer)?;
        }

        info!("Answered with {} sources", sources.len());
        Ok(QueryResponse { answer, sources })
    }

    /// Index a course and its chunks, skipping titles already present.
    #[instrument(skip(self, course, chunks), fields(title = %course.title))]
    pub async fn add_course(&self, course: &Course, chunks: &[CourseChunk]) -> Result<IngestResult> {
        course.validate()?;

        if let Some(stray) = chunks.iter().find(|c| c.course_title != course.title) {
            return Err(KursError::InvalidInput(format!(
                "Chunk {} belongs to '{}', not '{}'",
                stray.chunk_index, stray.course_title, course.title
            )));
        }

        if self.engine.get_course_outline(&course.title).await?.is_some() {
            info!("Course {} is already indexed, skipping", course.title);
            return Ok(IngestResult::skipped(&course.title));
        }

        // The catalog record marks a course as indexed, so it goes in last.
        let chunks_indexed = self.engine.add_course_content(chunks).await?;
        self.engine.add_course_metadata(course).await?;

        Ok(IngestResult {
            title: course.title.clone(),
            chunks_indexed,
            skipped: false,
        })
    }

    /// Index a course document stored as JSON (`{"course": ..., "chunks": [...]}`).
    pub async fn add_course_file(&self, path: &Path) -> Result<IngestResult> {
        let content = std::fs::read_to_string(path)?;
        let document: CourseDocument = serde_json::from_str(&content)?;
        self.add_course(&document.course, &document.chunks).await
    }

    /// Index every `*.json` course document in a folder.
    ///
    /// Returns `(courses_added, chunks_added)`. Files that fail to load are
    /// logged and skipped.
    #[instrument(skip(self), fields(folder = %folder.display()))]
    pub async fn add_course_folder(
        &self,
        folder: &Path,
        clear_existing: bool,
    ) -> Result<(usize, usize)> {
        if !folder.is_dir() {
            return Err(KursError::InvalidInput(format!(
                "Folder not found: {}",
                folder.display()
            )));
        }

        if clear_existing {
            info!("Clearing existing course data");
            self.engine.clear_all_data().await?;
        }

        let mut files: Vec<_> = std::fs::read_dir(folder)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        files.sort();

        let mut existing: HashSet<String> = self
            .engine
            .get_existing_course_titles()
            .await?
            .into_iter()
            .collect();

        let mut courses_added = 0;
        let mut chunks_added = 0;

        for file in files {
            let document: CourseDocument = match std::fs::read_to_string(&file)
                .map_err(KursError::from)
                .and_then(|content| serde_json::from_str(&content).map_err(KursError::from))
            {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping {}: {}", file.display(), e);
                    continue;
                }
            };

            if existing.contains(&document.course.title) {
                info!("Course already exists: {}", document.course.title);
                continue;
            }

            match self.add_course(&document.course, &document.chunks).await {
                Ok(result) if !result.skipped => {
                    courses_added += 1;
                    chunks_added += result.chunks_indexed;
                    existing.insert(result.title);
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to index {}: {}", file.display(), e),
            }
        }

        Ok((courses_added, chunks_added))
    }

    /// Catalog summary.
    pub async fn get_course_analytics(&self) -> Result<CourseAnalytics> {
        let course_titles = self.engine.get_existing_course_titles().await?;
        Ok(CourseAnalytics {
            total_courses: self.engine.get_course_count().await?,
            course_titles,
        })
    }
}

/// Answer to a query plus where its retrieved content came from.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<Source>,
}

impl QueryResponse {
    /// Format the response for terminal display.
    pub fn format_for_display(&self) -> String {
        let mut output = self.answer.clone();

        if !self.sources.is_empty() {
            output.push_str("\n\n--- Sources ---\n");
            for source in &self.sources {
                output.push_str(&format!("\n{}", source.label));
                if let Some(link) = &source.link {
                    output.push_str(&format!("\n  {}", link));
                }
            }
        }

        output
    }
}

/// Result of indexing one course.
#[derive(Debug)]
pub struct IngestResult {
    /// Course title.
    pub title: String,
    /// Number of chunks indexed.
    pub chunks_indexed: usize,
    /// Whether indexing was skipped (already indexed).
    pub skipped: bool,
}

impl IngestResult {
    fn skipped(title: &str) -> Self {
        Self {
            title: title.to_string(),
            chunks_indexed: 0,
            skipped: true,
        }
    }
}

/// Course catalog statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CourseAnalytics {
    pub total_courses: usize,
    pub course_titles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::{ModelResponse, ToolCallRequest};
    use crate::search::StaticNameResolver;
    use crate::test_support::{
        sample_chunks, sample_courses, FlakyEmbedder, KeywordEmbedder, ScriptedModel,
    };
    use serde_json::json;

    fn orchestrator(model: Arc<ScriptedModel>) -> Orchestrator {
        let mut settings = Settings::default();
        settings.vector_store.provider = IndexProvider::Memory;
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder::new());
        let index: Arc<dyn CourseIndex> = Arc::new(MemoryCourseIndex::new());

        let engine = SearchEngine::new(index.clone(), embedder.clone(), 5)
            .unwrap()
            .with_resolver(Arc::new(StaticNameResolver::new([
                "Python Programming",
                "Advanced Python",
            ])));

        Orchestrator::with_components(settings, Prompts::default(), index, embedder, model)
            .unwrap()
            .with_engine(engine)
            .unwrap()
    }

    async fn seeded(model: Arc<ScriptedModel>) -> Orchestrator {
        let orchestrator = orchestrator(model);
        let chunks = sample_chunks();
        for course in sample_courses() {
            let own: Vec<CourseChunk> = chunks
                .iter()
                .filter(|c| c.course_title == course.title)
                .cloned()
                .collect();
            orchestrator.add_course(&course, &own).await.unwrap();
        }
        orchestrator
    }

    fn search_call() -> ModelResponse {
        ModelResponse::tool_calls(vec![ToolCallRequest {
            id: "call_1".to_string(),
            name: "search_course_content".to_string(),
            arguments: json!({
                "query": "generators",
                "course_name": "Advanced Python",
                "lesson_number": 2
            }),
        }])
    }

    #[tokio::test]
    async fn test_query_collects_sources_once() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(search_call()),
            Ok(ModelResponse::text("Generators produce values lazily.")),
        ]));
        let orchestrator = seeded(model.clone()).await;

        let response = orchestrator
            .query("What is in Lesson 2 of 'Advanced Python'?", None)
            .await
            .unwrap();

        assert_eq!(response.answer, "Generators produce values lazily.");
        assert_eq!(response.sources.len(), 2);
        assert!(response
            .sources
            .iter()
            .all(|s| s.label == "Advanced Python - Lesson 2" && s.link.is_some()));

        let requests = model.requests();
        assert_eq!(
            requests[0].messages[0],
            crate::rag::ChatMessage::User(
                "Answer this question about course materials: What is in Lesson 2 of 'Advanced Python'?"
                    .to_string()
            )
        );
        assert_eq!(requests[0].tools.as_ref().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_next_query_starts_without_sources() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(search_call()),
            Ok(ModelResponse::text("first")),
            Ok(ModelResponse::text("second")),
        ]));
        let orchestrator = seeded(model).await;

        let first = orchestrator.query("q1", None).await.unwrap();
        assert_eq!(first.sources.len(), 2);

        let second = orchestrator.query("q2", None).await.unwrap();
        assert_eq!(second.answer, "second");
        assert!(second.sources.is_empty());
    }

    #[tokio::test]
    async fn test_session_history_reaches_system_prompt() {
        let model = Arc::new(ScriptedModel::new(vec![
            Ok(ModelResponse::text("A language.")),
            Ok(ModelResponse::text("Yes.")),
        ]));
        let orchestrator = seeded(model.clone()).await;
        let session = orchestrator.sessions().create_session().unwrap();

        orchestrator.query("What is Python?", Some(&session)).await.unwrap();
        orchestrator.query("Is it popular?", Some(&session)).await.unwrap();

        let requests = model.requests();
        assert!(!requests[0].system.contains("Previous conversation:"));
        assert!(requests[1]
            .system
            .ends_with("Previous conversation:\nUser: What is Python?\nAssistant: A language."));
    }

    #[tokio::test]
    async fn test_first_round_failure_surfaces() {
        let model = Arc::new(ScriptedModel::new(vec![Err(KursError::OpenAI(
            "unauthorized".to_string(),
        ))]));
        let orchestrator = seeded(model).await;
        assert!(orchestrator.query("q", None).await.is_err());
    }

    #[tokio::test]
    async fn test_add_course_skips_existing_and_rejects_stray_chunks() {
        let orchestrator = seeded(Arc::new(ScriptedModel::new(Vec::new()))).await;
        let course = sample_courses().remove(0);

        let again = orchestrator.add_course(&course, &[]).await.unwrap();
        assert!(again.skipped);

        let stray = CourseChunk::new("x", "Other", None, 0);
        let err = orchestrator
            .add_course(&Course::new("New Course"), &[stray])
            .await
            .unwrap_err();
        assert!(matches!(err, KursError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_failed_content_write_can_be_retried() {
        let index: Arc<dyn CourseIndex> = Arc::new(MemoryCourseIndex::new());
        let embedder = Arc::new(FlakyEmbedder::failing_batches(1));
        let orchestrator = Orchestrator::with_components(
            Settings::default(),
            Prompts::default(),
            index.clone(),
            embedder,
            Arc::new(ScriptedModel::new(Vec::new())),
        )
        .unwrap();

        let course = sample_courses().remove(1);
        let chunks: Vec<CourseChunk> = sample_chunks()
            .into_iter()
            .filter(|c| c.course_title == course.title)
            .collect();

        assert!(orchestrator.add_course(&course, &chunks).await.is_err());
        assert_eq!(index.course_count().await.unwrap(), 0);

        let retry = orchestrator.add_course(&course, &chunks).await.unwrap();
        assert!(!retry.skipped);
        assert_eq!(retry.chunks_indexed, chunks.len());
        assert_eq!(index.content_count().await.unwrap(), chunks.len());
        assert_eq!(index.course_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_analytics() {
        let orchestrator = seeded(Arc::new(ScriptedModel::new(Vec::new()))).await;
        let analytics = orchestrator.get_course_analytics().await.unwrap();
        assert_eq!(analytics.total_courses, 2);
        assert_eq!(
            analytics.course_titles,
            vec!["Advanced Python", "Python Programming"]
        );
    }

    #[tokio::test]
    async fn test_add_course_folder() {
        let dir = tempfile::tempdir().unwrap();
        let doc = |title: &str| {
            json!({
                "course": {"title": title, "lessons": [{"lesson_number": 1, "title": "Intro"}]},
                "chunks": [
                    {"content": "intro text", "course_title": title, "lesson_number": 1, "chunk_index": 0},
                    {"content": "more text", "course_title": title, "lesson_number": 1, "chunk_index": 1}
                ]
            })
            .to_string()
        };
        std::fs::write(dir.path().join("a.json"), doc("Course A")).unwrap();
        std::fs::write(dir.path().join("b.json"), doc("Course B")).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let orchestrator = orchestrator(Arc::new(ScriptedModel::new(Vec::new())));
        let (courses, chunks) = orchestrator
            .add_course_folder(dir.path(), false)
            .await
            .unwrap();
        assert_eq!((courses, chunks), (2, 4));

        // Second pass finds everything already indexed.
        let again = orchestrator
            .add_course_folder(dir.path(), false)
            .await
            .unwrap();
        assert_eq!(again, (0, 0));

        let cleared = orchestrator
            .add_course_folder(dir.path(), true)
            .await
            .unwrap();
        assert_eq!(cleared, (2, 4));

        let single = orchestrator
            .add_course_file(&dir.path().join("a.json"))
            .await
            .unwrap();
        assert!(single.skipped);

        assert!(orchestrator
            .add_course_folder(&dir.path().join("missing"), false)
            .await
            .is_err());
    }

    #[test]
    fn test_format_for_display() {
        let response = QueryResponse {
            answer: "Answer".to_string(),
            sources: vec![Source::new(
                "Advanced Python - Lesson 2",
                Some("https://example.com/advanced/2".to_string()),
            )],
        };
        let display = response.format_for_display();
        assert!(display.starts_with("Answer\n\n--- Sources ---"));
        assert!(display.contains("https://example.com/advanced/2"));
    }
}
