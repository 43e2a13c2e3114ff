//! Course outline tool.

use super::{parse_args, QueryContext, Tool, ToolDefinition};
use crate::error::Result;
use crate::models::Course;
use crate::search::SearchEngine;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

const NAME: &str = "get_course_outline";

#[derive(Debug, Deserialize)]
struct OutlineArgs {
    course_name: String,
}

/// Returns a course's title, link, instructor and lesson list.
///
/// Reads the catalog directly; no content search and no sources.
pub struct CourseOutlineTool {
    engine: Arc<SearchEngine>,
}

impl CourseOutlineTool {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }

    async fn outline(&self, course_name: &str) -> Result<Option<Course>> {
        match self.engine.resolve_course_name(course_name).await? {
            Some(title) => self.engine.get_course_outline(&title).await,
            None => Ok(None),
        }
    }
}

fn render_outline(course: &Course) -> String {
    let mut lines = vec![format!("**Course:** {}", course.title)];
    if let Some(link) = &course.course_link {
        lines.push(format!("**Course Link:** {}", link));
    }
    if let Some(instructor) = &course.instructor {
        lines.push(format!("**Instructor:** {}", instructor));
    }

    let lessons = course.sorted_lessons();
    lines.push(String::new());
    lines.push(format!("**Lessons ({}):**", lessons.len()));
    lines.extend(
        lessons
            .iter()
            .map(|l| format!("- Lesson {}: {}", l.lesson_number, l.title)),
    );

    lines.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Get a course outline: title, link, instructor and the complete lesson list"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    }
                },
                "required": ["course_name"]
            }),
        }
    }

    async fn execute(&self, args: &serde_json::Value, _ctx: &mut QueryContext) -> Result<String> {
        let args: OutlineArgs = parse_args(NAME, args)?;

        match self.outline(&args.course_name).await {
            Ok(Some(course)) => Ok(render_outline(&course)),
            Ok(None) => Ok(format!("No course found matching '{}'", args.course_name)),
            Err(e) => {
                warn!("Outline lookup failed for {:?}: {}", args.course_name, e);
                Ok(format!("Error retrieving course outline: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::StaticNameResolver;
    use crate::test_support::{sample_courses, FailingIndex, KeywordEmbedder, RecordingIndex};

    async fn seeded_tool() -> CourseOutlineTool {
        let engine = SearchEngine::new(
            Arc::new(RecordingIndex::default()),
            Arc::new(KeywordEmbedder::new()),
            5,
        )
        .unwrap()
        .with_resolver(Arc::new(StaticNameResolver::new([
            "Python Programming",
            "Advanced Python",
        ])));
        for course in sample_courses() {
            engine.add_course_metadata(&course).await.unwrap();
        }
        CourseOutlineTool::new(Arc::new(engine))
    }

    #[tokio::test]
    async fn test_outline_resolves_partial_name() {
        let tool = seeded_tool().await;
        let mut ctx = QueryContext::new();

        let output = tool
            .execute(&json!({"course_name": "Python"}), &mut ctx)
            .await
            .unwrap();

        assert!(output.contains("**Course:** Python Programming"));
        assert!(output.contains("**Course Link:** https://example.com/python"));
        assert!(output.contains("**Instructor:** John Doe"));

        // Stored out of order, rendered by lesson number.
        let intro = output.find("- Lesson 1: Introduction").unwrap();
        let variables = output.find("- Lesson 2: Variables").unwrap();
        assert!(intro < variables);
    }

    #[tokio::test]
    async fn test_outline_omits_missing_fields() {
        let tool = seeded_tool().await;
        let output = tool
            .execute(&json!({"course_name": "advanced"}), &mut QueryContext::new())
            .await
            .unwrap();

        assert!(output.starts_with("**Course:** Advanced Python"));
        assert!(!output.contains("**Instructor:**"));
    }

    #[tokio::test]
    async fn test_outline_not_found() {
        let tool = seeded_tool().await;
        let output = tool
            .execute(&json!({"course_name": "Nonexistent Course"}), &mut QueryContext::new())
            .await
            .unwrap();
        assert_eq!(output, "No course found matching 'Nonexistent Course'");
    }

    #[tokio::test]
    async fn test_outline_index_error() {
        let engine = SearchEngine::new(
            Arc::new(FailingIndex::new("Database error")),
            Arc::new(KeywordEmbedder::new()),
            5,
        )
        .unwrap()
        .with_resolver(Arc::new(StaticNameResolver::new(["Python Programming"])));
        let tool = CourseOutlineTool::new(Arc::new(engine));

        let output = tool
            .execute(&json!({"course_name": "Python"}), &mut QueryContext::new())
            .await
            .unwrap();
        assert!(output.starts_with("Error retrieving course outline:"));
        assert!(output.contains("Database error"));
    }

    #[tokio::test]
    async fn test_outline_records_no_sources() {
        let tool = seeded_tool().await;
        let mut ctx = QueryContext::new();
        tool.execute(&json!({"course_name": "Python"}), &mut ctx)
            .await
            .unwrap();
        assert!(ctx.sources_for(NAME).is_empty());
    }
}
