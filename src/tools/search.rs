//! Content search tool.

use super::{parse_args, QueryContext, Source, Tool, ToolDefinition};
use crate::error::Result;
use crate::search::{SearchEngine, SearchResults};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

const NAME: &str = "search_course_content";

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    #[serde(default)]
    course_name: Option<String>,
    #[serde(default)]
    lesson_number: Option<u32>,
}

/// Searches course content and records where each snippet came from.
pub struct CourseSearchTool {
    engine: Arc<SearchEngine>,
}

impl CourseSearchTool {
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        Self { engine }
    }

    async fn format_results(&self, results: &SearchResults, ctx: &mut QueryContext) -> String {
        let mut blocks = Vec::with_capacity(results.len());
        let mut sources = Vec::with_capacity(results.len());

        for (document, meta, _) in results.iter() {
            let label = match meta.lesson_number {
                Some(n) => format!("{} - Lesson {}", meta.course_title, n),
                None => meta.course_title.clone(),
            };

            let link = match meta.lesson_number {
                Some(n) => self.engine.get_lesson_link(&meta.course_title, n).await,
                None => self.engine.get_course_link(&meta.course_title).await,
            };

            blocks.push(format!("[{}]\n{}", label, document));
            sources.push(Source::new(label, link));
        }

        ctx.set_sources(NAME, sources);
        blocks.join("\n\n")
    }
}

fn no_results_message(course_name: Option<&str>, lesson_number: Option<u32>) -> String {
    let mut message = String::from("No relevant content found");
    if let Some(course) = course_name {
        message.push_str(&format!(" in course '{}'", course));
    }
    if let Some(lesson) = lesson_number {
        message.push_str(&format!(" in lesson {}", lesson));
    }
    message.push('.');
    message
}

#[async_trait]
impl Tool for CourseSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: NAME.to_string(),
            description: "Search course materials with smart course name matching and lesson filtering"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What to search for in the course content"
                    },
                    "course_name": {
                        "type": "string",
                        "description": "Course title (partial matches work, e.g. 'MCP', 'Introduction')"
                    },
                    "lesson_number": {
                        "type": "integer",
                        "description": "Specific lesson number to search within (e.g. 1, 2, 3)"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &serde_json::Value, ctx: &mut QueryContext) -> Result<String> {
        let args: SearchArgs = parse_args(NAME, args)?;
        debug!(
            "Searching {:?} (course: {:?}, lesson: {:?})",
            args.query, args.course_name, args.lesson_number
        );

        let results = self
            .engine
            .search(&args.query, args.course_name.as_deref(), args.lesson_number)
            .await;

        if let Some(error) = results.error() {
            return Ok(error.to_string());
        }

        if results.is_empty() {
            return Ok(no_results_message(
                args.course_name.as_deref(),
                args.lesson_number,
            ));
        }

        Ok(self.format_results(&results, ctx).await)
    }
}
