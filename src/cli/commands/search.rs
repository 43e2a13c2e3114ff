//! Search command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the search command.
pub async fn run_search(
    query: &str,
    course: Option<String>,
    lesson: Option<u32>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Embed)?;
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Searching...");
    let results = orchestrator
        .engine()
        .search(query, course.as_deref(), lesson)
        .await;
    spinner.finish_and_clear();

    if let Some(error) = results.error() {
        Output::error(error);
        return Err(anyhow::anyhow!("{}", error));
    }

    if results.is_empty() {
        Output::warning("No results found matching your query.");
        return Ok(());
    }

    Output::success(&format!("Found {} results", results.len()));
    for (document, meta, distance) in results.iter() {
        let label = match meta.lesson_number {
            Some(n) => format!("{} - Lesson {}", meta.course_title, n),
            None => meta.course_title.clone(),
        };
        Output::search_hit(&label, distance, document);
    }

    Ok(())
}
