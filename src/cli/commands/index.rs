//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the index command on a course file or folder.
pub async fn run_index(path: &str, clear: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let path = Settings::expand_path(path);
    let orchestrator = Orchestrator::new(settings)?;

    if path.is_dir() {
        let spinner = Output::spinner(&format!("Indexing courses in {}...", path.display()));
        let result = orchestrator.add_course_folder(&path, clear).await;
        spinner.finish_and_clear();

        let (courses, chunks) = result?;
        if courses == 0 {
            Output::info("No new courses to index.");
        } else {
            Output::success(&format!("Indexed {} courses ({} chunks)", courses, chunks));
        }
    } else {
        if clear {
            Output::warning("--clear only applies to folders; ignoring it.");
        }

        let spinner = Output::spinner(&format!("Indexing {}...", path.display()));
        let result = orchestrator.add_course_file(&path).await;
        spinner.finish_and_clear();

        let result = result?;
        if result.skipped {
            Output::info(&format!("'{}' is already indexed, skipping.", result.title));
        } else {
            Output::success(&format!(
                "Indexed '{}' ({} chunks)",
                result.title, result.chunks_indexed
            ));
        }
    }

    let analytics = orchestrator.get_course_analytics().await?;
    Output::kv("Total courses", &analytics.total_courses.to_string());

    Ok(())
}
