//! Course listing and outline commands.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::tools::{CourseOutlineTool, QueryContext, Tool};
use anyhow::Result;

/// Run the courses command.
pub async fn run_courses(settings: Settings) -> Result<()> {
    preflight::check(Operation::Browse)?;
    let orchestrator = Orchestrator::new(settings)?;

    let courses = match orchestrator.engine().get_all_courses_metadata().await {
        Ok(courses) => courses,
        Err(e) => {
            Output::error(&format!("Failed to list courses: {}", e));
            return Err(e.into());
        }
    };

    if courses.is_empty() {
        Output::info("No courses indexed yet. Use 'kurs index <path>' to add some.");
        return Ok(());
    }

    Output::header(&format!("Indexed Courses ({})", courses.len()));
    println!();
    for course in &courses {
        let lessons = course.lessons.len();
        let detail = match &course.instructor {
            Some(instructor) => format!("{} ({} lessons, {})", course.title, lessons, instructor),
            None => format!("{} ({} lessons)", course.title, lessons),
        };
        Output::list_item(&detail);
    }

    Ok(())
}

/// Run the outline command.
pub async fn run_outline(course: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Embed) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let orchestrator = Orchestrator::new(settings)?;
    let tool = CourseOutlineTool::new(orchestrator.engine());

    let args = serde_json::json!({ "course_name": course });
    let outline = tool.execute(&args, &mut QueryContext::new()).await?;
    println!("\n{}\n", outline);

    Ok(())
}
