//! Course, lesson and chunk records shared by ingestion and retrieval.

use serde::{Deserialize, Serialize};

/// A lesson inside a course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    /// Lesson number, unique within its course.
    pub lesson_number: u32,
    /// Lesson title.
    pub title: String,
    /// Link to the lesson, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lesson_link: Option<String>,
}

impl Lesson {
    pub fn new(lesson_number: u32, title: impl Into<String>) -> Self {
        Self {
            lesson_number,
            title: title.into(),
            lesson_link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.lesson_link = Some(link.into());
        self
    }
}

/// A course. The title is the primary key across the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.course_link = Some(link.into());
        self
    }

    pub fn with_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = Some(instructor.into());
        self
    }

    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }

    /// Look up a lesson by number.
    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }

    /// Lessons sorted by lesson number.
    pub fn sorted_lessons(&self) -> Vec<&Lesson> {
        let mut lessons: Vec<&Lesson> = self.lessons.iter().collect();
        lessons.sort_by_key(|l| l.lesson_number);
        lessons
    }

    /// Text embedded into the catalog for fuzzy name resolution.
    pub fn catalog_text(&self) -> String {
        self.title.clone()
    }

    /// Check the invariants a course must satisfy before indexing.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::error::KursError::InvalidInput(
                "Course title must not be empty".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for lesson in &self.lessons {
            if !seen.insert(lesson.lesson_number) {
                return Err(crate::error::KursError::InvalidInput(format!(
                    "Duplicate lesson number {} in course '{}'",
                    lesson.lesson_number, self.title
                )));
            }
        }
        Ok(())
    }
}

/// A span of course text stored for semantic retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    /// Lesson this chunk belongs to; `None` for course-level text.
    #[serde(default)]
    pub lesson_number: Option<u32>,
    /// Position of the chunk within its course. Identity only.
    pub chunk_index: u32,
}

impl CourseChunk {
    pub fn new(
        content: impl Into<String>,
        course_title: impl Into<String>,
        lesson_number: Option<u32>,
        chunk_index: u32,
    ) -> Self {
        Self {
            content: content.into(),
            course_title: course_title.into(),
            lesson_number,
            chunk_index,
        }
    }

    /// Stable identifier within the content collection.
    pub fn id(&self) -> String {
        format!(
            "{}_{}",
            self.course_title.replace(' ', "_"),
            self.chunk_index
        )
    }
}

/// A pre-chunked course as produced by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseDocument {
    pub course: Course,
    #[serde(default)]
    pub chunks: Vec<CourseChunk>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_lessons() {
        let course = Course::new("Python Programming")
            .with_lesson(Lesson::new(2, "Variables"))
            .with_lesson(Lesson::new(1, "Introduction"));

        let numbers: Vec<u32> = course.sorted_lessons().iter().map(|l| l.lesson_number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(course.lesson(2).map(|l| l.title.as_str()), Some("Variables"));
        assert!(course.lesson(3).is_none());
    }

    #[test]
    fn test_validate_rejects_empty_title_and_duplicates() {
        assert!(Course::new("  ").validate().is_err());

        let dup = Course::new("A")
            .with_lesson(Lesson::new(1, "x"))
            .with_lesson(Lesson::new(1, "y"));
        assert!(dup.validate().is_err());

        assert!(Course::new("A").with_lesson(Lesson::new(0, "Intro")).validate().is_ok());
    }

    #[test]
    fn test_chunk_id() {
        let chunk = CourseChunk::new("text", "Advanced Python", Some(2), 7);
        assert_eq!(chunk.id(), "Advanced_Python_7");
    }

    #[test]
    fn test_course_document_from_json() {
        let doc: CourseDocument = serde_json::from_str(
            r#"{
                "course": {
                    "title": "Test Course",
                    "instructor": "Ada",
                    "lessons": [{"lesson_number": 1, "title": "Intro", "lesson_link": "https://x/1"}]
                },
                "chunks": [
                    {"content": "hello", "course_title": "Test Course", "lesson_number": 1, "chunk_index": 0},
                    {"content": "preface", "course_title": "Test Course", "chunk_index": 1}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(doc.course.instructor.as_deref(), Some("Ada"));
        assert!(doc.course.course_link.is_none());
        assert_eq!(doc.chunks.len(), 2);
        assert_eq!(doc.chunks[1].lesson_number, None);
    }
}
