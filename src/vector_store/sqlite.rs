//! SQLite-based course index implementation.
//!
//! Uses SQLite for storage with cosine distance computed in Rust. Metadata
//! filters are pushed down into the `WHERE` clause.

use super::{
    cosine_distance, rank_by_distance, CatalogMatch, ContentMatch, CourseIndex, IndexedChunk,
    SearchFilter,
};
use crate::error::{KursError, Result};
use crate::models::{Course, CourseChunk, Lesson};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument};

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS courses (
        title TEXT PRIMARY KEY,
        instructor TEXT,
        course_link TEXT,
        lessons_json TEXT NOT NULL,
        embedding BLOB NOT NULL,
        indexed_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS chunks (
        id TEXT PRIMARY KEY,
        course_title TEXT NOT NULL,
        lesson_number INTEGER,
        chunk_index INTEGER NOT NULL,
        content TEXT NOT NULL,
        embedding BLOB NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_chunks_course_title ON chunks(course_title);
    CREATE INDEX IF NOT EXISTS idx_chunks_lesson_number ON chunks(lesson_number);
"#;

/// SQLite-based course index.
pub struct SqliteCourseIndex {
    conn: Mutex<Connection>,
}

impl SqliteCourseIndex {
    /// Open (or create) a course index at the given path.
    #[instrument(skip_all)]
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(SCHEMA)?;

        info!("Initialized SQLite course index at {:?}", path);

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite course index (useful for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| KursError::Index(format!("Failed to acquire lock: {}", e)))
    }

    /// Serialize embedding to bytes.
    fn embedding_to_bytes(embedding: &[f32]) -> Vec<u8> {
        embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Deserialize embedding from bytes.
    fn bytes_to_embedding(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|chunk| {
                let arr: [u8; 4] = chunk.try_into().unwrap_or_default();
                f32::from_le_bytes(arr)
            })
            .collect()
    }

    fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Course, Vec<u8>)> {
        let lessons_json: String = row.get(3)?;
        let lessons: Vec<Lesson> = serde_json::from_str(&lessons_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;
        Ok((
            Course {
                title: row.get(0)?,
                instructor: row.get(1)?,
                course_link: row.get(2)?,
                lessons,
            },
            row.get(4)?,
        ))
    }
}

/// Translate a filter into a SQL predicate and its bound values.
fn filter_to_sql(filter: &SearchFilter, values: &mut Vec<Value>) -> String {
    match filter {
        SearchFilter::CourseTitle(title) => {
            values.push(Value::Text(title.clone()));
            "course_title = ?".to_string()
        }
        SearchFilter::LessonNumber(n) => {
            values.push(Value::Integer(i64::from(*n)));
            "lesson_number = ?".to_string()
        }
        SearchFilter::And(clauses) if clauses.is_empty() => "1 = 1".to_string(),
        SearchFilter::And(clauses) => {
            let parts: Vec<String> = clauses.iter().map(|c| filter_to_sql(c, values)).collect();
            format!("({})", parts.join(" AND "))
        }
    }
}

#[async_trait]
impl CourseIndex for SqliteCourseIndex {
    #[instrument(skip(self, course, embedding), fields(title = %course.title))]
    async fn upsert_course(&self, course: &Course, embedding: &[f32]) -> Result<()> {
        let conn = self.lock()?;
        let lessons_json = serde_json::to_string(&course.lessons)?;

        conn.execute(
            r#"
            INSERT OR REPLACE INTO courses
            (title, instructor, course_link, lessons_json, embedding, indexed_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                course.title,
                course.instructor,
                course.course_link,
                lessons_json,
                Self::embedding_to_bytes(embedding),
                Utc::now().to_rfc3339(),
            ],
        )?;

        debug!("Upserted course {}", course.title);
        Ok(())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query_catalog(
        &self,
        query_embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<CatalogMatch>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, instructor, course_link, lessons_json, embedding FROM courses",
        )?;

        let rows = stmt.query_map([], Self::course_from_row)?;
        let mut hits = Vec::new();
        for row in rows {
            let (course, bytes) = row?;
            let distance = cosine_distance(query_embedding, &Self::bytes_to_embedding(&bytes));
            hits.push(CatalogMatch { course, distance });
        }

        Ok(rank_by_distance(hits, limit, |m: &CatalogMatch| m.distance))
    }

    #[instrument(skip(self))]
    async fn get_course(&self, title: &str) -> Result<Option<Course>> {
        let conn = self.lock()?;
        let course = conn
            .query_row(
                "SELECT title, instructor, course_link, lessons_json, embedding FROM courses WHERE title = ?1",
                params![title],
                Self::course_from_row,
            )
            .optional()?;
        Ok(course.map(|(course, _)| course))
    }

    async fn list_courses(&self) -> Result<Vec<Course>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT title, instructor, course_link, lessons_json, embedding FROM courses ORDER BY title",
        )?;
        let rows = stmt.query_map([], Self::course_from_row)?;

        let mut courses = Vec::new();
        for row in rows {
            courses.push(row?.0);
        }
        Ok(courses)
    }

    async fn course_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[instrument(skip(self, chunks), fields(count = chunks.len()))]
    async fn replace_course_content(
        &self,
        course_title: &str,
        chunks: &[IndexedChunk],
    ) -> Result<usize> {
        let conn = self.lock()?;
        let tx = conn.unchecked_transaction()?;

        let removed = tx.execute(
            "DELETE FROM chunks WHERE course_title = ?1",
            params![course_title],
        )?;

        for indexed in chunks {
            let chunk = &indexed.chunk;
            tx.execute(
                r#"
                INSERT OR REPLACE INTO chunks
                (id, course_title, lesson_number, chunk_index, content, embedding)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    chunk.id(),
                    chunk.course_title,
                    chunk.lesson_number,
                    chunk.chunk_index,
                    chunk.content,
                    Self::embedding_to_bytes(&indexed.embedding),
                ],
            )?;
        }

        tx.commit()?;
        info!(
            "Replaced {} chunks with {} for course {}",
            removed,
            chunks.len(),
            course_title
        );
        Ok(chunks.len())
    }

    #[instrument(skip(self, query_embedding))]
    async fn query_content(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<ContentMatch>> {
        let mut values = Vec::new();
        let mut sql = String::from(
            "SELECT course_title, lesson_number, chunk_index, content, embedding FROM chunks",
        );
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&filter_to_sql(filter, &mut values));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values.iter()), |row| {
            let bytes: Vec<u8> = row.get(4)?;
            Ok((
                CourseChunk {
                    course_title: row.get(0)?,
                    lesson_number: row.get(1)?,
                    chunk_index: row.get(2)?,
                    content: row.get(3)?,
                },
                bytes,
            ))
        })?;

        let mut hits = Vec::new();
        for row in rows {
            let (chunk, bytes) = row?;
            let distance = cosine_distance(query_embedding, &Self::bytes_to_embedding(&bytes));
            hits.push(ContentMatch { chunk, distance });
        }

        let hits = rank_by_distance(hits, limit, |m: &ContentMatch| m.distance);
        debug!("Found {} matching chunks", hits.len());
        Ok(hits)
    }

    async fn content_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    async fn clear(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("DELETE FROM chunks; DELETE FROM courses;")?;
        info!("Cleared course index");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indexed(course: &str, lesson: Option<u32>, idx: u32, embedding: Vec<f32>) -> IndexedChunk {
        IndexedChunk {
            chunk: CourseChunk::new(format!("content {}", idx), course, lesson, idx),
            embedding,
        }
    }

    #[test]
    fn test_filter_to_sql() {
        let mut values = Vec::new();
        let sql = filter_to_sql(
            &SearchFilter::And(vec![
                SearchFilter::CourseTitle("Advanced Python".into()),
                SearchFilter::LessonNumber(2),
            ]),
            &mut values,
        );
        assert_eq!(sql, "(course_title = ? AND lesson_number = ?)");
        assert_eq!(
            values,
            vec![Value::Text("Advanced Python".into()), Value::Integer(2)]
        );
    }

    #[tokio::test]
    async fn test_sqlite_course_index() {
        let index = SqliteCourseIndex::in_memory().unwrap();

        let course = Course::new("Python Programming")
            .with_link("https://example.com/python")
            .with_instructor("Ada")
            .with_lesson(Lesson::new(1, "Introduction").with_link("https://example.com/python/1"))
            .with_lesson(Lesson::new(2, "Variables"));
        index.upsert_course(&course, &[1.0, 0.0]).await.unwrap();

        assert_eq!(index.get_course("Python Programming").await.unwrap(), Some(course));
        assert!(index.get_course("Missing").await.unwrap().is_none());
        assert_eq!(index.course_count().await.unwrap(), 1);

        index
            .replace_course_content(
                "Python Programming",
                &[
                    indexed("Python Programming", Some(1), 0, vec![1.0, 0.0]),
                    indexed("Python Programming", Some(2), 1, vec![0.0, 1.0]),
                    indexed("Python Programming", None, 2, vec![0.5, 0.5]),
                ],
            )
            .await
            .unwrap();

        let hits = index.query_content(&[0.0, 1.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].chunk.lesson_number, Some(2));
        assert!(hits[0].distance < 0.001);

        let filter = SearchFilter::LessonNumber(1);
        let hits = index
            .query_content(&[0.0, 1.0], 10, Some(&filter))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk.content, "content 0");

        let hits = index.query_content(&[0.0, 1.0], 0, None).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_clear_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let index = SqliteCourseIndex::new(&dir.path().join("courses.db")).unwrap();

        index
            .replace_course_content("A", &[indexed("A", Some(1), 0, vec![1.0]), indexed("A", Some(1), 1, vec![1.0])])
            .await
            .unwrap();
        index
            .replace_course_content("A", &[indexed("A", Some(4), 0, vec![1.0])])
            .await
            .unwrap();
        assert_eq!(index.content_count().await.unwrap(), 1);

        index.upsert_course(&Course::new("A"), &[1.0]).await.unwrap();
        index.clear().await.unwrap();
        assert_eq!(index.content_count().await.unwrap(), 0);
        assert_eq!(index.course_count().await.unwrap(), 0);
    }
}
