use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::models::bookmark::{
    Bookmark, BookmarkType, BookmarkWithResource, ResourceRef, ResourceSummary,
};
use crate::models::course::{Course, Lesson, LessonContext};
use crate::models::progress::{Certificate, Enrollment, LessonProgress, ProgressUpdate};
use crate::models::qa::{Answer, Question, QuestionStatus};
use crate::models::user::UserSummary;
use crate::store::{Store, StoreResult};

/// `Store` backed by PostgreSQL.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Bookmark row left-joined with whichever resource table it points at.
#[derive(FromRow)]
struct BookmarkJoinRow {
    id: Uuid,
    user_id: Uuid,
    #[sqlx(rename = "type")]
    kind: BookmarkType,
    article_id: Option<Uuid>,
    book_id: Option<Uuid>,
    course_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    resource_id: Option<Uuid>,
    resource_title: Option<String>,
    resource_slug: Option<String>,
}

impl From<BookmarkJoinRow> for BookmarkWithResource {
    fn from(row: BookmarkJoinRow) -> Self {
        let resource = match (row.resource_id, row.resource_title, row.resource_slug) {
            (Some(id), Some(title), Some(slug)) => Some(ResourceSummary { id, title, slug }),
            _ => None,
        };
        BookmarkWithResource {
            bookmark: Bookmark {
                id: row.id,
                user_id: row.user_id,
                kind: row.kind,
                article_id: row.article_id,
                book_id: row.book_id,
                course_id: row.course_id,
                created_at: row.created_at,
            },
            resource,
        }
    }
}

// The three nullable resource columns are matched with IS NOT DISTINCT FROM so
// that a NULL parameter only matches a NULL column.
const BOOKMARK_TUPLE_MATCH: &str = "user_id = $1 AND type = $2 \
     AND article_id IS NOT DISTINCT FROM $3 \
     AND book_id IS NOT DISTINCT FROM $4 \
     AND course_id IS NOT DISTINCT FROM $5";

#[async_trait]
impl Store for PgStore {
    async fn user_summary(&self, user_id: Uuid) -> StoreResult<Option<UserSummary>> {
        Ok(
            sqlx::query_as::<_, UserSummary>("SELECT id, name, avatar_url FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_course(&self, course_id: Uuid) -> StoreResult<Option<Course>> {
        Ok(
            sqlx::query_as::<_, Course>("SELECT * FROM courses WHERE id = $1")
                .bind(course_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn lesson_context(&self, lesson_id: Uuid) -> StoreResult<Option<LessonContext>> {
        Ok(sqlx::query_as::<_, LessonContext>(
            r#"
            SELECT l.id AS lesson_id, l.module_id, m.course_id, l.duration,
                   l.is_free AS lesson_is_free, c.is_free AS course_is_free
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            JOIN courses c ON c.id = m.course_id
            WHERE l.id = $1
            "#,
        )
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn course_lessons(&self, course_id: Uuid) -> StoreResult<Vec<Lesson>> {
        Ok(sqlx::query_as::<_, Lesson>(
            r#"
            SELECT l.*
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE m.course_id = $1
            ORDER BY m.position ASC, l.position ASC
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn count_course_lessons(&self, course_id: Uuid) -> StoreResult<i64> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM lessons l
            JOIN modules m ON m.id = l.module_id
            WHERE m.course_id = $1
            "#,
        )
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count_completed_lessons(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM lesson_progress lp
            JOIN lessons l ON l.id = lp.lesson_id
            JOIN modules m ON m.id = l.module_id
            WHERE lp.user_id = $1 AND m.course_id = $2 AND lp.is_completed
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn insert_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment> {
        Ok(sqlx::query_as::<_, Enrollment>(
            "INSERT INTO enrollments (user_id, course_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(sqlx::query_as::<_, Enrollment>(
            "SELECT * FROM enrollments WHERE user_id = $1 ORDER BY enrolled_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(sqlx::query_as::<_, Enrollment>(
            r#"
            UPDATE enrollments
            SET progress = $3,
                status = CASE WHEN $3 = 100 THEN 'COMPLETED'::enrollment_status ELSE status END,
                completed_at = CASE WHEN $3 = 100 THEN COALESCE(completed_at, $4) ELSE completed_at END
            WHERE user_id = $1 AND course_id = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(progress)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upsert_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        Ok(sqlx::query_as::<_, LessonProgress>(
            r#"
            INSERT INTO lesson_progress
                (user_id, lesson_id, watched_duration, last_position, is_completed, completed_at, updated_at)
            VALUES ($1, $2, COALESCE($3, 0), COALESCE($4, 0), COALESCE($5, false),
                    CASE WHEN $5 THEN $6 END, $6)
            ON CONFLICT (user_id, lesson_id) DO UPDATE SET
                watched_duration = COALESCE($3, lesson_progress.watched_duration),
                last_position = COALESCE($4, lesson_progress.last_position),
                is_completed = COALESCE($5, lesson_progress.is_completed),
                completed_at = CASE
                    WHEN $5 IS NULL THEN lesson_progress.completed_at
                    WHEN $5 THEN $6
                    ELSE NULL
                END,
                updated_at = $6
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(lesson_id)
        .bind(update.watched_duration)
        .bind(update.last_position)
        .bind(update.is_completed)
        .bind(now)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Option<LessonProgress>> {
        Ok(sqlx::query_as::<_, LessonProgress>(
            "SELECT * FROM lesson_progress WHERE user_id = $1 AND lesson_id = $2",
        )
        .bind(user_id)
        .bind(lesson_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn course_lesson_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<LessonProgress>> {
        Ok(sqlx::query_as::<_, LessonProgress>(
            r#"
            SELECT lp.*
            FROM lesson_progress lp
            JOIN lessons l ON l.id = lp.lesson_id
            JOIN modules m ON m.id = l.module_id
            WHERE lp.user_id = $1 AND m.course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        Ok(sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_certificate_by_id(
        &self,
        certificate_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        Ok(
            sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
                .bind(certificate_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn insert_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        course_title: &str,
        issue_date: DateTime<Utc>,
    ) -> StoreResult<Certificate> {
        Ok(sqlx::query_as::<_, Certificate>(
            r#"
            INSERT INTO certificates (user_id, course_id, course_title, issue_date)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .bind(course_title)
        .bind(issue_date)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>> {
        Ok(sqlx::query_as::<_, Certificate>(
            "SELECT * FROM certificates WHERE user_id = $1 ORDER BY issue_date DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_bookmark(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<Bookmark> {
        Ok(sqlx::query_as::<_, Bookmark>(
            r#"
            INSERT INTO bookmarks (user_id, type, article_id, book_id, course_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(resource.kind())
        .bind(resource.article_id())
        .bind(resource.book_id())
        .bind(resource.course_id())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_bookmark(&self, bookmark_id: Uuid) -> StoreResult<Option<Bookmark>> {
        Ok(
            sqlx::query_as::<_, Bookmark>("SELECT * FROM bookmarks WHERE id = $1")
                .bind(bookmark_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn delete_bookmark(&self, bookmark_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE id = $1")
            .bind(bookmark_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_bookmark_by_resource(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> StoreResult<bool> {
        let result = sqlx::query(&format!("DELETE FROM bookmarks WHERE {BOOKMARK_TUPLE_MATCH}"))
            .bind(user_id)
            .bind(resource.kind())
            .bind(resource.article_id())
            .bind(resource.book_id())
            .bind(resource.course_id())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn bookmark_exists(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<bool> {
        Ok(sqlx::query_scalar(&format!(
            "SELECT EXISTS (SELECT 1 FROM bookmarks WHERE {BOOKMARK_TUPLE_MATCH})"
        ))
        .bind(user_id)
        .bind(resource.kind())
        .bind(resource.article_id())
        .bind(resource.book_id())
        .bind(resource.course_id())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn count_bookmarks(&self, resource: ResourceRef) -> StoreResult<i64> {
        Ok(sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bookmarks
            WHERE type = $1
              AND article_id IS NOT DISTINCT FROM $2
              AND book_id IS NOT DISTINCT FROM $3
              AND course_id IS NOT DISTINCT FROM $4
            "#,
        )
        .bind(resource.kind())
        .bind(resource.article_id())
        .bind(resource.book_id())
        .bind(resource.course_id())
        .fetch_one(&self.pool)
        .await?)
    }

    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        kind: Option<BookmarkType>,
    ) -> StoreResult<Vec<BookmarkWithResource>> {
        let rows = sqlx::query_as::<_, BookmarkJoinRow>(
            r#"
            SELECT b.*,
                   COALESCE(a.id, bk.id, c.id) AS resource_id,
                   COALESCE(a.title, bk.title, c.title) AS resource_title,
                   COALESCE(a.slug, bk.slug, c.slug) AS resource_slug
            FROM bookmarks b
            LEFT JOIN articles a ON a.id = b.article_id
            LEFT JOIN books bk ON bk.id = b.book_id
            LEFT JOIN courses c ON c.id = b.course_id
            WHERE b.user_id = $1 AND ($2::bookmark_type IS NULL OR b.type = $2)
            ORDER BY b.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(BookmarkWithResource::from).collect())
    }

    async fn insert_question(
        &self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StoreResult<Question> {
        Ok(sqlx::query_as::<_, Question>(
            "INSERT INTO questions (user_id, title, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(user_id)
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_question(&self, question_id: Uuid) -> StoreResult<Option<Question>> {
        Ok(
            sqlx::query_as::<_, Question>("SELECT * FROM questions WHERE id = $1")
                .bind(question_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_questions(&self, status: Option<QuestionStatus>) -> StoreResult<Vec<Question>> {
        Ok(sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE ($1::question_status IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_question(
        &self,
        question_id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Question>> {
        Ok(sqlx::query_as::<_, Question>(
            r#"
            UPDATE questions
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(question_id)
        .bind(title)
        .bind(content)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete_question(&self, question_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1")
            .bind(question_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn increment_question_views(&self, question_id: Uuid) -> StoreResult<Option<Question>> {
        Ok(sqlx::query_as::<_, Question>(
            "UPDATE questions SET views = views + 1 WHERE id = $1 RETURNING *",
        )
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn update_question_status(
        &self,
        question_id: Uuid,
        expected: Option<QuestionStatus>,
        to: QuestionStatus,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET status = $3, updated_at = now()
            WHERE id = $1 AND ($2::question_status IS NULL OR status = $2)
            "#,
        )
        .bind(question_id)
        .bind(expected)
        .bind(to)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_answer(
        &self,
        question_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Answer> {
        Ok(sqlx::query_as::<_, Answer>(
            "INSERT INTO answers (question_id, user_id, content) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(question_id)
        .bind(user_id)
        .bind(content)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>> {
        Ok(
            sqlx::query_as::<_, Answer>("SELECT * FROM answers WHERE id = $1")
                .bind(answer_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn list_answers(&self, question_id: Uuid) -> StoreResult<Vec<Answer>> {
        Ok(sqlx::query_as::<_, Answer>(
            r#"
            SELECT * FROM answers
            WHERE question_id = $1
            ORDER BY is_accepted DESC, created_at ASC
            "#,
        )
        .bind(question_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn reopen_if_unanswered(&self, question_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE questions
            SET status = 'OPEN', updated_at = now()
            WHERE id = $1
              AND status <> 'OPEN'
              AND NOT EXISTS (SELECT 1 FROM answers WHERE question_id = $1)
            "#,
        )
        .bind(question_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_answer(&self, answer_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM answers WHERE id = $1")
            .bind(answer_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn accept_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>> {
        let mut tx = self.pool.begin().await?;

        // Locking the parent question serialises concurrent accepts on it.
        let question_id: Option<Uuid> = sqlx::query_scalar(
            r#"
            SELECT a.question_id
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.id = $1
            FOR UPDATE OF q
            "#,
        )
        .bind(answer_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(question_id) = question_id else {
            return Ok(None);
        };

        sqlx::query(
            "UPDATE answers SET is_accepted = false WHERE question_id = $1 AND id <> $2 AND is_accepted",
        )
        .bind(question_id)
        .bind(answer_id)
        .execute(&mut *tx)
        .await?;

        let accepted = sqlx::query_as::<_, Answer>(
            "UPDATE answers SET is_accepted = true WHERE id = $1 RETURNING *",
        )
        .bind(answer_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(accepted))
    }
}
