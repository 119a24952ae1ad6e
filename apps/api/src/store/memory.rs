//! In-process `Store` used by the unit tests. Enforces the same uniqueness
//! constraints as the PostgreSQL schema; one mutex makes each call atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::bookmark::{
    Bookmark, BookmarkType, BookmarkWithResource, ResourceRef, ResourceSummary,
};
use crate::models::course::{Course, CourseStatus, Lesson, LessonContext, Module};
use crate::models::progress::{
    Certificate, Enrollment, EnrollmentStatus, LessonProgress, ProgressUpdate,
};
use crate::models::qa::{Answer, Question, QuestionStatus};
use crate::models::user::UserSummary;
use crate::store::{Store, StoreError, StoreResult};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, UserSummary>,
    courses: HashMap<Uuid, Course>,
    modules: HashMap<Uuid, Module>,
    lessons: Vec<Lesson>,
    articles: HashMap<Uuid, ResourceSummary>,
    books: HashMap<Uuid, ResourceSummary>,
    enrollments: Vec<Enrollment>,
    lesson_progress: Vec<LessonProgress>,
    certificates: Vec<Certificate>,
    bookmarks: Vec<Bookmark>,
    questions: Vec<Question>,
    answers: Vec<Answer>,
    fail_enrollment_updates: bool,
    stale_certificate_reads: usize,
}

impl Inner {
    fn course_of_lesson(&self, lesson: &Lesson) -> Option<Uuid> {
        self.modules.get(&lesson.module_id).map(|m| m.course_id)
    }

    fn lesson_ids_of_course(&self, course_id: Uuid) -> Vec<Uuid> {
        self.lessons
            .iter()
            .filter(|l| self.course_of_lesson(l) == Some(course_id))
            .map(|l| l.id)
            .collect()
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn unique(constraint: &str) -> StoreError {
    StoreError::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add_user(&self, name: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().users.insert(
            id,
            UserSummary {
                id,
                name: name.to_string(),
                avatar_url: None,
            },
        );
        id
    }

    pub fn add_course(&self, title: &str, is_free: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().courses.insert(
            id,
            Course {
                id,
                slug: title.to_lowercase().replace(' ', "-"),
                title: title.to_string(),
                is_free,
                status: CourseStatus::Published,
                created_at: Utc::now(),
            },
        );
        id
    }

    pub fn rename_course(&self, course_id: Uuid, title: &str) {
        if let Some(course) = self.lock().courses.get_mut(&course_id) {
            course.title = title.to_string();
        }
    }

    pub fn add_module(&self, course_id: Uuid, position: i32) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().modules.insert(
            id,
            Module {
                id,
                course_id,
                title: format!("Module {position}"),
                position,
            },
        );
        id
    }

    pub fn add_lesson(
        &self,
        module_id: Uuid,
        position: i32,
        duration: Option<i32>,
        is_free: bool,
    ) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().lessons.push(Lesson {
            id,
            module_id,
            title: format!("Lesson {position}"),
            position,
            duration,
            is_free,
        });
        id
    }

    pub fn add_article(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().articles.insert(
            id,
            ResourceSummary {
                id,
                title: title.to_string(),
                slug: title.to_lowercase().replace(' ', "-"),
            },
        );
        id
    }

    pub fn add_book(&self, title: &str) -> Uuid {
        let id = Uuid::new_v4();
        self.lock().books.insert(
            id,
            ResourceSummary {
                id,
                title: title.to_string(),
                slug: title.to_lowercase().replace(' ', "-"),
            },
        );
        id
    }

    /// Makes every subsequent enrollment progress update fail with a database error.
    pub fn fail_enrollment_updates(&self) {
        self.lock().fail_enrollment_updates = true;
    }

    /// The next `reads` certificate lookups by (user, course) miss, as they
    /// would for a request racing another one that has not committed yet.
    pub fn stale_certificate_reads(&self, reads: usize) {
        self.lock().stale_certificate_reads = reads;
    }

    pub fn certificate_count(&self, user_id: Uuid, course_id: Uuid) -> usize {
        self.lock()
            .certificates
            .iter()
            .filter(|c| c.user_id == user_id && c.course_id == course_id)
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn user_summary(&self, user_id: Uuid) -> StoreResult<Option<UserSummary>> {
        Ok(self.lock().users.get(&user_id).cloned())
    }

    async fn find_course(&self, course_id: Uuid) -> StoreResult<Option<Course>> {
        Ok(self.lock().courses.get(&course_id).cloned())
    }

    async fn lesson_context(&self, lesson_id: Uuid) -> StoreResult<Option<LessonContext>> {
        let inner = self.lock();
        let Some(lesson) = inner.lessons.iter().find(|l| l.id == lesson_id) else {
            return Ok(None);
        };
        let Some(module) = inner.modules.get(&lesson.module_id) else {
            return Ok(None);
        };
        let Some(course) = inner.courses.get(&module.course_id) else {
            return Ok(None);
        };
        Ok(Some(LessonContext {
            lesson_id: lesson.id,
            module_id: module.id,
            course_id: course.id,
            duration: lesson.duration,
            lesson_is_free: lesson.is_free,
            course_is_free: course.is_free,
        }))
    }

    async fn course_lessons(&self, course_id: Uuid) -> StoreResult<Vec<Lesson>> {
        let inner = self.lock();
        let mut lessons: Vec<(i32, Lesson)> = inner
            .lessons
            .iter()
            .filter_map(|l| {
                let module = inner.modules.get(&l.module_id)?;
                (module.course_id == course_id).then(|| (module.position, l.clone()))
            })
            .collect();
        lessons.sort_by_key(|(module_position, l)| (*module_position, l.position));
        Ok(lessons.into_iter().map(|(_, l)| l).collect())
    }

    async fn count_course_lessons(&self, course_id: Uuid) -> StoreResult<i64> {
        Ok(self.lock().lesson_ids_of_course(course_id).len() as i64)
    }

    async fn count_completed_lessons(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<i64> {
        let inner = self.lock();
        let lesson_ids = inner.lesson_ids_of_course(course_id);
        Ok(inner
            .lesson_progress
            .iter()
            .filter(|p| p.user_id == user_id && p.is_completed && lesson_ids.contains(&p.lesson_id))
            .count() as i64)
    }

    async fn find_enrollment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Enrollment>> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
            .cloned())
    }

    async fn insert_enrollment(&self, user_id: Uuid, course_id: Uuid) -> StoreResult<Enrollment> {
        let mut inner = self.lock();
        if inner
            .enrollments
            .iter()
            .any(|e| e.user_id == user_id && e.course_id == course_id)
        {
            return Err(unique("enrollments_user_course_key"));
        }
        let enrollment = Enrollment {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            status: EnrollmentStatus::Active,
            progress: 0,
            enrolled_at: Utc::now(),
            completed_at: None,
        };
        inner.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }

    async fn list_enrollments(&self, user_id: Uuid) -> StoreResult<Vec<Enrollment>> {
        Ok(self
            .lock()
            .enrollments
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn update_enrollment_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        progress: i32,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Enrollment>> {
        let mut inner = self.lock();
        if inner.fail_enrollment_updates {
            return Err(StoreError::Database(sqlx::Error::PoolTimedOut));
        }
        let Some(enrollment) = inner
            .enrollments
            .iter_mut()
            .find(|e| e.user_id == user_id && e.course_id == course_id)
        else {
            return Ok(None);
        };
        enrollment.progress = progress;
        if progress == 100 {
            enrollment.status = EnrollmentStatus::Completed;
            enrollment.completed_at.get_or_insert(now);
        }
        Ok(Some(enrollment.clone()))
    }

    async fn upsert_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
        update: &ProgressUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<LessonProgress> {
        let mut inner = self.lock();
        if let Some(existing) = inner
            .lesson_progress
            .iter_mut()
            .find(|p| p.user_id == user_id && p.lesson_id == lesson_id)
        {
            if let Some(watched) = update.watched_duration {
                existing.watched_duration = watched;
            }
            if let Some(position) = update.last_position {
                existing.last_position = position;
            }
            if let Some(completed) = update.is_completed {
                existing.is_completed = completed;
                existing.completed_at = completed.then_some(now);
            }
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let is_completed = update.is_completed.unwrap_or(false);
        let progress = LessonProgress {
            id: Uuid::new_v4(),
            user_id,
            lesson_id,
            is_completed,
            watched_duration: update.watched_duration.unwrap_or(0),
            last_position: update.last_position.unwrap_or(0),
            completed_at: is_completed.then_some(now),
            updated_at: now,
        };
        inner.lesson_progress.push(progress.clone());
        Ok(progress)
    }

    async fn find_lesson_progress(
        &self,
        user_id: Uuid,
        lesson_id: Uuid,
    ) -> StoreResult<Option<LessonProgress>> {
        Ok(self
            .lock()
            .lesson_progress
            .iter()
            .find(|p| p.user_id == user_id && p.lesson_id == lesson_id)
            .cloned())
    }

    async fn course_lesson_progress(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Vec<LessonProgress>> {
        let inner = self.lock();
        let lesson_ids = inner.lesson_ids_of_course(course_id);
        Ok(inner
            .lesson_progress
            .iter()
            .filter(|p| p.user_id == user_id && lesson_ids.contains(&p.lesson_id))
            .cloned()
            .collect())
    }

    async fn find_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        let mut inner = self.lock();
        if inner.stale_certificate_reads > 0 {
            inner.stale_certificate_reads -= 1;
            return Ok(None);
        }
        Ok(inner
            .certificates
            .iter()
            .find(|c| c.user_id == user_id && c.course_id == course_id)
            .cloned())
    }

    async fn find_certificate_by_id(
        &self,
        certificate_id: Uuid,
    ) -> StoreResult<Option<Certificate>> {
        Ok(self
            .lock()
            .certificates
            .iter()
            .find(|c| c.id == certificate_id)
            .cloned())
    }

    async fn insert_certificate(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        course_title: &str,
        issue_date: DateTime<Utc>,
    ) -> StoreResult<Certificate> {
        let mut inner = self.lock();
        if inner
            .certificates
            .iter()
            .any(|c| c.user_id == user_id && c.course_id == course_id)
        {
            return Err(unique("certificates_user_course_key"));
        }
        let certificate = Certificate {
            id: Uuid::new_v4(),
            user_id,
            course_id,
            course_title: course_title.to_string(),
            issue_date,
            pdf_url: None,
        };
        inner.certificates.push(certificate.clone());
        Ok(certificate)
    }

    async fn list_certificates(&self, user_id: Uuid) -> StoreResult<Vec<Certificate>> {
        Ok(self
            .lock()
            .certificates
            .iter()
            .rev()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_bookmark(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<Bookmark> {
        let mut inner = self.lock();
        let exists = match resource {
            ResourceRef::Article(id) => inner.articles.contains_key(&id),
            ResourceRef::Book(id) => inner.books.contains_key(&id),
            ResourceRef::Course(id) => inner.courses.contains_key(&id),
        };
        if !exists {
            return Err(StoreError::MissingReference {
                constraint: "bookmarks_resource_fkey".to_string(),
            });
        }
        if inner
            .bookmarks
            .iter()
            .any(|b| b.user_id == user_id && b.resource() == Some(resource))
        {
            return Err(unique("bookmarks_user_resource_key"));
        }
        let bookmark = Bookmark {
            id: Uuid::new_v4(),
            user_id,
            kind: resource.kind(),
            article_id: resource.article_id(),
            book_id: resource.book_id(),
            course_id: resource.course_id(),
            created_at: Utc::now(),
        };
        inner.bookmarks.push(bookmark.clone());
        Ok(bookmark)
    }

    async fn find_bookmark(&self, bookmark_id: Uuid) -> StoreResult<Option<Bookmark>> {
        Ok(self
            .lock()
            .bookmarks
            .iter()
            .find(|b| b.id == bookmark_id)
            .cloned())
    }

    async fn delete_bookmark(&self, bookmark_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        let before = inner.bookmarks.len();
        inner.bookmarks.retain(|b| b.id != bookmark_id);
        Ok(inner.bookmarks.len() < before)
    }

    async fn delete_bookmark_by_resource(
        &self,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        let before = inner.bookmarks.len();
        inner
            .bookmarks
            .retain(|b| !(b.user_id == user_id && b.resource() == Some(resource)));
        Ok(inner.bookmarks.len() < before)
    }

    async fn bookmark_exists(&self, user_id: Uuid, resource: ResourceRef) -> StoreResult<bool> {
        Ok(self
            .lock()
            .bookmarks
            .iter()
            .any(|b| b.user_id == user_id && b.resource() == Some(resource)))
    }

    async fn count_bookmarks(&self, resource: ResourceRef) -> StoreResult<i64> {
        Ok(self
            .lock()
            .bookmarks
            .iter()
            .filter(|b| b.resource() == Some(resource))
            .count() as i64)
    }

    async fn list_bookmarks(
        &self,
        user_id: Uuid,
        kind: Option<BookmarkType>,
    ) -> StoreResult<Vec<BookmarkWithResource>> {
        let inner = self.lock();
        Ok(inner
            .bookmarks
            .iter()
            .rev()
            .filter(|b| b.user_id == user_id && kind.map_or(true, |k| b.kind == k))
            .map(|b| {
                let resource = match b.resource() {
                    Some(ResourceRef::Article(id)) => inner.articles.get(&id).cloned(),
                    Some(ResourceRef::Book(id)) => inner.books.get(&id).cloned(),
                    Some(ResourceRef::Course(id)) => {
                        inner.courses.get(&id).map(|c| ResourceSummary {
                            id: c.id,
                            title: c.title.clone(),
                            slug: c.slug.clone(),
                        })
                    }
                    None => None,
                };
                BookmarkWithResource {
                    bookmark: b.clone(),
                    resource,
                }
            })
            .collect())
    }

    async fn insert_question(
        &self,
        user_id: Uuid,
        title: &str,
        content: &str,
    ) -> StoreResult<Question> {
        let now = Utc::now();
        let question = Question {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            content: content.to_string(),
            status: QuestionStatus::Open,
            views: 0,
            created_at: now,
            updated_at: now,
        };
        self.lock().questions.push(question.clone());
        Ok(question)
    }

    async fn find_question(&self, question_id: Uuid) -> StoreResult<Option<Question>> {
        Ok(self
            .lock()
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .cloned())
    }

    async fn list_questions(&self, status: Option<QuestionStatus>) -> StoreResult<Vec<Question>> {
        Ok(self
            .lock()
            .questions
            .iter()
            .rev()
            .filter(|q| status.map_or(true, |s| q.status == s))
            .cloned()
            .collect())
    }

    async fn update_question(
        &self,
        question_id: Uuid,
        title: Option<&str>,
        content: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Question>> {
        let mut inner = self.lock();
        let Some(question) = inner.questions.iter_mut().find(|q| q.id == question_id) else {
            return Ok(None);
        };
        if let Some(title) = title {
            question.title = title.to_string();
        }
        if let Some(content) = content {
            question.content = content.to_string();
        }
        question.updated_at = now;
        Ok(Some(question.clone()))
    }

    async fn delete_question(&self, question_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        let before = inner.questions.len();
        inner.questions.retain(|q| q.id != question_id);
        let deleted = inner.questions.len() < before;
        if deleted {
            inner.answers.retain(|a| a.question_id != question_id);
        }
        Ok(deleted)
    }

    async fn increment_question_views(&self, question_id: Uuid) -> StoreResult<Option<Question>> {
        let mut inner = self.lock();
        Ok(inner
            .questions
            .iter_mut()
            .find(|q| q.id == question_id)
            .map(|q| {
                q.views += 1;
                q.clone()
            }))
    }

    async fn update_question_status(
        &self,
        question_id: Uuid,
        expected: Option<QuestionStatus>,
        to: QuestionStatus,
    ) -> StoreResult<bool> {
        let mut inner = self.lock();
        let Some(question) = inner.questions.iter_mut().find(|q| q.id == question_id) else {
            return Ok(false);
        };
        if expected.is_some_and(|e| e != question.status) {
            return Ok(false);
        }
        question.status = to;
        question.updated_at = Utc::now();
        Ok(true)
    }

    async fn insert_answer(
        &self,
        question_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> StoreResult<Answer> {
        let answer = Answer {
            id: Uuid::new_v4(),
            question_id,
            user_id,
            content: content.to_string(),
            is_accepted: false,
            created_at: Utc::now(),
        };
        self.lock().answers.push(answer.clone());
        Ok(answer)
    }

    async fn find_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>> {
        Ok(self
            .lock()
            .answers
            .iter()
            .find(|a| a.id == answer_id)
            .cloned())
    }

    async fn list_answers(&self, question_id: Uuid) -> StoreResult<Vec<Answer>> {
        let mut answers: Vec<Answer> = self
            .lock()
            .answers
            .iter()
            .filter(|a| a.question_id == question_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among equals.
        answers.sort_by_key(|a| !a.is_accepted);
        Ok(answers)
    }

    async fn reopen_if_unanswered(&self, question_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        if inner.answers.iter().any(|a| a.question_id == question_id) {
            return Ok(false);
        }
        let Some(question) = inner
            .questions
            .iter_mut()
            .find(|q| q.id == question_id && q.status != QuestionStatus::Open)
        else {
            return Ok(false);
        };
        question.status = QuestionStatus::Open;
        question.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_answer(&self, answer_id: Uuid) -> StoreResult<bool> {
        let mut inner = self.lock();
        let before = inner.answers.len();
        inner.answers.retain(|a| a.id != answer_id);
        Ok(inner.answers.len() < before)
    }

    async fn accept_answer(&self, answer_id: Uuid) -> StoreResult<Option<Answer>> {
        let mut inner = self.lock();
        let Some(question_id) = inner
            .answers
            .iter()
            .find(|a| a.id == answer_id)
            .map(|a| a.question_id)
        else {
            return Ok(None);
        };
        let mut accepted = None;
        for answer in inner
            .answers
            .iter_mut()
            .filter(|a| a.question_id == question_id)
        {
            answer.is_accepted = answer.id == answer_id;
            if answer.is_accepted {
                accepted = Some(answer.clone());
            }
        }
        Ok(accepted)
    }
}
