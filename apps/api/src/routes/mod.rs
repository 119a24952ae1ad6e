pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::bookmarks::handlers as bookmarks;
use crate::learning::handlers as learning;
use crate::qa::handlers as qa;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Enrollment & lesson progress
        .route(
            "/api/v1/lessons/:lesson_id/access",
            get(learning::handle_check_access),
        )
        .route(
            "/api/v1/lessons/:lesson_id/progress",
            get(learning::handle_get_lesson_progress).post(learning::handle_record_progress),
        )
        .route(
            "/api/v1/lessons/:lesson_id/complete",
            post(learning::handle_mark_complete),
        )
        .route(
            "/api/v1/courses/:course_id/enroll",
            post(learning::handle_enroll),
        )
        .route(
            "/api/v1/courses/:course_id/progress",
            get(learning::handle_course_progress),
        )
        .route("/api/v1/enrollments", get(learning::handle_list_enrollments))
        .route(
            "/api/v1/certificates",
            get(learning::handle_list_certificates),
        )
        .route(
            "/api/v1/certificates/:certificate_id",
            get(learning::handle_get_certificate),
        )
        // Bookmarks
        .route(
            "/api/v1/bookmarks",
            get(bookmarks::handle_list)
                .post(bookmarks::handle_create)
                .delete(bookmarks::handle_delete_by_resource),
        )
        .route("/api/v1/bookmarks/check", get(bookmarks::handle_check))
        .route("/api/v1/bookmarks/count", get(bookmarks::handle_count))
        .route(
            "/api/v1/bookmarks/:bookmark_id",
            axum::routing::delete(bookmarks::handle_delete),
        )
        // Q&A
        .route(
            "/api/v1/questions",
            get(qa::handle_list_questions).post(qa::handle_create_question),
        )
        .route(
            "/api/v1/questions/:question_id",
            get(qa::handle_get_question)
                .patch(qa::handle_update_question)
                .delete(qa::handle_delete_question),
        )
        .route(
            "/api/v1/questions/:question_id/close",
            post(qa::handle_close_question),
        )
        .route(
            "/api/v1/questions/:question_id/answers",
            post(qa::handle_create_answer),
        )
        .route(
            "/api/v1/answers/:answer_id/accept",
            post(qa::handle_accept_answer),
        )
        .route(
            "/api/v1/answers/:answer_id",
            axum::routing::delete(qa::handle_delete_answer),
        )
        .with_state(state)
}
