// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, assignments, auth, exams, questions, results},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware, teacher_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, questions, exams, assignments, admin).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool + Config).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        // Protected profile route
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(middleware::from_fn_with_state(
                    state.clone(),
                    auth_middleware,
                )),
        );

    let question_routes = Router::new()
        .route(
            "/",
            get(questions::list_questions).post(questions::create_question),
        )
        .route(
            "/{id}",
            put(questions::update_question).delete(questions::delete_question),
        )
        .route("/bulk", post(questions::bulk_import))
        .route("/bulk-delete", post(questions::bulk_delete))
        // Double middleware protection: Auth first, then role check
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let exam_routes = Router::new()
        // Student-facing exam taking and reporting
        .route("/assigned", get(exams::list_assigned))
        .route("/start/{id}", get(exams::start_exam))
        .route("/submit/{id}", post(exams::submit_exam))
        .route("/history", get(results::exam_history))
        .route("/result/{id}", get(results::exam_result))
        .route("/review/{id}", get(results::exam_review))
        // Exam authoring, restricted to teachers/admins
        .merge(
            Router::new()
                .route("/", get(exams::list_exams).post(exams::create_exam))
                .route("/{id}/active", put(exams::set_exam_active))
                .layer(middleware::from_fn(teacher_middleware)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let assignment_routes = Router::new()
        .route("/", post(assignments::assign_exam))
        .route("/retry", post(assignments::retry_exam))
        .layer(middleware::from_fn(teacher_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let admin_routes = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", delete(admin::delete_user))
        .route("/results", get(results::export_results))
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/questions", question_routes)
        .nest("/api/exams", exam_routes)
        .nest("/api/assignments", assignment_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
