use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::debug;

use school_health_domain::auth::{auth_middleware, authorize, configure_security, Role};

use super::handlers::{
    analytics, auth, backups, doctors, drugs, exam_sessions, health, medical, messages, news, physical_fitness,
    profile, students,
};
use super::AppState;
use crate::openapi::configure_swagger_routes;

/// Wrap `router` so that every route needs a valid token and, when given, one of `roles`
fn protected(router: Router<AppState>, state: &AppState, roles: &[Role]) -> Router<AppState> {
    let router = if roles.is_empty() {
        router
    } else {
        router.layer(middleware::from_fn_with_state(
            state.clone(),
            authorize::require_any_role::<AppState>(roles),
        ))
    };

    // Authentication must happen before authorization
    router.layer(middleware::from_fn_with_state(state.clone(), auth_middleware::<AppState>))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/login", post(auth::admin_login));

    let private = Router::new()
        .route("/dashboard", get(analytics::dashboard))
        .route("/analytics", get(analytics::health_analytics))
        .route("/doctors", post(doctors::add_doctor).get(doctors::all_doctors))
        .route("/doctors/:id", delete(doctors::delete_doctor))
        .route("/doctors/:id/availability", post(doctors::change_availability))
        .route("/students", post(students::add_student).get(students::list_students))
        .route("/students/import", post(students::import_students))
        .route("/students/export", get(students::export_students))
        .route("/students/:id", delete(students::delete_student))
        .route("/news", post(news::add_news).get(news::list_news))
        .route("/news/:id", put(news::update_news).delete(news::delete_news))
        .route(
            "/exam-sessions",
            post(exam_sessions::create_session).get(exam_sessions::list_sessions),
        )
        .route("/exam-sessions/overview", get(exam_sessions::sessions_overview))
        .route("/exam-sessions/:id/lock", post(exam_sessions::toggle_lock))
        .route("/edit-requests", get(exam_sessions::all_requests))
        .route("/edit-requests/:id/review", post(exam_sessions::review_request))
        .route("/edit-requests/:id/revoke", post(exam_sessions::revoke_request))
        .route("/physical-fitness", get(physical_fitness::list_records))
        .route("/physical-fitness/status", get(physical_fitness::record_status))
        .route("/physical-fitness/export", get(physical_fitness::export_records))
        .route("/abnormalities", get(medical::list_abnormalities))
        .route("/backups", post(backups::create_backup).get(backups::list_backups))
        .route("/backups/stats", get(backups::backup_stats))
        .route("/backups/cleanup", post(backups::cleanup_backups))
        .route("/backups/:id", get(backups::backup_details).delete(backups::delete_backup))
        .route("/backups/:id/download", get(backups::download_backup))
        .route("/backups/:id/verify", post(backups::verify_backup))
        .route("/backups/:id/restore", post(backups::restore_backup));

    public.merge(protected(private, state, &[Role::Admin]))
}

fn doctor_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/login", post(auth::doctor_login))
        .route("/list", get(doctors::doctor_list));

    let private = Router::new()
        .route("/profile", get(doctors::doctor_profile).put(doctors::update_doctor_profile))
        .route("/availability", post(doctors::own_availability))
        .route(
            "/physical-fitness",
            post(physical_fitness::save_record).get(physical_fitness::list_records),
        )
        .route("/physical-fitness/status", get(physical_fitness::record_status))
        .route("/physical-fitness/import", post(physical_fitness::import_records))
        .route("/physical-fitness/export", get(physical_fitness::export_records))
        .route(
            "/abnormalities",
            post(medical::create_abnormality).get(medical::list_abnormalities),
        )
        .route("/abnormalities/student/:student_id", get(medical::student_abnormalities))
        .route("/abnormalities/:id", delete(medical::delete_abnormality))
        .route("/prescriptions", post(medical::add_prescription))
        .route("/prescriptions/student/:student_id", get(medical::student_prescriptions))
        .route("/prescriptions/abnormality/:id", get(medical::abnormality_prescriptions))
        .route("/drugs", post(drugs::add_drug).get(drugs::list_drugs))
        .route("/drugs/alerts", get(drugs::drug_alerts))
        .route("/drugs/import", post(drugs::import_drugs))
        .route("/drugs/:id", put(drugs::update_drug).delete(drugs::delete_drug))
        .route("/exam-sessions", get(exam_sessions::list_sessions))
        .route("/exam-sessions/:id/permission", get(exam_sessions::edit_permission))
        .route(
            "/edit-requests",
            post(exam_sessions::request_edit_access).get(exam_sessions::my_requests),
        )
        .route("/edit-requests/:id/cancel", post(exam_sessions::cancel_request))
        .route("/chat-users", get(messages::chat_users));

    public.merge(protected(private, state, &[Role::Doctor]))
}

fn user_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::user_login));

    let private = Router::new()
        .route("/profile", get(profile::get_profile).put(profile::update_profile))
        .route("/change-password", post(profile::change_password))
        .route("/physical/:student_id", get(physical_fitness::student_records))
        .route("/exam-sessions/:student_id", get(physical_fitness::student_sessions))
        .route("/compare/:student_id", get(physical_fitness::compare_sessions))
        .route("/health-scores/:student_id", get(physical_fitness::health_scores))
        .route("/abnormalities/:student_id", get(medical::my_abnormalities))
        .route("/prescriptions/:student_id", get(medical::my_prescriptions))
        .route("/announcements", get(news::announcements))
        .route("/chat-users", get(messages::chat_users));

    public.merge(protected(private, state, &[]))
}

fn message_routes(state: &AppState) -> Router<AppState> {
    let router = Router::new()
        .route("/conversations", get(messages::conversations))
        .route("/online", get(messages::online_users))
        .route("/events", get(messages::events))
        .route("/send/:id", post(messages::send_message))
        .route("/:id", get(messages::get_messages));

    protected(router, state, &[])
}

/// Create the application router
pub fn create_app(state: AppState) -> Router {
    debug!("Creating application router");

    let students = protected(
        Router::new().route("/", get(students::student_directory)),
        &state,
        &[Role::Admin, Role::Doctor],
    );
    let logout = protected(Router::new().route("/logout", post(auth::logout)), &state, &[]);

    let app = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/admin", admin_routes(&state))
        .nest("/api/doctor", doctor_routes(&state))
        .nest("/api/user", user_routes(&state))
        .nest("/api/students", students)
        .nest("/api/messages", message_routes(&state))
        .nest("/api/auth", logout)
        .nest_service("/uploads", ServeDir::new(&state.upload_dir))
        .with_state(state);

    debug!("Routes configured");

    let app = app.merge(configure_swagger_routes()).layer(TraceLayer::new_for_http());

    configure_security(app)
}
