use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::handlers;

/// Configure Swagger UI endpoints
pub fn configure_swagger_routes() -> SwaggerUi {
    SwaggerUi::new("/api-docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

/// Registers the `bearer` scheme referenced by protected paths
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
            );
        }
    }
}

// API Documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,

        handlers::auth::admin_login,
        handlers::auth::doctor_login,
        handlers::auth::user_login,
        handlers::auth::register,
        handlers::auth::logout,

        handlers::students::add_student,
        handlers::students::list_students,
        handlers::students::student_directory,
        handlers::students::delete_student,
        handlers::students::import_students,
        handlers::students::export_students,

        handlers::doctors::add_doctor,
        handlers::doctors::all_doctors,
        handlers::doctors::doctor_list,
        handlers::doctors::delete_doctor,
        handlers::doctors::change_availability,
        handlers::doctors::own_availability,
        handlers::doctors::doctor_profile,
        handlers::doctors::update_doctor_profile,

        handlers::profile::get_profile,
        handlers::profile::update_profile,
        handlers::profile::change_password,

        handlers::physical_fitness::save_record,
        handlers::physical_fitness::list_records,
        handlers::physical_fitness::record_status,
        handlers::physical_fitness::import_records,
        handlers::physical_fitness::export_records,
        handlers::physical_fitness::student_records,
        handlers::physical_fitness::student_sessions,
        handlers::physical_fitness::compare_sessions,
        handlers::physical_fitness::health_scores,

        handlers::exam_sessions::create_session,
        handlers::exam_sessions::list_sessions,
        handlers::exam_sessions::sessions_overview,
        handlers::exam_sessions::toggle_lock,
        handlers::exam_sessions::edit_permission,
        handlers::exam_sessions::request_edit_access,
        handlers::exam_sessions::my_requests,
        handlers::exam_sessions::cancel_request,
        handlers::exam_sessions::all_requests,
        handlers::exam_sessions::review_request,
        handlers::exam_sessions::revoke_request,

        handlers::medical::create_abnormality,
        handlers::medical::list_abnormalities,
        handlers::medical::student_abnormalities,
        handlers::medical::delete_abnormality,
        handlers::medical::add_prescription,
        handlers::medical::student_prescriptions,
        handlers::medical::abnormality_prescriptions,
        handlers::medical::my_abnormalities,
        handlers::medical::my_prescriptions,

        handlers::drugs::add_drug,
        handlers::drugs::list_drugs,
        handlers::drugs::update_drug,
        handlers::drugs::delete_drug,
        handlers::drugs::import_drugs,
        handlers::drugs::drug_alerts,

        handlers::news::add_news,
        handlers::news::list_news,
        handlers::news::announcements,
        handlers::news::update_news,
        handlers::news::delete_news,

        handlers::messages::send_message,
        handlers::messages::get_messages,
        handlers::messages::conversations,
        handlers::messages::online_users,
        handlers::messages::events,
        handlers::messages::chat_users,

        handlers::analytics::dashboard,
        handlers::analytics::health_analytics,

        handlers::backups::create_backup,
        handlers::backups::list_backups,
        handlers::backups::backup_stats,
        handlers::backups::backup_details,
        handlers::backups::download_backup,
        handlers::backups::verify_backup,
        handlers::backups::restore_backup,
        handlers::backups::delete_backup,
        handlers::backups::cleanup_backups
    ),
    components(
        schemas(
            // Envelopes and forms
            crate::entities::common::ErrorResponse,
            crate::entities::common::MessageResponse,
            crate::entities::common::OnlineUsers,
            crate::entities::forms::DoctorForm,
            crate::entities::forms::StudentForm,
            crate::entities::forms::ProfileForm,
            crate::entities::forms::DrugForm,
            crate::entities::forms::NewsForm,
            crate::entities::forms::ImportForm,

            // Health
            handlers::health::HealthResponse,
            handlers::health::ComponentStatus,
            handlers::health::ComponentHealthStatus,

            // Auth
            school_health_domain::auth::Role,
            school_health_domain::auth::LoginRequest,
            school_health_domain::auth::LoginResponse,
            school_health_domain::auth::UserInfo,

            // Accounts and doctors
            school_health_domain::entities::Address,
            school_health_domain::entities::InvalidRow,
            school_health_domain::entities::AccountRole,
            school_health_domain::entities::Student,
            school_health_domain::entities::RegisterRequest,
            school_health_domain::entities::UpdateProfileRequest,
            school_health_domain::entities::ChangePasswordRequest,
            school_health_domain::entities::StudentImportSummary,
            school_health_domain::entities::Doctor,
            school_health_domain::entities::UpdateDoctorProfileRequest,

            // Physical fitness
            school_health_domain::entities::PhysicalFitness,
            school_health_domain::entities::HeightRating,
            school_health_domain::entities::WeightRating,
            school_health_domain::entities::BmiRating,
            school_health_domain::entities::VitalRating,
            school_health_domain::entities::physical_fitness::SaveFitnessRequest,
            school_health_domain::entities::physical_fitness::FitnessStatus,
            school_health_domain::entities::physical_fitness::FitnessImportSummary,
            school_health_domain::entities::physical_fitness::DuplicateRow,
            school_health_domain::entities::physical_fitness::FitnessDifferences,
            school_health_domain::entities::physical_fitness::SessionComparison,
            school_health_domain::entities::physical_fitness::HealthScores,
            school_health_domain::entities::physical_fitness::StudentSession,

            // Exam sessions
            school_health_domain::entities::exam_session::ExamSession,
            school_health_domain::entities::exam_session::CreateExamSessionRequest,
            school_health_domain::entities::exam_session::ExamSessionOverview,
            school_health_domain::entities::exam_session::ToggleLockRequest,
            school_health_domain::entities::exam_session::EditPermission,
            school_health_domain::entities::exam_session::EditRequest,
            school_health_domain::entities::exam_session::EditRequestStatus,
            school_health_domain::entities::exam_session::CreateEditRequest,
            school_health_domain::entities::exam_session::ReviewEditRequest,
            school_health_domain::entities::exam_session::ReviewAction,

            // Medical
            school_health_domain::entities::medical::Abnormality,
            school_health_domain::entities::medical::CreateAbnormalityRequest,
            school_health_domain::entities::medical::Medicine,
            school_health_domain::entities::medical::MealTiming,
            school_health_domain::entities::medical::Prescription,
            school_health_domain::entities::medical::CreatePrescriptionRequest,

            // Drugs and news
            school_health_domain::entities::drug::Drug,
            school_health_domain::entities::drug::DrugAlerts,
            school_health_domain::entities::drug::DrugImportSummary,
            school_health_domain::entities::news::News,

            // Chat
            school_health_domain::entities::chat::Message,
            school_health_domain::entities::chat::SendMessageRequest,
            school_health_domain::entities::chat::ConversationSummary,
            school_health_domain::entities::chat::ChatUser,

            // Analytics
            school_health_domain::entities::analytics::Dashboard,
            school_health_domain::entities::analytics::HealthAnalytics,
            school_health_domain::entities::analytics::BmiDistribution,
            school_health_domain::entities::analytics::MonthlyTrend,
            school_health_domain::entities::analytics::SymptomCount,
            school_health_domain::entities::analytics::CohortHealth,

            // Backups
            school_health_domain::entities::backup::Backup,
            school_health_domain::entities::backup::BackupType,
            school_health_domain::entities::backup::BackupStatus,
            school_health_domain::entities::backup::CollectionStat,
            school_health_domain::entities::backup::CreateBackupRequest,
            school_health_domain::entities::backup::BackupStats,
            school_health_domain::entities::backup::VerifyOutcome,
            school_health_domain::entities::backup::RestoreOutcome,
            school_health_domain::entities::backup::CleanupOutcome
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "health", description = "Health check endpoint"),
        (name = "auth", description = "Login, registration and logout"),
        (name = "students", description = "Student accounts"),
        (name = "doctors", description = "Doctor accounts"),
        (name = "profile", description = "The caller's own account"),
        (name = "physical-fitness", description = "Measurements and their assessments"),
        (name = "exam-sessions", description = "Exam sessions and locking"),
        (name = "edit-requests", description = "Temporary edit access to locked sessions"),
        (name = "medical", description = "Abnormalities and prescriptions"),
        (name = "drugs", description = "Drug inventory"),
        (name = "news", description = "Announcements"),
        (name = "messages", description = "Chat between users"),
        (name = "analytics", description = "Dashboard and health analytics"),
        (name = "backups", description = "Database backups")
    ),
    info(
        title = "SchoolHealth API",
        version = "0.1.0",
        description = "API for managing student health records in a school clinic",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        ),
    ),
    servers(
        (url = "/", description = "Local development server")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_doc_generation() {
        let openapi = ApiDoc::openapi();

        assert_eq!(openapi.info.title, "SchoolHealth API");
        assert_eq!(openapi.info.version, "0.1.0");

        let tags = openapi.tags.as_ref().expect("tags are defined");
        assert!(tags.iter().any(|tag| tag.name == "physical-fitness"));
        assert!(tags.iter().any(|tag| tag.name == "backups"));

        let paths = &openapi.paths.paths;
        assert!(paths.contains_key("/health"));
        assert!(paths.contains_key("/api/admin/login"));
        assert!(paths.contains_key("/api/doctor/physical-fitness"));
        assert!(paths.contains_key("/api/user/compare/{student_id}"));
        assert!(paths.contains_key("/api/admin/backups/{id}/restore"));
        assert!(paths.contains_key("/api/messages/events"));
    }

    #[test]
    fn test_bearer_scheme_is_registered() {
        let openapi = ApiDoc::openapi();
        let components = openapi.components.expect("components are defined");
        assert!(components.security_schemes.contains_key("bearer"));
    }
}
