// Domain services
// This module contains business logic implementations.

pub mod accounts;
pub mod analytics;
pub mod assessment;
pub mod auth;
pub mod backup;
pub mod chat;
pub mod doctors;
pub mod drugs;
pub mod exam_sessions;
pub mod medical;
pub mod news;
pub mod physical_fitness;

use std::sync::Arc;

use school_health_data::database::DatabasePool;
use school_health_data::repository::{
    AbnormalityRepository, AccountRepository, BackupRepository, DoctorRepository, DrugRepository,
    EditRequestRepository, ExamSessionRepository, MessageRepository, NewsRepository, PhysicalFitnessRepository,
    PrescriptionRepository,
};

pub use accounts::AccountService;
pub use analytics::AnalyticsService;
pub use auth::{AdminCredentials, AuthService};
pub use backup::{start_backup_scheduler, BackupConfig, BackupService};
pub use chat::{ChatConnection, ChatHub, ChatService};
pub use doctors::DoctorService;
pub use drugs::DrugService;
pub use exam_sessions::{start_unlock_sweeper, sweep_interval_from_env, ExamSessionService};
pub use medical::MedicalService;
pub use news::NewsService;
pub use physical_fitness::PhysicalFitnessService;

/// Every service the API needs, sharing one pool
#[derive(Clone)]
pub struct Services {
    pub auth: Arc<AuthService>,
    pub accounts: Arc<AccountService>,
    pub doctors: Arc<DoctorService>,
    pub exam_sessions: Arc<ExamSessionService>,
    pub fitness: Arc<PhysicalFitnessService>,
    pub medical: Arc<MedicalService>,
    pub drugs: Arc<DrugService>,
    pub news: Arc<NewsService>,
    pub chat: Arc<ChatService>,
    pub analytics: Arc<AnalyticsService>,
    pub backups: Arc<BackupService>,
}

/// Wire the SQLite repositories into the services
pub fn create_default_services(
    pool: DatabasePool,
    admin: Option<AdminCredentials>,
    backup_config: BackupConfig,
) -> Services {
    let accounts = Arc::new(AccountRepository::new(pool.clone()));
    let doctors = Arc::new(DoctorRepository::new(pool.clone()));
    let sessions = Arc::new(ExamSessionRepository::new(pool.clone()));
    let requests = Arc::new(EditRequestRepository::new(pool.clone()));
    let fitness = Arc::new(PhysicalFitnessRepository::new(pool.clone()));
    let abnormalities = Arc::new(AbnormalityRepository::new(pool.clone()));
    let prescriptions = Arc::new(PrescriptionRepository::new(pool.clone()));
    let drugs = Arc::new(DrugRepository::new(pool.clone()));
    let news = Arc::new(NewsRepository::new(pool.clone()));
    let messages = Arc::new(MessageRepository::new(pool.clone()));
    let backups = Arc::new(BackupRepository::new(pool.clone()));

    let exam_sessions = Arc::new(ExamSessionService::new(sessions.clone(), requests, fitness.clone()));

    Services {
        auth: Arc::new(AuthService::new(accounts.clone(), doctors.clone(), admin)),
        accounts: Arc::new(AccountService::new(accounts.clone())),
        doctors: Arc::new(DoctorService::new(doctors.clone())),
        fitness: Arc::new(PhysicalFitnessService::new(fitness.clone(), accounts.clone(), exam_sessions.clone())),
        exam_sessions,
        medical: Arc::new(MedicalService::new(abnormalities.clone(), prescriptions, drugs.clone())),
        drugs: Arc::new(DrugService::new(drugs.clone())),
        news: Arc::new(NewsService::new(news.clone())),
        chat: Arc::new(ChatService::new(messages, accounts.clone(), doctors.clone(), Arc::new(ChatHub::new()))),
        analytics: Arc::new(AnalyticsService { fitness, abnormalities, accounts, doctors, sessions, drugs, news }),
        backups: Arc::new(BackupService::new(pool, backups, backup_config)),
    }
}
