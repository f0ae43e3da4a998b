// Repository module structure
pub mod errors;
mod support;

mod account;
mod backup;
mod doctor;
mod drug;
mod exam_session;
mod medical;
mod message;
mod news;
mod physical_fitness;

// Re-export commonly used types
pub use errors::RepositoryError;

pub use account::{AccountRepository, AccountRepositoryTrait};
pub use backup::{BackupRepository, BackupRepositoryTrait};
pub use doctor::{DoctorRepository, DoctorRepositoryTrait};
pub use drug::{DrugRepository, DrugRepositoryTrait};
pub use exam_session::{
    EditRequestRepository, EditRequestRepositoryTrait, ExamSessionRepository, ExamSessionRepositoryTrait,
};
pub use medical::{
    AbnormalityRepository, AbnormalityRepositoryTrait, PrescriptionRepository, PrescriptionRepositoryTrait,
};
pub use message::{MessageRepository, MessageRepositoryTrait};
pub use news::{NewsRepository, NewsRepositoryTrait};
pub use physical_fitness::{PhysicalFitnessRepository, PhysicalFitnessRepositoryTrait};
