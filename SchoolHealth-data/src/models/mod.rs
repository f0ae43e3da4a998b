// Storage models: one row shape per table, with enum-like columns kept as text
pub mod account;
pub mod backup;
pub mod doctor;
pub mod drug;
pub mod exam_session;
pub mod medical;
pub mod message;
pub mod news;
pub mod physical_fitness;

pub use account::{AccountFilter, AccountRecord};
pub use backup::{BackupRecord, TableStat};
pub use doctor::DoctorRecord;
pub use drug::DrugRecord;
pub use exam_session::{EditRequestRecord, ExamSessionRecord};
pub use medical::{AbnormalityRecord, MedicineRecord, PrescriptionRecord};
pub use message::{ConversationRecord, MessageRecord};
pub use news::NewsRecord;
pub use physical_fitness::PhysicalFitnessRecord;
