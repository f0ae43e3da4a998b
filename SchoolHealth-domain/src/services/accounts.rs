use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::{AccountFilter, AccountRecord};
use school_health_data::repository::AccountRepositoryTrait;

use crate::auth::password::{hash_password, verify_password};
use crate::entities::account::{
    AccountRole, ChangePasswordRequest, CreateStudentRequest, Student, StudentExportRow, StudentFilter,
    StudentImportSummary, UpdateProfileRequest,
};
use crate::entities::conversions;
use crate::entities::normalize_cohort;
use crate::errors::{invalid, ServiceError};
use crate::tabular::{self, TabularRow};

/// Password given to imported students whose row leaves it blank
pub const DEFAULT_IMPORT_PASSWORD: &str = "12345678";

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Student and user accounts
pub struct AccountService {
    repository: Arc<dyn AccountRepositoryTrait + Send + Sync>,
}

impl AccountService {
    pub fn new(repository: Arc<dyn AccountRepositoryTrait + Send + Sync>) -> Self {
        Self { repository }
    }

    async fn load(&self, id: &str) -> Result<AccountRecord, ServiceError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Account {} not found", id)))
    }

    pub async fn add_student(&self, request: CreateStudentRequest) -> Result<Student, ServiceError> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        let student_id = request.student_id.trim().to_string();

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email {} is already in use", email)));
        }
        if self.repository.find_by_student_id(&student_id).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Student id {} is already in use", student_id)));
        }

        let now = Utc::now();
        let record = AccountRecord {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email,
            password_hash: hash_password(&request.password)?,
            image: non_empty(request.image),
            address_line1: request.address.line1,
            address_line2: request.address.line2,
            gender: non_empty(request.gender),
            dob: non_empty(request.dob),
            phone: non_empty(request.phone),
            role: AccountRole::Student.as_str().to_string(),
            cohort: Some(normalize_cohort(&request.cohort)),
            student_id: Some(student_id),
            major: Some(request.major.trim().to_string()),
            about: non_empty(request.about),
            created_at: now,
            updated_at: now,
        };

        self.repository.create(&record).await?;
        info!("Added student {} ({:?})", record.id, record.student_id);
        conversions::convert_to_domain_student(record)
    }

    /// Students ordered by name
    pub async fn list_students(&self, filter: &StudentFilter) -> Result<Vec<Student>, ServiceError> {
        let filter = AccountFilter {
            role: Some(AccountRole::Student.as_str().to_string()),
            cohort: filter.cohort.as_deref().map(normalize_cohort).filter(|c| !c.is_empty()),
            major: filter.major.clone().map(|m| m.trim().to_string()).filter(|m| !m.is_empty()),
        };

        self.repository
            .list(&filter)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_student)
            .collect()
    }

    pub async fn delete_student(&self, id: &str) -> Result<(), ServiceError> {
        self.load(id).await?;
        self.repository.delete(id).await?;
        info!("Deleted student {}", id);
        Ok(())
    }

    /// Import students from an uploaded sheet, skipping duplicates and unusable rows
    pub async fn import_students(&self, file_name: &str, bytes: &[u8]) -> Result<StudentImportSummary, ServiceError> {
        let rows = tabular::read_rows(file_name, bytes)?;
        let mut summary = StudentImportSummary { total_rows: rows.len(), ..Default::default() };

        let mut seen_emails = HashSet::new();
        let mut seen_student_ids = HashSet::new();
        let mut default_hash: Option<String> = None;
        let mut records = Vec::new();

        for row in &rows {
            let (Some(name), Some(email)) = (row.get("name"), row.get("email")) else {
                debug!("Skipping row {}: name or email missing", row.line());
                summary.skipped_invalid += 1;
                continue;
            };
            let email = email.to_lowercase();
            let student_id = row.get("studentId").map(|s| s.trim_matches('"').to_string());

            let duplicate_in_file = !seen_emails.insert(email.clone())
                || student_id.as_ref().map(|s| !seen_student_ids.insert(s.clone())).unwrap_or(false);
            let duplicate_in_db = self.repository.find_by_email(&email).await?.is_some()
                || match &student_id {
                    Some(s) => self.repository.find_by_student_id(s).await?.is_some(),
                    None => false,
                };
            if duplicate_in_file || duplicate_in_db {
                debug!("Skipping row {}: duplicate {}", row.line(), email);
                summary.skipped_duplicates += 1;
                continue;
            }

            let password_hash = match row.get("password") {
                Some(password) => hash_password(password)?,
                None => match &default_hash {
                    Some(hash) => hash.clone(),
                    None => {
                        let hash = hash_password(DEFAULT_IMPORT_PASSWORD)?;
                        default_hash = Some(hash.clone());
                        hash
                    }
                },
            };

            records.push(self.imported_record(row, name, email, student_id, password_hash));
        }

        summary.imported = self.repository.create_many(&records).await?;
        info!(
            "Student import: {} rows, {} imported, {} duplicates, {} invalid",
            summary.total_rows, summary.imported, summary.skipped_duplicates, summary.skipped_invalid
        );
        Ok(summary)
    }

    fn imported_record(
        &self,
        row: &TabularRow,
        name: &str,
        email: String,
        student_id: Option<String>,
        password_hash: String,
    ) -> AccountRecord {
        let now = Utc::now();
        AccountRecord {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email,
            password_hash,
            image: None,
            address_line1: row.text("address_line1"),
            address_line2: row.text("address_line2"),
            gender: row.get("gender").map(str::to_string),
            dob: row.get("dob").map(str::to_string),
            phone: row.get("phone").map(str::to_string),
            role: AccountRole::Student.as_str().to_string(),
            cohort: row.get("cohort").map(normalize_cohort),
            student_id,
            major: row.get("major").map(str::to_string),
            about: row.get("about").map(str::to_string),
            created_at: now,
            updated_at: now,
        }
    }

    /// CSV export of the filtered student list
    pub async fn export_students(&self, filter: &StudentFilter) -> Result<Vec<u8>, ServiceError> {
        let students = self.list_students(filter).await?;
        let rows: Vec<StudentExportRow> = students.iter().map(StudentExportRow::from).collect();
        tabular::write_csv(&rows)
    }

    pub async fn profile(&self, id: &str) -> Result<Student, ServiceError> {
        conversions::convert_to_domain_student(self.load(id).await?)
    }

    pub async fn update_profile(&self, id: &str, request: UpdateProfileRequest) -> Result<Student, ServiceError> {
        request.validate()?;
        let mut record = self.load(id).await?;

        if let Some(name) = request.name {
            record.name = name.trim().to_string();
        }
        if let Some(address) = request.address {
            record.address_line1 = address.line1;
            record.address_line2 = address.line2;
        }
        if request.phone.is_some() {
            record.phone = non_empty(request.phone);
        }
        if request.dob.is_some() {
            record.dob = non_empty(request.dob);
        }
        if request.gender.is_some() {
            record.gender = non_empty(request.gender);
        }
        if request.about.is_some() {
            record.about = non_empty(request.about);
        }
        if request.image.is_some() {
            record.image = non_empty(request.image);
        }
        record.updated_at = Utc::now();

        self.repository.update(&record).await?;
        conversions::convert_to_domain_student(record)
    }

    pub async fn change_password(&self, id: &str, request: ChangePasswordRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let record = self.load(id).await?;

        if !verify_password(&request.current_password, &record.password_hash) {
            return Err(invalid("current_password: Current password is incorrect"));
        }

        self.repository.update_password(id, &hash_password(&request.new_password)?).await?;
        info!("Password changed for account {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::AccountRepository;

    fn service() -> AccountService {
        let pool = create_in_memory_pool().unwrap();
        AccountService::new(Arc::new(AccountRepository::new(pool)))
    }

    fn request(email: &str, student_id: &str) -> CreateStudentRequest {
        CreateStudentRequest {
            name: "Nguyen An".to_string(),
            email: email.to_string(),
            password: "password1".to_string(),
            cohort: "k47".to_string(),
            student_id: student_id.to_string(),
            major: "IT".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_student_normalizes_and_rejects_duplicates() {
        let service = service();
        let student = service.add_student(request("an@school.edu", "SV001")).await.unwrap();
        assert_eq!(student.cohort.as_deref(), Some("K47"));
        assert_eq!(student.role, AccountRole::Student);

        let err = service.add_student(request("AN@school.edu", "SV002")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err = service.add_student(request("other@school.edu", "SV001")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let mut bad = request("bad", "SV003");
        bad.password = "short".to_string();
        assert!(matches!(service.add_student(bad).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_filters_by_normalized_cohort() {
        let service = service();
        service.add_student(request("a@school.edu", "SV001")).await.unwrap();
        let mut other = request("b@school.edu", "SV002");
        other.cohort = "K48".to_string();
        service.add_student(other).await.unwrap();

        let filter = StudentFilter { cohort: Some("k47".to_string()), major: None };
        let students = service.list_students(&filter).await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].student_id.as_deref(), Some("SV001"));

        let all = service.list_students(&StudentFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn test_delete_missing_student_is_not_found() {
        let service = service();
        assert!(matches!(service.delete_student("missing").await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_import_skips_duplicates_and_invalid_rows() {
        let service = service();
        service.add_student(request("existing@school.edu", "SV001")).await.unwrap();

        let csv = "name,email,password,cohort,studentId,major\n\
                   Binh,binh@school.edu,,k47,SV010,IT\n\
                   Chi,existing@school.edu,,k47,SV011,IT\n\
                   Dung,dung@school.edu,,k47,SV010,IT\n\
                   ,nobody@school.edu,,k47,SV012,IT\n";

        let summary = service.import_students("students.csv", csv.as_bytes()).await.unwrap();
        assert_eq!(
            summary,
            StudentImportSummary { total_rows: 4, imported: 1, skipped_duplicates: 2, skipped_invalid: 1 }
        );

        let imported = service
            .list_students(&StudentFilter::default())
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.email == "binh@school.edu")
            .unwrap();
        assert_eq!(imported.cohort.as_deref(), Some("K47"));
    }

    #[tokio::test]
    async fn test_export_has_header_and_rows() {
        let service = service();
        service.add_student(request("an@school.edu", "SV001")).await.unwrap();

        let bytes = service.export_students(&StudentFilter::default()).await.unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("name,email,studentId"));
        assert!(lines.next().unwrap().contains("SV001"));
    }

    #[tokio::test]
    async fn test_profile_update_and_password_change() {
        let service = service();
        let student = service.add_student(request("an@school.edu", "SV001")).await.unwrap();

        let updated = service
            .update_profile(
                &student.id,
                UpdateProfileRequest { phone: Some("0901234567".to_string()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.phone.as_deref(), Some("0901234567"));
        assert_eq!(updated.name, "Nguyen An");

        let wrong = ChangePasswordRequest {
            current_password: "not-it".to_string(),
            new_password: "password2".to_string(),
        };
        assert!(service.change_password(&student.id, wrong).await.is_err());

        let right = ChangePasswordRequest {
            current_password: "password1".to_string(),
            new_password: "password2".to_string(),
        };
        service.change_password(&student.id, right).await.unwrap();
    }
}
