use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use school_health_data::repository::{AccountRepositoryTrait, PhysicalFitnessRepositoryTrait};

use crate::auth::Role;
use crate::entities::conversions;
use crate::entities::normalize_cohort;
use crate::entities::physical_fitness::{
    DuplicateRow, FitnessDifferences, FitnessExportRow, FitnessImportSummary, FitnessStatus, HealthScores,
    PhysicalFitness, SaveFitnessRequest, SessionComparison, StudentSession,
};
use crate::entities::{round2, InvalidRow};
use crate::errors::{invalid, ServiceError};
use crate::services::assessment::{self, Measurements};
use crate::services::exam_sessions::ExamSessionService;
use crate::tabular::{self, TabularRow};

const MAX_HEIGHT_CM: f64 = 300.0;
const MAX_WEIGHT_KG: f64 = 500.0;
const MAX_SYSTOLIC: f64 = 300.0;
const MAX_DIASTOLIC: f64 = 250.0;
const MAX_HEART_RATE: f64 = 300.0;

fn check_range(field: &str, value: Option<f64>, max: f64) -> Result<(), ServiceError> {
    match value {
        Some(v) if v <= 0.0 || v > max => Err(invalid(format!("{}: Must be greater than 0 and at most {}", field, max))),
        _ => Ok(()),
    }
}

fn is_male(gender: &str) -> bool {
    matches!(gender.trim().to_lowercase().as_str(), "male" | "nam" | "m")
}

fn is_female(gender: &str) -> bool {
    matches!(gender.trim().to_lowercase().as_str(), "female" | "nữ" | "nu" | "f")
}

fn difference(first: Option<f64>, second: Option<f64>) -> Option<f64> {
    Some(round2(second? - first?))
}

/// Build a full record from raw measurements, deriving every assessment field
fn assessed_record(
    exam_session_id: String,
    student_id: String,
    cohort: Option<String>,
    gender: Option<String>,
    follow_date: String,
    measurements: Measurements,
) -> PhysicalFitness {
    let a = assessment::assess(&measurements);
    let now = Utc::now();

    PhysicalFitness {
        id: Uuid::new_v4().to_string(),
        exam_session_id,
        student_id,
        cohort,
        gender,
        follow_date,
        height: measurements.height,
        weight: measurements.weight,
        z_score_height: a.z_score_height,
        height_rating: a.height_rating,
        z_score_weight: a.z_score_weight,
        weight_rating: a.weight_rating,
        z_score_weight_height: a.z_score_weight_height,
        bmi: a.bmi,
        bmi_rating: a.bmi_rating,
        systolic: measurements.systolic,
        diastolic: measurements.diastolic,
        blood_pressure_rating: a.blood_pressure_rating,
        heart_rate: measurements.heart_rate,
        heart_rate_rating: a.heart_rate_rating,
        created_at: now,
        updated_at: now,
    }
}

/// Physical-fitness measurements and the student-facing reads built on them
pub struct PhysicalFitnessService {
    repository: Arc<dyn PhysicalFitnessRepositoryTrait + Send + Sync>,
    accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
    sessions: Arc<ExamSessionService>,
}

impl PhysicalFitnessService {
    pub fn new(
        repository: Arc<dyn PhysicalFitnessRepositoryTrait + Send + Sync>,
        accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
        sessions: Arc<ExamSessionService>,
    ) -> Self {
        Self { repository, accounts, sessions }
    }

    /// Cohort and gender from the request, falling back to the student's account
    async fn profile_fields(
        &self,
        student_id: &str,
        cohort: Option<String>,
        gender: Option<String>,
    ) -> Result<(Option<String>, Option<String>), ServiceError> {
        let cohort = cohort.map(|c| normalize_cohort(&c)).filter(|c| !c.is_empty());
        let gender = gender.map(|g| g.trim().to_string()).filter(|g| !g.is_empty());
        if cohort.is_some() && gender.is_some() {
            return Ok((cohort, gender));
        }

        let account = self.accounts.find_by_student_id(student_id).await?;
        Ok((
            cohort.or_else(|| account.as_ref().and_then(|a| a.cohort.clone())),
            gender.or_else(|| account.and_then(|a| a.gender)),
        ))
    }

    /// Insert or update the measurement for (student, follow date, session)
    pub async fn save(&self, request: SaveFitnessRequest, user_id: &str, role: Role) -> Result<PhysicalFitness, ServiceError> {
        request.validate()?;
        check_range("height", request.height, MAX_HEIGHT_CM)?;
        check_range("weight", request.weight, MAX_WEIGHT_KG)?;
        check_range("systolic", request.systolic, MAX_SYSTOLIC)?;
        check_range("diastolic", request.diastolic, MAX_DIASTOLIC)?;
        check_range("heart_rate", request.heart_rate, MAX_HEART_RATE)?;

        self.sessions.ensure_can_edit(&request.exam_session_id, user_id, role).await?;

        let student_id = request.student_id.trim().to_string();
        let (cohort, gender) = self.profile_fields(&student_id, request.cohort, request.gender).await?;

        let record = assessed_record(
            request.exam_session_id,
            student_id,
            cohort,
            gender,
            request.follow_date.trim().to_string(),
            Measurements {
                height: request.height,
                weight: request.weight,
                systolic: request.systolic,
                diastolic: request.diastolic,
                heart_rate: request.heart_rate,
            },
        );

        let stored = self.repository.upsert(&conversions::convert_to_data_fitness(&record)).await?;
        info!("Saved fitness record {} for student {}", stored.id, stored.student_id);
        conversions::convert_to_domain_fitness(stored)
    }

    pub async fn list(&self, exam_session_id: Option<&str>) -> Result<Vec<PhysicalFitness>, ServiceError> {
        self.repository
            .list(exam_session_id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_fitness)
            .collect()
    }

    pub async fn status(&self, exam_session_id: Option<&str>) -> Result<FitnessStatus, ServiceError> {
        let records = self.list(exam_session_id).await?;
        let mut status = FitnessStatus { total: records.len(), ..Default::default() };
        let mut bmi_stats = BTreeMap::new();

        for record in &records {
            if record.height.is_some() && record.weight.is_some() {
                status.measured += 1;
            }
            if let Some(rating) = record.bmi_rating {
                *bmi_stats.entry(rating.to_string()).or_insert(0) += 1;
            }
            match record.gender.as_deref() {
                Some(g) if is_male(g) => status.male += 1,
                Some(g) if is_female(g) => status.female += 1,
                _ => {}
            }
        }

        status.bmi_stats = bmi_stats;
        Ok(status)
    }

    /// Import a session's measurements from a sheet.
    ///
    /// Every row must carry studentId, height and weight; otherwise nothing
    /// is written and the unusable rows are reported.
    pub async fn import(
        &self,
        exam_session_id: &str,
        file_name: &str,
        bytes: &[u8],
        user_id: &str,
        role: Role,
    ) -> Result<FitnessImportSummary, ServiceError> {
        if exam_session_id.trim().is_empty() {
            return Err(invalid("exam_session_id: Exam session is required"));
        }
        self.sessions.ensure_can_edit(exam_session_id, user_id, role).await?;

        let rows = tabular::read_rows(file_name, bytes)?;
        let invalid_rows: Vec<InvalidRow> = rows.iter().filter_map(missing_fields).collect();
        if !invalid_rows.is_empty() {
            return Err(ServiceError::InvalidImport {
                message: format!("{} rows are missing required values", invalid_rows.len()),
                invalid_rows,
            });
        }

        let mut existing = self.repository.student_ids_in_session(exam_session_id).await?;
        let mut summary = FitnessImportSummary { total_rows: rows.len(), valid_rows: rows.len(), ..Default::default() };
        let mut records = Vec::new();

        for row in &rows {
            let student_id = row.text("studentId").trim_matches('"').trim().to_string();
            if !existing.insert(student_id.clone()) {
                debug!("Row {}: student {} already measured in session", row.line(), student_id);
                summary.duplicates.push(DuplicateRow { row: row.line(), student_id });
                continue;
            }

            let (cohort, gender) = self
                .profile_fields(&student_id, row.get("cohort").map(str::to_string), row.get("gender").map(str::to_string))
                .await?;

            let record = assessed_record(
                exam_session_id.to_string(),
                student_id,
                cohort,
                gender,
                row.text("followDate"),
                Measurements {
                    height: row.number("height"),
                    weight: row.number("weight"),
                    systolic: row.number("systolic"),
                    diastolic: row.number("diastolic"),
                    heart_rate: row.number("heartRate"),
                },
            );
            records.push(conversions::convert_to_data_fitness(&record));
        }

        summary.duplicate_count = summary.duplicates.len();
        summary.skipped_count = summary.duplicate_count;
        summary.inserted_count = self.repository.insert_many(&records).await?;
        info!(
            "Fitness import into {}: {} rows, {} inserted, {} duplicates",
            exam_session_id, summary.total_rows, summary.inserted_count, summary.duplicate_count
        );
        Ok(summary)
    }

    /// CSV of records including the derived fields
    pub async fn export(&self, exam_session_id: Option<&str>) -> Result<Vec<u8>, ServiceError> {
        let records = self.list(exam_session_id).await?;
        let rows: Vec<FitnessExportRow> = records.iter().map(FitnessExportRow::from).collect();
        tabular::write_csv(&rows)
    }

    /// A student's records, newest first
    pub async fn student_records(
        &self,
        student_id: &str,
        exam_session_id: Option<&str>,
    ) -> Result<Vec<PhysicalFitness>, ServiceError> {
        let records: Vec<PhysicalFitness> = self
            .repository
            .list_by_student(student_id, exam_session_id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_fitness)
            .collect::<Result<_, _>>()?;

        if records.is_empty() {
            return Err(ServiceError::NotFound(format!("No physical records for student {}", student_id)));
        }
        Ok(records)
    }

    /// Distinct exam sessions the student has records in, newest record first
    pub async fn student_sessions(&self, student_id: &str) -> Result<Vec<StudentSession>, ServiceError> {
        let records = self.repository.list_by_student(student_id, None).await?;
        let mut seen = HashSet::new();
        let mut sessions = Vec::new();

        for record in records {
            if !seen.insert(record.exam_session_id.clone()) {
                continue;
            }
            match self.sessions.get_session(&record.exam_session_id).await {
                Ok(session) => sessions.push(StudentSession {
                    exam_session_id: session.id,
                    name: session.name,
                    date: session.date,
                    academic_year: session.academic_year,
                }),
                Err(ServiceError::NotFound(_)) => debug!("Session {} no longer exists", record.exam_session_id),
                Err(e) => return Err(e),
            }
        }

        Ok(sessions)
    }

    /// Compare a student's latest record in two sessions
    pub async fn compare(&self, student_id: &str, first_session: &str, second_session: &str) -> Result<SessionComparison, ServiceError> {
        let first = self.latest_in(student_id, first_session).await?;
        let second = self.latest_in(student_id, second_session).await?;

        let differences = FitnessDifferences {
            height: difference(first.height, second.height),
            weight: difference(first.weight, second.weight),
            bmi: difference(first.bmi, second.bmi),
            systolic: difference(first.systolic, second.systolic),
            diastolic: difference(first.diastolic, second.diastolic),
            heart_rate: difference(first.heart_rate, second.heart_rate),
        };

        Ok(SessionComparison { first, second, differences })
    }

    async fn latest_in(&self, student_id: &str, exam_session_id: &str) -> Result<PhysicalFitness, ServiceError> {
        let mut records = self.student_records(student_id, Some(exam_session_id)).await?;
        Ok(records.remove(0))
    }

    /// Scores from the student's latest record; zeros when there is none
    pub async fn health_scores(&self, student_id: &str) -> Result<HealthScores, ServiceError> {
        let latest = self
            .repository
            .list_by_student(student_id, None)
            .await?
            .into_iter()
            .next()
            .map(conversions::convert_to_domain_fitness)
            .transpose()?;

        Ok(assessment::health_scores(latest.as_ref()))
    }
}

/// The required columns a row is missing, if any
fn missing_fields(row: &TabularRow) -> Option<InvalidRow> {
    let mut missing = Vec::new();
    let student_id = row.get("studentId").map(|s| s.trim_matches('"').trim().to_string()).filter(|s| !s.is_empty());

    if student_id.is_none() {
        missing.push("studentId".to_string());
    }
    for column in ["height", "weight"] {
        if row.number(column).map(|v| v > 0.0) != Some(true) {
            missing.push(column.to_string());
        }
    }

    if missing.is_empty() {
        None
    } else {
        Some(InvalidRow { row: row.line(), missing_fields: missing, student_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::exam_session::{CreateExamSessionRequest, ToggleLockRequest};
    use crate::entities::physical_fitness::BmiRating;
    use chrono::NaiveDate;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::{
        AccountRepository, EditRequestRepository, ExamSessionRepository, PhysicalFitnessRepository,
    };

    struct Fixture {
        service: PhysicalFitnessService,
        sessions: Arc<ExamSessionService>,
    }

    fn fixture() -> Fixture {
        let pool = create_in_memory_pool().unwrap();
        let fitness = Arc::new(PhysicalFitnessRepository::new(pool.clone()));
        let sessions = Arc::new(ExamSessionService::new(
            Arc::new(ExamSessionRepository::new(pool.clone())),
            Arc::new(EditRequestRepository::new(pool.clone())),
            fitness.clone(),
        ));
        let service = PhysicalFitnessService::new(fitness, Arc::new(AccountRepository::new(pool)), sessions.clone());
        Fixture { service, sessions }
    }

    async fn session(sessions: &ExamSessionService, name: &str) -> String {
        sessions
            .create_session(
                CreateExamSessionRequest {
                    name: name.to_string(),
                    date: NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(),
                    academic_year: None,
                    description: None,
                },
                "admin",
            )
            .await
            .unwrap()
            .id
    }

    fn save_request(session_id: &str, student_id: &str, height: f64, weight: f64) -> SaveFitnessRequest {
        SaveFitnessRequest {
            exam_session_id: session_id.to_string(),
            student_id: student_id.to_string(),
            gender: Some("male".to_string()),
            follow_date: "2025-03-01".to_string(),
            height: Some(height),
            weight: Some(weight),
            systolic: Some(125.0),
            diastolic: Some(85.0),
            heart_rate: Some(72.0),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_save_derives_assessment_and_upserts() {
        let f = fixture();
        let session_id = session(&f.sessions, "Spring").await;

        let first = f.service.save(save_request(&session_id, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap();
        assert_eq!(first.bmi, Some(22.49));
        assert_eq!(first.bmi_rating, Some(BmiRating::Normal));

        let second = f.service.save(save_request(&session_id, "SV001", 171.0, 66.0), "doc1", Role::Doctor).await.unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(f.service.list(Some(&session_id)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_rejects_bad_input_and_locked_session() {
        let f = fixture();
        let session_id = session(&f.sessions, "Spring").await;

        let err = f.service.save(save_request(&session_id, "SV001", 0.0, 65.0), "doc1", Role::Doctor).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let zero_pulse = SaveFitnessRequest { heart_rate: Some(0.0), ..save_request(&session_id, "SV001", 170.0, 65.0) };
        let err = f.service.save(zero_pulse, "doc1", Role::Doctor).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let negative_pressure = SaveFitnessRequest { systolic: Some(-120.0), ..save_request(&session_id, "SV001", 170.0, 65.0) };
        let err = f.service.save(negative_pressure, "doc1", Role::Doctor).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = f.service.save(save_request("missing", "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        f.sessions
            .toggle_lock(&session_id, ToggleLockRequest { is_locked: true, lock_reason: Some("done".to_string()) }, "admin")
            .await
            .unwrap();
        let err = f.service.save(save_request(&session_id, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap_err();
        assert!(matches!(err, ServiceError::Locked(_)));
    }

    #[tokio::test]
    async fn test_import_rejects_sheet_with_missing_values() {
        let f = fixture();
        let session_id = session(&f.sessions, "Spring").await;

        let csv = "studentId,height,weight\nSV001,170,65\nSV002,,60\n";
        let err = f.service.import(&session_id, "fitness.csv", csv.as_bytes(), "doc1", Role::Doctor).await.unwrap_err();
        match err {
            ServiceError::InvalidImport { invalid_rows, .. } => {
                assert_eq!(invalid_rows.len(), 1);
                assert_eq!(invalid_rows[0].row, 3);
                assert_eq!(invalid_rows[0].missing_fields, vec!["height".to_string()]);
                assert_eq!(invalid_rows[0].student_id.as_deref(), Some("SV002"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert!(f.service.list(Some(&session_id)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_import_skips_students_already_measured() {
        let f = fixture();
        let session_id = session(&f.sessions, "Spring").await;
        f.service.save(save_request(&session_id, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap();

        let csv = "studentId,height,weight,gender\n\"SV001\",170,65,male\nSV002,160,50,female\nSV003,165,55,female\n";
        let summary = f.service.import(&session_id, "fitness.csv", csv.as_bytes(), "doc1", Role::Doctor).await.unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.inserted_count, 2);
        assert_eq!(summary.duplicate_count, 1);
        assert_eq!(summary.duplicates[0].student_id, "SV001");

        let status = f.service.status(Some(&session_id)).await.unwrap();
        assert_eq!(status.total, 3);
        assert_eq!(status.measured, 3);
        assert_eq!(status.male, 1);
        assert_eq!(status.female, 2);
    }

    #[tokio::test]
    async fn test_student_reads_and_comparison() {
        let f = fixture();
        let spring = session(&f.sessions, "Spring").await;
        let autumn = session(&f.sessions, "Autumn").await;
        f.service.save(save_request(&spring, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap();
        f.service.save(save_request(&autumn, "SV001", 172.0, 63.5), "doc1", Role::Doctor).await.unwrap();

        let sessions = f.service.student_sessions("SV001").await.unwrap();
        assert_eq!(sessions.len(), 2);

        let comparison = f.service.compare("SV001", &spring, &autumn).await.unwrap();
        assert_eq!(comparison.differences.height, Some(2.0));
        assert_eq!(comparison.differences.weight, Some(-1.5));

        assert!(matches!(f.service.student_records("SV999", None).await, Err(ServiceError::NotFound(_))));
        assert!(matches!(f.service.compare("SV001", &spring, "missing").await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_health_scores_default_to_zero() {
        let f = fixture();
        assert_eq!(f.service.health_scores("SV001").await.unwrap(), HealthScores::default());

        let session_id = session(&f.sessions, "Spring").await;
        f.service.save(save_request(&session_id, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap();
        let scores = f.service.health_scores("SV001").await.unwrap();
        assert!(scores.overall > 0);
    }

    #[tokio::test]
    async fn test_export_contains_derived_columns() {
        let f = fixture();
        let session_id = session(&f.sessions, "Spring").await;
        f.service.save(save_request(&session_id, "SV001", 170.0, 65.0), "doc1", Role::Doctor).await.unwrap();

        let text = String::from_utf8(f.service.export(Some(&session_id)).await.unwrap()).unwrap();
        assert!(text.lines().next().unwrap().contains("bmi_rating"));
        assert!(text.contains("SV001"));
    }
}
