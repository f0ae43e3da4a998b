use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::{AbnormalityRecord, PrescriptionRecord};
use school_health_data::repository::{AbnormalityRepositoryTrait, DrugRepositoryTrait, PrescriptionRepositoryTrait};

use crate::entities::conversions;
use crate::entities::medical::{Abnormality, CreateAbnormalityRequest, CreatePrescriptionRequest, Prescription};
use crate::errors::{invalid, ServiceError};

/// Abnormalities found during exams and the prescriptions written for them
pub struct MedicalService {
    abnormalities: Arc<dyn AbnormalityRepositoryTrait + Send + Sync>,
    prescriptions: Arc<dyn PrescriptionRepositoryTrait + Send + Sync>,
    drugs: Arc<dyn DrugRepositoryTrait + Send + Sync>,
}

impl MedicalService {
    pub fn new(
        abnormalities: Arc<dyn AbnormalityRepositoryTrait + Send + Sync>,
        prescriptions: Arc<dyn PrescriptionRepositoryTrait + Send + Sync>,
        drugs: Arc<dyn DrugRepositoryTrait + Send + Sync>,
    ) -> Self {
        Self { abnormalities, prescriptions, drugs }
    }

    pub async fn create_abnormality(&self, request: CreateAbnormalityRequest) -> Result<Abnormality, ServiceError> {
        request.validate()?;

        let symptoms: Vec<String> = request
            .symptoms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if symptoms.is_empty() {
            return Err(invalid("symptoms: At least one symptom is required"));
        }

        let record = AbnormalityRecord {
            id: Uuid::new_v4().to_string(),
            student_id: request.student_id.trim().to_string(),
            student_name: request.student_name.trim().to_string(),
            doctor_name: request.doctor_name.trim().to_string(),
            date: request.date,
            symptoms,
            temporary_treatment: request.temporary_treatment.trim().to_string(),
            created_at: Utc::now(),
        };

        self.abnormalities.create(&record).await?;
        info!("Recorded abnormality {} for student {}", record.id, record.student_id);
        Ok(conversions::convert_to_domain_abnormality(record))
    }

    /// Newest exam date first
    pub async fn list_abnormalities(&self) -> Result<Vec<Abnormality>, ServiceError> {
        Ok(self
            .abnormalities
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_abnormality)
            .collect())
    }

    pub async fn abnormalities_for_student(&self, student_id: &str) -> Result<Vec<Abnormality>, ServiceError> {
        Ok(self
            .abnormalities
            .list_by_student(student_id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_abnormality)
            .collect())
    }

    pub async fn latest_abnormalities(&self, limit: usize) -> Result<Vec<Abnormality>, ServiceError> {
        Ok(self
            .abnormalities
            .latest(limit)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_abnormality)
            .collect())
    }

    pub async fn delete_abnormality(&self, id: &str) -> Result<(), ServiceError> {
        self.abnormalities.delete(id).await?;
        info!("Deleted abnormality {}", id);
        Ok(())
    }

    pub async fn count_abnormalities(&self) -> Result<i64, ServiceError> {
        Ok(self.abnormalities.count().await?)
    }

    /// Add a prescription; the abnormality and every drug must exist
    pub async fn add_prescription(&self, request: CreatePrescriptionRequest) -> Result<Prescription, ServiceError> {
        request.validate()?;

        for (index, medicine) in request.medicines.iter().enumerate() {
            let blank = [&medicine.drug_id, &medicine.dosage, &medicine.frequency, &medicine.duration]
                .iter()
                .any(|v| v.trim().is_empty());
            if blank {
                return Err(invalid(format!(
                    "medicines[{}]: drug_id, dosage, frequency and duration are required",
                    index
                )));
            }
        }

        if self.abnormalities.find_by_id(&request.abnormality_id).await?.is_none() {
            return Err(ServiceError::NotFound(format!("Abnormality {} not found", request.abnormality_id)));
        }
        for medicine in &request.medicines {
            if self.drugs.find_by_id(&medicine.drug_id).await?.is_none() {
                return Err(invalid(format!("Drug {} does not exist", medicine.drug_id)));
            }
        }

        let record = PrescriptionRecord {
            id: Uuid::new_v4().to_string(),
            abnormality_id: request.abnormality_id,
            student_id: request.student_id.trim().to_string(),
            doctor_name: request.doctor_name.trim().to_string(),
            prescription_date: request.prescription_date,
            diagnosis: request.diagnosis.trim().to_string(),
            notes: request.notes.filter(|n| !n.trim().is_empty()),
            medicines: request.medicines.iter().map(conversions::convert_to_data_medicine).collect(),
            created_at: Utc::now(),
        };

        self.prescriptions.create(&record).await?;
        info!("Added prescription {} for abnormality {}", record.id, record.abnormality_id);
        conversions::convert_to_domain_prescription(record)
    }

    /// Newest prescription date first
    pub async fn prescriptions_for_student(&self, student_id: &str) -> Result<Vec<Prescription>, ServiceError> {
        self.prescriptions
            .list_by_student(student_id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_prescription)
            .collect()
    }

    pub async fn prescriptions_for_abnormality(&self, abnormality_id: &str) -> Result<Vec<Prescription>, ServiceError> {
        self.prescriptions
            .list_by_abnormality(abnormality_id)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_prescription)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::medical::{MealTiming, Medicine};
    use chrono::NaiveDate;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::models::DrugRecord;
    use school_health_data::repository::{AbnormalityRepository, DrugRepository, PrescriptionRepository};

    struct Fixture {
        service: MedicalService,
        drugs: Arc<DrugRepository>,
    }

    fn fixture() -> Fixture {
        let pool = create_in_memory_pool().unwrap();
        let drugs = Arc::new(DrugRepository::new(pool.clone()));
        let service = MedicalService::new(
            Arc::new(AbnormalityRepository::new(pool.clone())),
            Arc::new(PrescriptionRepository::new(pool)),
            drugs.clone(),
        );
        Fixture { service, drugs }
    }

    fn abnormality(student_id: &str, day: u32) -> CreateAbnormalityRequest {
        CreateAbnormalityRequest {
            student_id: student_id.to_string(),
            student_name: "Nguyen An".to_string(),
            doctor_name: "Dr. Minh".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 3, day).unwrap(),
            symptoms: vec!["fever".to_string(), " ".to_string()],
            temporary_treatment: "rest".to_string(),
        }
    }

    fn medicine(drug_id: &str) -> Medicine {
        Medicine {
            drug_id: drug_id.to_string(),
            dosage: "1 tablet".to_string(),
            frequency: "twice a day".to_string(),
            duration: "3 days".to_string(),
            instructions: None,
            meal_timing: MealTiming::default(),
        }
    }

    fn prescription(abnormality_id: &str, drug_id: &str) -> CreatePrescriptionRequest {
        CreatePrescriptionRequest {
            abnormality_id: abnormality_id.to_string(),
            student_id: "SV001".to_string(),
            doctor_name: "Dr. Minh".to_string(),
            prescription_date: NaiveDate::from_ymd_opt(2025, 3, 2).unwrap(),
            diagnosis: "Flu".to_string(),
            notes: None,
            medicines: vec![medicine(drug_id)],
        }
    }

    async fn stock_drug(drugs: &DrugRepository) -> String {
        let record = DrugRecord {
            id: Uuid::new_v4().to_string(),
            image: None,
            name: "Paracetamol".to_string(),
            code: "PARA500".to_string(),
            drug_type: "tablet".to_string(),
            unit: "box".to_string(),
            inventory_quantity: 20,
            expiry_date: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap(),
            supplier_name: String::new(),
            notes: String::new(),
            created_at: Utc::now(),
        };
        drugs.create(&record).await.unwrap();
        record.id
    }

    #[tokio::test]
    async fn test_abnormalities_list_newest_first() {
        let f = fixture();
        let created = f.service.create_abnormality(abnormality("SV001", 1)).await.unwrap();
        assert_eq!(created.symptoms, vec!["fever".to_string()]);
        f.service.create_abnormality(abnormality("SV001", 5)).await.unwrap();
        f.service.create_abnormality(abnormality("SV002", 3)).await.unwrap();

        let for_student = f.service.abnormalities_for_student("SV001").await.unwrap();
        assert_eq!(for_student.len(), 2);
        assert_eq!(for_student[0].date.to_string(), "2025-03-05");

        assert_eq!(f.service.count_abnormalities().await.unwrap(), 3);
        f.service.delete_abnormality(&created.id).await.unwrap();
        assert!(matches!(f.service.delete_abnormality(&created.id).await, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_symptoms_rejected() {
        let f = fixture();
        let mut request = abnormality("SV001", 1);
        request.symptoms = vec!["  ".to_string()];
        assert!(matches!(f.service.create_abnormality(request).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_prescription_requires_existing_drugs() {
        let f = fixture();
        let abnormality = f.service.create_abnormality(abnormality("SV001", 1)).await.unwrap();
        let drug_id = stock_drug(&f.drugs).await;

        let err = f.service.add_prescription(prescription(&abnormality.id, "no-such-drug")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = f.service.add_prescription(prescription("missing", &drug_id)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));

        let created = f.service.add_prescription(prescription(&abnormality.id, &drug_id)).await.unwrap();
        assert_eq!(created.medicines[0].meal_timing, MealTiming::After);

        assert_eq!(f.service.prescriptions_for_student("SV001").await.unwrap().len(), 1);
        assert_eq!(f.service.prescriptions_for_abnormality(&abnormality.id).await.unwrap().len(), 1);
    }
}
