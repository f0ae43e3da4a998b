use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::DoctorRecord;
use school_health_data::repository::DoctorRepositoryTrait;

use crate::auth::password::hash_password;
use crate::entities::conversions;
use crate::entities::doctor::{CreateDoctorRequest, Doctor, UpdateDoctorProfileRequest};
use crate::errors::ServiceError;

/// Doctor accounts and their public listing
pub struct DoctorService {
    repository: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
}

impl DoctorService {
    pub fn new(repository: Arc<dyn DoctorRepositoryTrait + Send + Sync>) -> Self {
        Self { repository }
    }

    async fn load(&self, id: &str) -> Result<DoctorRecord, ServiceError> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Doctor {} not found", id)))
    }

    pub async fn add_doctor(&self, request: CreateDoctorRequest) -> Result<Doctor, ServiceError> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email {} is already in use", email)));
        }

        let record = DoctorRecord {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email,
            password_hash: hash_password(&request.password)?,
            image: request.image.filter(|i| !i.is_empty()),
            speciality: request.speciality.trim().to_string(),
            degree: request.degree.trim().to_string(),
            experience: request.experience.trim().to_string(),
            about: request.about,
            fees: request.fees,
            address_line1: request.address.line1,
            address_line2: request.address.line2,
            available: true,
            created_at: Utc::now(),
        };

        self.repository.create(&record).await?;
        info!("Added doctor {}", record.id);
        Ok(conversions::convert_to_domain_doctor(record))
    }

    /// All doctors, or only the available ones for the public listing
    pub async fn list_doctors(&self, only_available: bool) -> Result<Vec<Doctor>, ServiceError> {
        Ok(self
            .repository
            .list(only_available)
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_doctor)
            .collect())
    }

    pub async fn delete_doctor(&self, id: &str) -> Result<(), ServiceError> {
        self.load(id).await?;
        self.repository.delete(id).await?;
        info!("Deleted doctor {}", id);
        Ok(())
    }

    /// Flip the doctor's availability
    pub async fn toggle_availability(&self, id: &str) -> Result<Doctor, ServiceError> {
        let mut record = self.load(id).await?;
        record.available = !record.available;
        self.repository.update(&record).await?;
        info!("Doctor {} availability set to {}", id, record.available);
        Ok(conversions::convert_to_domain_doctor(record))
    }

    pub async fn profile(&self, id: &str) -> Result<Doctor, ServiceError> {
        Ok(conversions::convert_to_domain_doctor(self.load(id).await?))
    }

    pub async fn update_profile(&self, id: &str, request: UpdateDoctorProfileRequest) -> Result<Doctor, ServiceError> {
        request.validate()?;
        let mut record = self.load(id).await?;

        if let Some(fees) = request.fees {
            record.fees = fees;
        }
        if let Some(address) = request.address {
            record.address_line1 = address.line1;
            record.address_line2 = address.line2;
        }
        if let Some(available) = request.available {
            record.available = available;
        }
        if let Some(about) = request.about {
            record.about = about;
        }

        self.repository.update(&record).await?;
        Ok(conversions::convert_to_domain_doctor(record))
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        Ok(self.repository.count().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::DoctorRepository;

    fn service() -> DoctorService {
        DoctorService::new(Arc::new(DoctorRepository::new(create_in_memory_pool().unwrap())))
    }

    fn request(email: &str) -> CreateDoctorRequest {
        CreateDoctorRequest {
            name: "Dr. Minh".to_string(),
            email: email.to_string(),
            password: "doctor-pass".to_string(),
            speciality: "Pediatrics".to_string(),
            degree: "MD".to_string(),
            experience: "3 years".to_string(),
            fees: 50.0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_add_and_duplicate_email() {
        let service = service();
        let doctor = service.add_doctor(request("minh@school.edu")).await.unwrap();
        assert!(doctor.available);

        let err = service.add_doctor(request("Minh@School.edu")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_toggle_availability_hides_from_public_list() {
        let service = service();
        let doctor = service.add_doctor(request("minh@school.edu")).await.unwrap();
        assert_eq!(service.list_doctors(true).await.unwrap().len(), 1);

        let toggled = service.toggle_availability(&doctor.id).await.unwrap();
        assert!(!toggled.available);
        assert!(service.list_doctors(true).await.unwrap().is_empty());
        assert_eq!(service.list_doctors(false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_profile_and_delete() {
        let service = service();
        let doctor = service.add_doctor(request("minh@school.edu")).await.unwrap();

        let updated = service
            .update_profile(
                &doctor.id,
                UpdateDoctorProfileRequest { fees: Some(80.0), about: Some("School clinic".to_string()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.fees, 80.0);
        assert_eq!(updated.about, "School clinic");

        service.delete_doctor(&doctor.id).await.unwrap();
        assert!(matches!(service.profile(&doctor.id).await, Err(ServiceError::NotFound(_))));
    }
}
