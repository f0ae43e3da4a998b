use school_health_data::models;

use crate::entities::account::{AccountRole, Student};
use crate::entities::backup::{Backup, BackupStatus, BackupType, CollectionStat};
use crate::entities::chat::Message;
use crate::entities::doctor::Doctor;
use crate::entities::drug::Drug;
use crate::entities::exam_session::{EditRequest, EditRequestStatus, ExamSession};
use crate::entities::medical::{Abnormality, MealTiming, Medicine, Prescription};
use crate::entities::news::News;
use crate::entities::physical_fitness::{BmiRating, HeightRating, PhysicalFitness, VitalRating, WeightRating};
use crate::entities::Address;
use crate::errors::ServiceError;

/// Conversion functions between domain entities and storage models.
/// They follow the pattern convert_to_[target_layer]_[model_name].
///
/// Text codes read back from storage are parsed strictly; an unknown code
/// means the row was written by something other than this service.
fn parse_code<T>(value: &str, field: &str, parse: fn(&str) -> Option<T>) -> Result<T, ServiceError> {
    parse(value).ok_or_else(|| ServiceError::Internal(format!("Unknown {} stored: {}", field, value)))
}

fn parse_optional_code<T>(
    value: &Option<String>,
    field: &str,
    parse: fn(&str) -> Option<T>,
) -> Result<Option<T>, ServiceError> {
    value.as_deref().map(|v| parse_code(v, field, parse)).transpose()
}

fn code_of<T: std::fmt::Display>(value: &Option<T>) -> Option<String> {
    value.as_ref().map(|v| v.to_string())
}

pub fn convert_to_domain_student(record: models::AccountRecord) -> Result<Student, ServiceError> {
    Ok(Student {
        role: parse_code(&record.role, "account role", AccountRole::parse)?,
        id: record.id,
        name: record.name,
        email: record.email,
        image: record.image,
        address: Address { line1: record.address_line1, line2: record.address_line2 },
        gender: record.gender,
        dob: record.dob,
        phone: record.phone,
        cohort: record.cohort,
        student_id: record.student_id,
        major: record.major,
        about: record.about,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

pub fn convert_to_domain_doctor(record: models::DoctorRecord) -> Doctor {
    Doctor {
        id: record.id,
        name: record.name,
        email: record.email,
        image: record.image,
        speciality: record.speciality,
        degree: record.degree,
        experience: record.experience,
        about: record.about,
        fees: record.fees,
        address: Address { line1: record.address_line1, line2: record.address_line2 },
        available: record.available,
        created_at: record.created_at,
    }
}

pub fn convert_to_domain_fitness(record: models::PhysicalFitnessRecord) -> Result<PhysicalFitness, ServiceError> {
    Ok(PhysicalFitness {
        height_rating: parse_optional_code(&record.height_rating, "height rating", HeightRating::parse)?,
        weight_rating: parse_optional_code(&record.weight_rating, "weight rating", WeightRating::parse)?,
        bmi_rating: parse_optional_code(&record.bmi_rating, "bmi rating", BmiRating::parse)?,
        blood_pressure_rating: parse_optional_code(
            &record.blood_pressure_rating,
            "blood pressure rating",
            VitalRating::parse,
        )?,
        heart_rate_rating: parse_optional_code(&record.heart_rate_rating, "heart rate rating", VitalRating::parse)?,
        id: record.id,
        exam_session_id: record.exam_session_id,
        student_id: record.student_id,
        cohort: record.cohort,
        gender: record.gender,
        follow_date: record.follow_date,
        height: record.height,
        weight: record.weight,
        z_score_height: record.z_score_height,
        z_score_weight: record.z_score_weight,
        z_score_weight_height: record.z_score_weight_height,
        bmi: record.bmi,
        systolic: record.systolic,
        diastolic: record.diastolic,
        heart_rate: record.heart_rate,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

pub fn convert_to_data_fitness(fitness: &PhysicalFitness) -> models::PhysicalFitnessRecord {
    models::PhysicalFitnessRecord {
        id: fitness.id.clone(),
        exam_session_id: fitness.exam_session_id.clone(),
        student_id: fitness.student_id.clone(),
        cohort: fitness.cohort.clone(),
        gender: fitness.gender.clone(),
        follow_date: fitness.follow_date.clone(),
        height: fitness.height,
        weight: fitness.weight,
        z_score_height: fitness.z_score_height,
        height_rating: code_of(&fitness.height_rating),
        z_score_weight: fitness.z_score_weight,
        weight_rating: code_of(&fitness.weight_rating),
        z_score_weight_height: fitness.z_score_weight_height,
        bmi: fitness.bmi,
        bmi_rating: code_of(&fitness.bmi_rating),
        systolic: fitness.systolic,
        diastolic: fitness.diastolic,
        blood_pressure_rating: code_of(&fitness.blood_pressure_rating),
        heart_rate: fitness.heart_rate,
        heart_rate_rating: code_of(&fitness.heart_rate_rating),
        created_at: fitness.created_at,
        updated_at: fitness.updated_at,
    }
}

pub fn convert_to_domain_abnormality(record: models::AbnormalityRecord) -> Abnormality {
    Abnormality {
        id: record.id,
        student_id: record.student_id,
        student_name: record.student_name,
        doctor_name: record.doctor_name,
        date: record.date,
        symptoms: record.symptoms,
        temporary_treatment: record.temporary_treatment,
        created_at: record.created_at,
    }
}

pub fn convert_to_domain_prescription(record: models::PrescriptionRecord) -> Result<Prescription, ServiceError> {
    let medicines = record
        .medicines
        .into_iter()
        .map(|m| {
            Ok(Medicine {
                meal_timing: parse_code(&m.meal_timing, "meal timing", MealTiming::parse)?,
                drug_id: m.drug_id,
                dosage: m.dosage,
                frequency: m.frequency,
                duration: m.duration,
                instructions: m.instructions,
            })
        })
        .collect::<Result<Vec<_>, ServiceError>>()?;

    Ok(Prescription {
        id: record.id,
        abnormality_id: record.abnormality_id,
        student_id: record.student_id,
        doctor_name: record.doctor_name,
        prescription_date: record.prescription_date,
        diagnosis: record.diagnosis,
        notes: record.notes,
        medicines,
        created_at: record.created_at,
    })
}

pub fn convert_to_data_medicine(medicine: &Medicine) -> models::MedicineRecord {
    models::MedicineRecord {
        drug_id: medicine.drug_id.clone(),
        dosage: medicine.dosage.clone(),
        frequency: medicine.frequency.clone(),
        duration: medicine.duration.clone(),
        instructions: medicine.instructions.clone(),
        meal_timing: medicine.meal_timing.to_string(),
    }
}

pub fn convert_to_domain_drug(record: models::DrugRecord) -> Drug {
    Drug {
        id: record.id,
        image: record.image,
        name: record.name,
        code: record.code,
        drug_type: record.drug_type,
        unit: record.unit,
        inventory_quantity: record.inventory_quantity,
        expiry_date: record.expiry_date,
        supplier_name: record.supplier_name,
        notes: record.notes,
        created_at: record.created_at,
    }
}

pub fn convert_to_domain_news(record: models::NewsRecord) -> News {
    News {
        id: record.id,
        title: record.title,
        category: record.category,
        date: record.date,
        content: record.content,
        file: record.file,
        created_at: record.created_at,
    }
}

pub fn convert_to_domain_exam_session(record: models::ExamSessionRecord) -> ExamSession {
    ExamSession {
        id: record.id,
        name: record.name,
        date: record.date,
        academic_year: record.academic_year,
        description: record.description,
        created_by: record.created_by,
        created_at: record.created_at,
        is_locked: record.is_locked,
        lock_reason: record.lock_reason,
        locked_at: record.locked_at,
        locked_by: record.locked_by,
    }
}

pub fn convert_to_domain_edit_request(record: models::EditRequestRecord) -> Result<EditRequest, ServiceError> {
    Ok(EditRequest {
        status: parse_code(&record.status, "edit request status", EditRequestStatus::parse)?,
        id: record.id,
        exam_session_id: record.exam_session_id,
        requested_by: record.requested_by,
        requested_by_name: record.requested_by_name,
        reason: record.reason,
        specific_students: record.specific_students,
        expected_completion_time: record.expected_completion_time,
        reviewed_by: record.reviewed_by,
        admin_response: record.admin_response,
        reviewed_at: record.reviewed_at,
        temp_unlock_until: record.temp_unlock_until,
        is_auto_locked: record.is_auto_locked,
        created_at: record.created_at,
        updated_at: record.updated_at,
    })
}

pub fn convert_to_domain_message(record: models::MessageRecord) -> Message {
    Message {
        id: record.id,
        conversation_id: record.conversation_id,
        sender_id: record.sender_id,
        receiver_id: record.receiver_id,
        content: record.content,
        created_at: record.created_at,
    }
}

pub fn convert_to_domain_backup(record: models::BackupRecord) -> Result<Backup, ServiceError> {
    Ok(Backup {
        backup_type: parse_code(&record.backup_type, "backup type", BackupType::parse)?,
        status: parse_code(&record.status, "backup status", BackupStatus::parse)?,
        collections: record
            .collections
            .into_iter()
            .map(|c| CollectionStat { name: c.name, row_count: c.row_count })
            .collect(),
        backup_id: record.backup_id,
        name: record.name,
        size: record.size,
        created_by: record.created_by,
        file_path: record.file_path,
        checksum: record.checksum,
        start_time: record.start_time,
        end_time: record.end_time,
        duration_ms: record.duration_ms,
        error_message: record.error_message,
        auto_delete_at: record.auto_delete_at,
        is_verified: record.is_verified,
        retention_days: record.retention_days,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(role: &str) -> models::AccountRecord {
        models::AccountRecord {
            id: "a1".to_string(),
            name: "Lan".to_string(),
            email: "lan@school.edu".to_string(),
            password_hash: "hash".to_string(),
            image: None,
            address_line1: "1 Main St".to_string(),
            address_line2: String::new(),
            gender: Some("Female".to_string()),
            dob: None,
            phone: None,
            role: role.to_string(),
            cohort: Some("K47".to_string()),
            student_id: Some("SV001".to_string()),
            major: Some("Biology".to_string()),
            about: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_student_conversion_drops_password_hash() {
        let student = convert_to_domain_student(record("student")).unwrap();
        assert_eq!(student.role, AccountRole::Student);
        assert_eq!(student.address.line1, "1 Main St");

        let json = serde_json::to_value(&student).unwrap();
        assert!(json.get("password_hash").is_none());
    }

    #[test]
    fn test_unknown_stored_code_is_internal_error() {
        let err = convert_to_domain_student(record("superuser")).unwrap_err();
        assert!(matches!(err, ServiceError::Internal(_)));
    }
}
