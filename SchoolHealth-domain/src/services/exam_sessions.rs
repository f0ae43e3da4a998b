//! Exam sessions and the lock / edit-request workflow
//!
//! A locked session rejects fitness writes from doctors. A doctor may ask
//! for edit access; an admin approval grants a temporary unlock that lasts
//! until `temp_unlock_until`. A background sweeper closes lapsed unlocks.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::{EditRequestRecord, ExamSessionRecord};
use school_health_data::repository::{
    EditRequestRepositoryTrait, ExamSessionRepositoryTrait, PhysicalFitnessRepositoryTrait,
};

use crate::auth::Role;
use crate::entities::conversions;
use crate::entities::exam_session::{
    CreateEditRequest, CreateExamSessionRequest, EditPermission, EditRequest, EditRequestStatus, ExamSession,
    ExamSessionOverview, ReviewAction, ReviewEditRequest, ToggleLockRequest, DEFAULT_UNLOCK_HOURS, MAX_UNLOCK_HOURS,
};
use crate::errors::{invalid, ServiceError};

pub struct ExamSessionService {
    sessions: Arc<dyn ExamSessionRepositoryTrait + Send + Sync>,
    requests: Arc<dyn EditRequestRepositoryTrait + Send + Sync>,
    fitness: Arc<dyn PhysicalFitnessRepositoryTrait + Send + Sync>,
}

impl ExamSessionService {
    pub fn new(
        sessions: Arc<dyn ExamSessionRepositoryTrait + Send + Sync>,
        requests: Arc<dyn EditRequestRepositoryTrait + Send + Sync>,
        fitness: Arc<dyn PhysicalFitnessRepositoryTrait + Send + Sync>,
    ) -> Self {
        Self { sessions, requests, fitness }
    }

    async fn load(&self, id: &str) -> Result<ExamSessionRecord, ServiceError> {
        self.sessions
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Exam session {} not found", id)))
    }

    async fn load_request(&self, id: &str) -> Result<EditRequestRecord, ServiceError> {
        self.requests
            .find_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Edit request {} not found", id)))
    }

    pub async fn create_session(
        &self,
        request: CreateExamSessionRequest,
        created_by: &str,
    ) -> Result<ExamSession, ServiceError> {
        request.validate()?;

        let record = ExamSessionRecord {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            date: request.date,
            academic_year: request.academic_year.filter(|y| !y.trim().is_empty()),
            description: request.description.filter(|d| !d.trim().is_empty()),
            created_by: Some(created_by.to_string()),
            created_at: Utc::now(),
            is_locked: false,
            lock_reason: None,
            locked_at: None,
            locked_by: None,
        };

        self.sessions.create(&record).await?;
        info!("Created exam session {} ({})", record.id, record.name);
        Ok(conversions::convert_to_domain_exam_session(record))
    }

    /// Newest first
    pub async fn list_sessions(&self) -> Result<Vec<ExamSession>, ServiceError> {
        Ok(self
            .sessions
            .list()
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_exam_session)
            .collect())
    }

    pub async fn get_session(&self, id: &str) -> Result<ExamSession, ServiceError> {
        Ok(conversions::convert_to_domain_exam_session(self.load(id).await?))
    }

    /// Every session with its record count and pending request count
    pub async fn overview(&self) -> Result<Vec<ExamSessionOverview>, ServiceError> {
        let records = self.fitness.count_by_session().await?;
        let pending = self.requests.count_pending_by_session().await?;

        Ok(self
            .list_sessions()
            .await?
            .into_iter()
            .map(|session| ExamSessionOverview {
                record_count: records.get(&session.id).copied().unwrap_or(0),
                pending_requests: pending.get(&session.id).copied().unwrap_or(0),
                session,
            })
            .collect())
    }

    pub async fn toggle_lock(
        &self,
        id: &str,
        request: ToggleLockRequest,
        admin_id: &str,
    ) -> Result<ExamSession, ServiceError> {
        let mut record = self.load(id).await?;

        if request.is_locked {
            let reason = request
                .lock_reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .ok_or_else(|| invalid("lock_reason: A reason is required to lock a session"))?;
            record.is_locked = true;
            record.lock_reason = Some(reason);
            record.locked_at = Some(Utc::now());
            record.locked_by = Some(admin_id.to_string());
        } else {
            record.is_locked = false;
            record.lock_reason = None;
            record.locked_at = None;
            record.locked_by = None;
        }

        self.sessions.update_lock(&record).await?;
        info!("Exam session {} locked={} by {}", id, record.is_locked, admin_id);
        Ok(conversions::convert_to_domain_exam_session(record))
    }

    /// Whether `user_id` may change data of the session right now
    pub async fn edit_permission(&self, session_id: &str, user_id: &str, role: Role) -> Result<EditPermission, ServiceError> {
        let session = self.load(session_id).await?;

        let mut permission = EditPermission {
            can_edit: !session.is_locked || role == Role::Admin,
            is_locked: session.is_locked,
            lock_reason: session.lock_reason.clone(),
            temp_unlock_until: None,
        };

        if session.is_locked && role == Role::Doctor {
            if let Some(active) = self.requests.find_active_unlock(session_id, user_id, Utc::now()).await? {
                permission.can_edit = true;
                permission.temp_unlock_until = active.temp_unlock_until;
            }
        }

        Ok(permission)
    }

    /// Fail with `Locked` unless the caller may edit the session
    pub async fn ensure_can_edit(&self, session_id: &str, user_id: &str, role: Role) -> Result<(), ServiceError> {
        let permission = self.edit_permission(session_id, user_id, role).await?;
        if permission.can_edit {
            Ok(())
        } else {
            Err(ServiceError::Locked(
                permission.lock_reason.unwrap_or_else(|| "Session is locked".to_string()),
            ))
        }
    }

    pub async fn request_edit_access(
        &self,
        request: CreateEditRequest,
        doctor_id: &str,
        doctor_name: &str,
    ) -> Result<EditRequest, ServiceError> {
        request.validate()?;

        let session = self.load(&request.exam_session_id).await?;
        if !session.is_locked {
            return Err(invalid("Exam session is not locked"));
        }
        if self.requests.has_pending(&session.id, doctor_id).await? {
            return Err(ServiceError::Conflict("A pending request already exists for this session".to_string()));
        }
        if self.requests.find_active_unlock(&session.id, doctor_id, Utc::now()).await?.is_some() {
            return Err(ServiceError::Conflict("You already have edit access to this session".to_string()));
        }

        let now = Utc::now();
        let record = EditRequestRecord {
            id: Uuid::new_v4().to_string(),
            exam_session_id: session.id,
            requested_by: doctor_id.to_string(),
            requested_by_name: doctor_name.to_string(),
            reason: request.reason.trim().to_string(),
            specific_students: request.specific_students,
            expected_completion_time: request.expected_completion_time,
            status: EditRequestStatus::Pending.as_str().to_string(),
            reviewed_by: None,
            admin_response: None,
            reviewed_at: None,
            temp_unlock_until: None,
            is_auto_locked: false,
            created_at: now,
            updated_at: now,
        };

        self.requests.create(&record).await?;
        info!("Doctor {} requested edit access to session {}", doctor_id, record.exam_session_id);
        conversions::convert_to_domain_edit_request(record)
    }

    /// Requests newest first, optionally narrowed to one doctor and one status
    pub async fn list_requests(
        &self,
        requested_by: Option<&str>,
        status: Option<EditRequestStatus>,
    ) -> Result<Vec<EditRequest>, ServiceError> {
        self.requests
            .list(requested_by, status.as_ref().map(|s| s.as_str()))
            .await?
            .into_iter()
            .map(conversions::convert_to_domain_edit_request)
            .collect()
    }

    /// Owners may withdraw their own pending requests
    pub async fn cancel_request(&self, id: &str, doctor_id: &str) -> Result<EditRequest, ServiceError> {
        let mut record = self.load_request(id).await?;

        if record.requested_by != doctor_id {
            return Err(ServiceError::Forbidden("Only the requester can cancel this request".to_string()));
        }
        if record.status != EditRequestStatus::Pending.as_str() {
            return Err(invalid("Only pending requests can be cancelled"));
        }

        record.status = EditRequestStatus::Cancelled.as_str().to_string();
        record.updated_at = Utc::now();
        self.requests.update(&record).await?;
        conversions::convert_to_domain_edit_request(record)
    }

    /// Approve or reject a pending request
    pub async fn handle_request(
        &self,
        id: &str,
        review: ReviewEditRequest,
        admin_id: &str,
    ) -> Result<EditRequest, ServiceError> {
        let mut record = self.load_request(id).await?;
        if record.status != EditRequestStatus::Pending.as_str() {
            return Err(invalid("Only pending requests can be handled"));
        }

        let now = Utc::now();
        match review.action {
            ReviewAction::Approve => {
                let hours = review.temp_unlock_hours.unwrap_or(DEFAULT_UNLOCK_HOURS);
                if !(1..=MAX_UNLOCK_HOURS).contains(&hours) {
                    return Err(invalid(format!(
                        "temp_unlock_hours: Must be between 1 and {} hours",
                        MAX_UNLOCK_HOURS
                    )));
                }
                record.status = EditRequestStatus::Approved.as_str().to_string();
                record.temp_unlock_until = Some(now + Duration::hours(hours));
            }
            ReviewAction::Reject => {
                record.status = EditRequestStatus::Rejected.as_str().to_string();
            }
        }
        record.reviewed_by = Some(admin_id.to_string());
        record.reviewed_at = Some(now);
        record.admin_response = review.admin_response.filter(|r| !r.trim().is_empty());
        record.updated_at = now;

        self.requests.update(&record).await?;
        info!("Edit request {} {} by {}", id, record.status, admin_id);
        conversions::convert_to_domain_edit_request(record)
    }

    /// End an approved unlock early
    pub async fn revoke_request(&self, id: &str, admin_id: &str) -> Result<EditRequest, ServiceError> {
        let mut record = self.load_request(id).await?;
        let now = Utc::now();

        let active = record.status == EditRequestStatus::Approved.as_str()
            && record.temp_unlock_until.map(|until| until > now).unwrap_or(false);
        if !active {
            return Err(invalid("Only approved requests with an active unlock can be revoked"));
        }

        record.status = EditRequestStatus::Completed.as_str().to_string();
        record.temp_unlock_until = Some(now);
        record.updated_at = now;
        self.requests.update(&record).await?;
        info!("Edit request {} revoked by {}", id, admin_id);
        conversions::convert_to_domain_edit_request(record)
    }

    /// Close approved requests whose unlock has lapsed
    pub async fn expire_unlocks(&self) -> Result<usize, ServiceError> {
        Ok(self.requests.expire_unlocks(Utc::now()).await?)
    }

    pub async fn count(&self) -> Result<i64, ServiceError> {
        Ok(self.sessions.count().await?)
    }
}

/// Run [`ExamSessionService::expire_unlocks`] every `interval`
pub fn start_unlock_sweeper(service: Arc<ExamSessionService>, interval: StdDuration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match service.expire_unlocks().await {
                Ok(0) => {}
                Ok(expired) => info!("Auto-locked {} expired edit unlocks", expired),
                Err(e) => error!("Edit unlock sweep failed: {}", e),
            }
        }
    })
}

/// Sweep interval from `EDIT_UNLOCK_SWEEP_SECONDS`, default five minutes
pub fn sweep_interval_from_env() -> StdDuration {
    let seconds = std::env::var("EDIT_UNLOCK_SWEEP_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or_else(|| {
            warn!("EDIT_UNLOCK_SWEEP_SECONDS not set or invalid, using 300");
            300
        });
    StdDuration::from_secs(seconds)
}
