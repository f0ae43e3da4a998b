use std::env;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use school_health_data::models::AccountRecord;
use school_health_data::repository::{AccountRepositoryTrait, DoctorRepositoryTrait};

use crate::auth::logging::{log_failed_login, log_logout, log_registration, log_successful_login};
use crate::auth::password::{constant_time_eq, hash_password, verify_password};
use crate::auth::token::{self, SecurityError, TokenSubject};
use crate::auth::{Claims, LoginRequest, LoginResponse, Role, UserInfo};
use crate::entities::account::{AccountRole, RegisterRequest};
use crate::errors::ServiceError;

/// Credentials of the single built-in admin
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub email: String,
    pub password: String,
}

impl AdminCredentials {
    /// Read `ADMIN_EMAIL` and `ADMIN_PASSWORD`; `None` disables admin login
    pub fn from_env() -> Option<Self> {
        match (env::var("ADMIN_EMAIL"), env::var("ADMIN_PASSWORD")) {
            (Ok(email), Ok(password)) if !email.is_empty() && !password.is_empty() => Some(Self { email, password }),
            _ => {
                warn!("ADMIN_EMAIL or ADMIN_PASSWORD not set; admin login is disabled");
                None
            }
        }
    }
}

impl From<SecurityError> for ServiceError {
    fn from(err: SecurityError) -> Self {
        match err {
            SecurityError::TokenExpired | SecurityError::TokenRevoked | SecurityError::InvalidToken => {
                ServiceError::Unauthorized(err.to_string())
            }
            other => ServiceError::Internal(other.to_string()),
        }
    }
}

/// Login, registration and logout for every role
pub struct AuthService {
    accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
    doctors: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
    admin: Option<AdminCredentials>,
}

impl AuthService {
    pub fn new(
        accounts: Arc<dyn AccountRepositoryTrait + Send + Sync>,
        doctors: Arc<dyn DoctorRepositoryTrait + Send + Sync>,
        admin: Option<AdminCredentials>,
    ) -> Self {
        Self { accounts, doctors, admin }
    }

    fn issue(&self, subject: TokenSubject) -> Result<LoginResponse, ServiceError> {
        let (access_token, claims) = token::generate_token(&subject)?;
        log_successful_login(&claims.sub, claims.role.as_str());

        Ok(LoginResponse {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: claims.exp - claims.iat,
            user: UserInfo::from(&claims),
        })
    }

    fn rejected(&self, login: &str, reason: &str) -> ServiceError {
        log_failed_login(login, reason);
        ServiceError::Unauthorized("Invalid credentials".to_string())
    }

    pub async fn admin_login(&self, request: &LoginRequest) -> Result<LoginResponse, ServiceError> {
        let Some(admin) = &self.admin else {
            return Err(self.rejected(&request.email, "admin login disabled"));
        };

        let email_ok = constant_time_eq(request.email.trim().as_bytes(), admin.email.as_bytes());
        let password_ok = constant_time_eq(request.password.as_bytes(), admin.password.as_bytes());
        if !(email_ok && password_ok) {
            return Err(self.rejected(&request.email, "bad admin credentials"));
        }

        self.issue(TokenSubject {
            id: "admin".to_string(),
            role: Role::Admin,
            email: admin.email.clone(),
            student_id: None,
        })
    }

    pub async fn doctor_login(&self, request: &LoginRequest) -> Result<LoginResponse, ServiceError> {
        let doctor = match self.doctors.find_by_email(request.email.trim()).await? {
            Some(doctor) => doctor,
            None => return Err(self.rejected(&request.email, "unknown doctor")),
        };

        if !verify_password(&request.password, &doctor.password_hash) {
            return Err(self.rejected(&request.email, "wrong password"));
        }

        self.issue(TokenSubject {
            id: doctor.id,
            role: Role::Doctor,
            email: doctor.email,
            student_id: None,
        })
    }

    /// Student or plain user login; `role` in the request narrows the match
    pub async fn user_login(&self, request: &LoginRequest) -> Result<LoginResponse, ServiceError> {
        let account = match self.accounts.find_by_email(request.email.trim()).await? {
            Some(account) => account,
            None => return Err(self.rejected(&request.email, "unknown account")),
        };

        let role = match account.role.as_str() {
            "student" => Role::Student,
            _ => Role::User,
        };
        if let Some(wanted) = request.role {
            if wanted != role {
                return Err(self.rejected(&request.email, "role mismatch"));
            }
        }

        if !verify_password(&request.password, &account.password_hash) {
            return Err(self.rejected(&request.email, "wrong password"));
        }

        self.issue(TokenSubject {
            id: account.id,
            role,
            email: account.email,
            student_id: account.student_id,
        })
    }

    /// Self-service sign-up. Always creates a plain `user`; student accounts come from admin add or import.
    pub async fn register(&self, request: RegisterRequest) -> Result<LoginResponse, ServiceError> {
        request.validate()?;

        let email = request.email.trim().to_lowercase();
        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::Conflict(format!("Email {} is already registered", email)));
        }

        let now = Utc::now();
        let record = AccountRecord {
            id: Uuid::new_v4().to_string(),
            name: request.name.trim().to_string(),
            email,
            password_hash: hash_password(&request.password)?,
            image: None,
            address_line1: String::new(),
            address_line2: String::new(),
            gender: None,
            dob: None,
            phone: None,
            role: AccountRole::User.as_str().to_string(),
            cohort: None,
            student_id: None,
            major: None,
            about: None,
            created_at: now,
            updated_at: now,
        };
        self.accounts.create(&record).await?;
        log_registration(&record.id, AccountRole::User.as_str());
        info!("Registered user account {}", record.id);

        self.issue(TokenSubject { id: record.id, role: Role::User, email: record.email, student_id: None })
    }

    /// Revoke the token behind `claims` until it would have expired anyway
    pub fn logout(&self, claims: &Claims) {
        token::revoke_token(claims);
        log_logout(&claims.sub, &claims.jti);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::doctor::CreateDoctorRequest;
    use crate::services::doctors::DoctorService;
    use school_health_data::database::create_in_memory_pool;
    use school_health_data::repository::{AccountRepository, DoctorRepository};

    fn setup() -> (AuthService, DoctorService) {
        env::set_var("JWT_SECRET", "test_secret_key_for_testing_only");
        let pool = create_in_memory_pool().unwrap();
        let accounts = Arc::new(AccountRepository::new(pool.clone()));
        let doctors = Arc::new(DoctorRepository::new(pool));
        let admin = AdminCredentials {
            email: "admin@school.edu".to_string(),
            password: "admin-pass".to_string(),
        };
        (
            AuthService::new(accounts, doctors.clone(), Some(admin)),
            DoctorService::new(doctors),
        )
    }

    fn login(email: &str, password: &str) -> LoginRequest {
        LoginRequest { email: email.to_string(), password: password.to_string(), role: None }
    }

    #[tokio::test]
    async fn test_admin_login() {
        let (auth, _) = setup();

        let response = auth.admin_login(&login("admin@school.edu", "admin-pass")).await.unwrap();
        assert_eq!(response.user.role, Role::Admin);
        assert_eq!(response.token_type, "Bearer");
        assert!(token::validate_token(&response.access_token).is_ok());

        let err = auth.admin_login(&login("admin@school.edu", "nope")).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_doctor_login_checks_password() {
        let (auth, doctors) = setup();
        doctors
            .add_doctor(CreateDoctorRequest {
                name: "Dr. Lan".to_string(),
                email: "lan@school.edu".to_string(),
                password: "doctor-pass".to_string(),
                speciality: "General".to_string(),
                degree: "MD".to_string(),
                experience: "5 years".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let response = auth.doctor_login(&login("lan@school.edu", "doctor-pass")).await.unwrap();
        assert_eq!(response.user.role, Role::Doctor);

        assert!(auth.doctor_login(&login("lan@school.edu", "wrong-pass")).await.is_err());
        assert!(auth.doctor_login(&login("ghost@school.edu", "doctor-pass")).await.is_err());
    }

    #[tokio::test]
    async fn test_register_then_login_with_role_filter() {
        let (auth, _) = setup();
        let registered = auth
            .register(RegisterRequest {
                name: "An".to_string(),
                email: "An@School.edu".to_string(),
                password: "password1".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(registered.user.role, Role::User);
        assert_eq!(registered.user.student_id, None);

        let mut request = login("an@school.edu", "password1");
        request.role = Some(Role::User);
        assert!(auth.user_login(&request).await.is_ok());

        request.role = Some(Role::Student);
        assert!(matches!(auth.user_login(&request).await, Err(ServiceError::Unauthorized(_))));

        let duplicate = auth
            .register(RegisterRequest {
                name: "An again".to_string(),
                email: "an@school.edu".to_string(),
                password: "password1".to_string(),
            })
            .await;
        assert!(matches!(duplicate, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_registration_cannot_claim_a_student_id() {
        let (auth, _) = setup();
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "name": "Mallory",
            "email": "mallory@school.edu",
            "password": "password1",
            "role": "student",
            "student_id": "SV999"
        }))
        .unwrap();

        let registered = auth.register(request).await.unwrap();
        assert_eq!(registered.user.role, Role::User);
        assert_eq!(registered.user.student_id, None);
        assert!(!registered.user.can_read_student("SV999"));
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let (auth, _) = setup();
        let response = auth.admin_login(&login("admin@school.edu", "admin-pass")).await.unwrap();
        let claims = token::validate_token(&response.access_token).unwrap();

        auth.logout(&claims);
        assert!(matches!(
            token::validate_token(&response.access_token),
            Err(SecurityError::TokenRevoked)
        ));
    }
}
