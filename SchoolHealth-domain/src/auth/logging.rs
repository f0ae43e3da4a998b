//! Audit trail for sign-ins, token checks and refused requests.
//!
//! Every event becomes one `info` record on the `auth_audit` target, so it
//! can be filtered with `RUST_LOG=auth_audit=info`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEventType {
    Login,
    FailedLogin,
    Registration,
    Logout,
    TokenRevocation,
    TokenValidation,
    AccessDenied,
}

impl AuthEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Login => "LOGIN",
            Self::FailedLogin => "FAILED_LOGIN",
            Self::Registration => "REGISTRATION",
            Self::Logout => "LOGOUT",
            Self::TokenRevocation => "TOKEN_REVOCATION",
            Self::TokenValidation => "TOKEN_VALIDATION",
            Self::AccessDenied => "ACCESS_DENIED",
        }
    }
}

impl fmt::Display for AuthEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthEvent {
    pub kind: AuthEventType,
    /// Account id, or the login that was attempted
    pub subject: Option<String>,
    pub at: DateTime<Utc>,
    pub success: bool,
    pub details: Option<String>,
    /// Request path
    pub path: Option<String>,
    pub elapsed_ms: Option<u64>,
    /// `password`, `jwt` or `rbac`
    pub method: Option<&'static str>,
}

impl AuthEvent {
    pub fn new(kind: AuthEventType, subject: Option<&str>, success: bool) -> Self {
        Self {
            kind,
            subject: subject.map(str::to_string),
            at: Utc::now(),
            success,
            details: None,
            path: None,
            elapsed_ms: None,
            method: None,
        }
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn elapsed_ms(mut self, elapsed_ms: u64) -> Self {
        self.elapsed_ms = Some(elapsed_ms);
        self
    }

    pub fn method(mut self, method: &'static str) -> Self {
        self.method = Some(method);
        self
    }

    pub fn outcome(&self) -> &'static str {
        if self.success {
            "success"
        } else {
            "failure"
        }
    }

    pub fn record(&self) {
        info!(
            target: "auth_audit",
            event = %self.kind,
            subject = self.subject.as_deref().unwrap_or("anonymous"),
            outcome = self.outcome(),
            at = %self.at.to_rfc3339(),
            path = self.path.as_deref(),
            elapsed_ms = self.elapsed_ms,
            method = self.method,
            "{}",
            self.details.as_deref().unwrap_or("")
        );
    }
}

pub fn log_successful_login(user_id: &str, role: &str) {
    AuthEvent::new(AuthEventType::Login, Some(user_id), true)
        .details(format!("role={}", role))
        .method("password")
        .record();
}

pub fn log_failed_login(login: &str, reason: &str) {
    AuthEvent::new(AuthEventType::FailedLogin, Some(login), false)
        .details(reason)
        .method("password")
        .record();
}

pub fn log_registration(user_id: &str, role: &str) {
    AuthEvent::new(AuthEventType::Registration, Some(user_id), true).details(format!("role={}", role)).record();
}

pub fn log_logout(user_id: &str, jti: &str) {
    AuthEvent::new(AuthEventType::Logout, Some(user_id), true).record();
    AuthEvent::new(AuthEventType::TokenRevocation, Some(user_id), true).details(format!("jti={}", jti)).record();
}

pub fn log_access_denied(user_id: Option<&str>, path: &str, reason: impl Into<String>) {
    AuthEvent::new(AuthEventType::AccessDenied, user_id, false).path(path).details(reason).method("rbac").record();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_fills_optional_fields() {
        let event = AuthEvent::new(AuthEventType::Login, Some("doc-1"), true)
            .details("role=doctor")
            .path("/api/doctor/login")
            .elapsed_ms(150)
            .method("password");

        assert_eq!(event.kind, AuthEventType::Login);
        assert_eq!(event.subject.as_deref(), Some("doc-1"));
        assert_eq!(event.outcome(), "success");
        assert_eq!(event.path.as_deref(), Some("/api/doctor/login"));
        assert_eq!(event.elapsed_ms, Some(150));
        assert_eq!(event.method, Some("password"));
    }

    #[test]
    fn test_kinds_serialize_in_upper_snake_case() {
        assert_eq!(serde_json::to_string(&AuthEventType::FailedLogin).unwrap(), "\"FAILED_LOGIN\"");
        assert_eq!(AuthEventType::AccessDenied.to_string(), "ACCESS_DENIED");
    }
}
