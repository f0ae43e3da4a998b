//! Authentication and authorization for the SchoolHealth API
//!
//! Tokens are HS256 JWTs carried in a bearer header, a role-specific header
//! (`atoken`, `dtoken`, `token`) or a role-specific cookie (`aToken`,
//! `dToken`, `token`). [`auth_middleware`] validates them and puts a
//! [`UserInfo`] into request extensions for the handlers and for the role
//! checks in [`authorize`].

use serde::{Deserialize, Serialize};

#[cfg(feature = "with-api")]
use utoipa::ToSchema;

pub mod logging;
pub mod password;
pub mod token;
pub mod token_blacklist;

#[cfg(feature = "with-axum")]
pub mod authorize;

/// Caller role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Student,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Doctor => "doctor",
            Role::Student => "student",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "student" => Some(Role::Student),
            "user" => Some(Role::User),
            _ => None,
        }
    }

    /// Name of the cookie a login for this role sets
    pub fn cookie_name(&self) -> &'static str {
        match self {
            Role::Admin => "aToken",
            Role::Doctor => "dToken",
            Role::Student | Role::User => "token",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Authentication claims for JSON Web Tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct Claims {
    /// Account id, or `admin`
    pub sub: String,
    pub role: Role,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub student_id: Option<String>,
    /// Token id, the blacklist key
    pub jti: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Authenticated caller, placed in request extensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct UserInfo {
    pub user_id: String,
    pub role: Role,
    pub email: String,
    pub student_id: Option<String>,
    pub auth_source: String,
}

impl From<&Claims> for UserInfo {
    fn from(claims: &Claims) -> Self {
        Self {
            user_id: claims.sub.clone(),
            role: claims.role,
            email: claims.email.clone(),
            student_id: claims.student_id.clone(),
            auth_source: "jwt".to_string(),
        }
    }
}

impl UserInfo {
    /// Staff read any student; a student only their own records; plain users none
    pub fn can_read_student(&self, student_id: &str) -> bool {
        match self.role {
            Role::Admin | Role::Doctor => true,
            Role::Student => self.student_id.as_deref() == Some(student_id),
            Role::User => false,
        }
    }
}

/// Login request body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    /// Narrows a user login to `student` or `user` accounts
    pub role: Option<Role>,
}

/// Login response body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "with-api", derive(ToSchema))]
pub struct LoginResponse {
    pub access_token: String,
    /// Always `Bearer`
    pub token_type: String,
    /// Seconds until the token expires
    pub expires_in: i64,
    pub user: UserInfo,
}

/// `Set-Cookie` value carrying a fresh login token
pub fn login_cookie(role: Role, token: &str, max_age_secs: i64) -> String {
    format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        role.cookie_name(),
        token,
        max_age_secs
    )
}

/// `Set-Cookie` value clearing the role's login cookie
pub fn clear_cookie(role: Role) -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", role.cookie_name())
}

#[cfg(feature = "with-axum")]
mod middleware {
    use axum::{
        body::Body,
        extract::State,
        http::{HeaderMap, Request, StatusCode},
        middleware::Next,
        response::{IntoResponse, Response},
        Json,
    };
    use serde_json::json;
    use tracing::{debug, warn};

    use super::logging::{AuthEvent, AuthEventType};
    use super::token::{self, SecurityError};
    use super::UserInfo;

    /// Find the caller's token: bearer header, then role headers, then cookies
    pub fn extract_token(headers: &HeaderMap) -> Option<String> {
        if let Some(value) = headers.get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
            if let Some(token) = value.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }

        for name in ["atoken", "dtoken", "token"] {
            if let Some(value) = headers.get(name).and_then(|v| v.to_str().ok()) {
                if !value.trim().is_empty() {
                    return Some(value.trim().to_string());
                }
            }
        }

        let cookies: Vec<(String, String)> = headers
            .get_all(axum::http::header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect();

        ["aToken", "dToken", "token"].iter().find_map(|name| {
            cookies
                .iter()
                .find(|(k, v)| k == name && !v.is_empty())
                .map(|(_, v)| v.clone())
        })
    }

    fn unauthorized(message: &str) -> Response {
        (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "unauthorized", "message": message })),
        )
            .into_response()
    }

    /// Reject requests without a valid token; otherwise attach `UserInfo` and `Claims`
    pub async fn auth_middleware<S>(_state: State<S>, mut req: Request<Body>, next: Next) -> Response {
        let request_path = req.uri().path().to_string();
        let start_time = std::time::Instant::now();

        let failure = |details: &str| {
            AuthEvent::new(AuthEventType::TokenValidation, None, false)
                .details(details)
                .path(request_path.clone())
                .elapsed_ms(start_time.elapsed().as_millis() as u64)
                .method("jwt")
                .record();
        };

        let Some(token) = extract_token(req.headers()) else {
            debug!("No token on request to {}", request_path);
            failure("no token presented");
            return unauthorized("Not authorized, login again");
        };

        match token::validate_token(&token) {
            Ok(claims) => {
                AuthEvent::new(AuthEventType::TokenValidation, Some(&claims.sub), true)
                    .details(format!("role={}", claims.role))
                    .path(request_path.clone())
                    .elapsed_ms(start_time.elapsed().as_millis() as u64)
                    .method("jwt")
                    .record();

                req.extensions_mut().insert(UserInfo::from(&claims));
                req.extensions_mut().insert(claims);
                next.run(req).await
            }
            Err(SecurityError::TokenExpired) => {
                warn!("Expired token on {}", request_path);
                failure("expired");
                unauthorized("Token has expired, login again")
            }
            Err(SecurityError::TokenRevoked) => {
                warn!("Revoked token on {}", request_path);
                failure("revoked");
                unauthorized("Token has been revoked, login again")
            }
            Err(e) => {
                warn!("Token rejected on {}: {}", request_path, e);
                failure(&e.to_string());
                unauthorized("Invalid token")
            }
        }
    }
}

#[cfg(feature = "with-axum")]
pub use middleware::{auth_middleware, extract_token};

/// Apply CORS and security headers to the whole application
#[cfg(all(feature = "with-axum", feature = "with-web"))]
pub fn configure_security(app: axum::Router) -> axum::Router {
    use axum::http::{header, HeaderName, HeaderValue, Method};
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::set_header::SetResponseHeaderLayer;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::ACCEPT,
            HeaderName::from_static("atoken"),
            HeaderName::from_static("dtoken"),
            HeaderName::from_static("token"),
        ])
        .max_age(std::time::Duration::from_secs(3600));

    let security_headers = tower::ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("x-permitted-cross-domain-policies"),
            HeaderValue::from_static("none"),
        ));

    app.layer(cors).layer(security_headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "with-axum")]
    use axum::http::{HeaderMap, HeaderValue};

    #[cfg(feature = "with-axum")]
    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("token=cookie-token"));
        headers.insert("authorization", HeaderValue::from_static("Bearer header-token"));

        assert_eq!(extract_token(&headers).as_deref(), Some("header-token"));
    }

    #[cfg(feature = "with-axum")]
    #[test]
    fn test_role_header_and_cookie_fallbacks() {
        let mut headers = HeaderMap::new();
        headers.insert("dtoken", HeaderValue::from_static("doctor-token"));
        assert_eq!(extract_token(&headers).as_deref(), Some("doctor-token"));

        let mut headers = HeaderMap::new();
        headers.insert("cookie", HeaderValue::from_static("theme=dark; aToken=admin-token"));
        assert_eq!(extract_token(&headers).as_deref(), Some("admin-token"));

        assert_eq!(extract_token(&HeaderMap::new()), None);
    }

    #[test]
    fn test_student_can_only_read_own_records() {
        let student = UserInfo {
            user_id: "a1".to_string(),
            role: Role::Student,
            email: "s@school.edu".to_string(),
            student_id: Some("SV001".to_string()),
            auth_source: "jwt".to_string(),
        };
        assert!(student.can_read_student("SV001"));
        assert!(!student.can_read_student("SV002"));

        let doctor = UserInfo { role: Role::Doctor, student_id: None, ..student };
        assert!(doctor.can_read_student("SV002"));

        let admin = UserInfo { role: Role::Admin, ..doctor.clone() };
        assert!(admin.can_read_student("SV002"));

        let user = UserInfo { role: Role::User, ..doctor };
        assert!(!user.can_read_student("SV001"));
        assert!(!user.can_read_student("SV002"));
    }

    #[test]
    fn test_login_cookie() {
        assert_eq!(
            login_cookie(Role::Doctor, "abc", 60),
            "dToken=abc; Path=/; HttpOnly; SameSite=Lax; Max-Age=60"
        );
        assert!(clear_cookie(Role::Admin).starts_with("aToken=;"));
    }
}
