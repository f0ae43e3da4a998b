use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use futures::future::BoxFuture;
use serde_json::json;
use tracing::{debug, warn};

use crate::auth::logging::log_access_denied;
use crate::auth::{Role, UserInfo};

fn forbidden(required: &[Role]) -> Response {
    let required: Vec<&str> = required.iter().map(|r| r.as_str()).collect();
    (
        StatusCode::FORBIDDEN,
        Json(json!({
            "error": "forbidden",
            "message": "Your role is not allowed to use this endpoint",
            "required_roles": required
        })),
    )
        .into_response()
}

/// Let the request through only when the authenticated caller holds one of `allowed`.
///
/// Must be layered inside `auth_middleware`, which supplies the `UserInfo`.
async fn check_roles(req: Request<Body>, next: Next, allowed: &[Role]) -> Response {
    let path = req.uri().path().to_string();

    let Some(user) = req.extensions().get::<UserInfo>() else {
        warn!("Role check on {} without an authenticated user", path);
        log_access_denied(None, &path, "no authenticated user in request");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": "internal_error", "message": "Authentication context missing" })),
        )
            .into_response();
    };

    if allowed.contains(&user.role) {
        debug!(user = %user.user_id, role = %user.role, path = %path, "role accepted");
        return next.run(req).await;
    }

    warn!(user = %user.user_id, role = %user.role, path = %path, "role refused");
    log_access_denied(Some(&user.user_id), &path, format!("role {} not in {:?}", user.role, allowed));
    forbidden(allowed)
}

/// Middleware for `from_fn_with_state` admitting any of `roles`
pub fn require_any_role<S: Clone + Send + Sync + 'static>(
    roles: &[Role],
) -> impl Fn(State<S>, Request<Body>, Next) -> BoxFuture<'static, Response> + Clone + Send + 'static {
    let roles = roles.to_vec();
    move |_state, req, next| {
        let roles = roles.clone();
        Box::pin(async move { check_roles(req, next, &roles).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn user(role: Role) -> UserInfo {
        UserInfo {
            user_id: "u1".to_string(),
            role,
            email: "u1@school.edu".to_string(),
            student_id: None,
            auth_source: "jwt".to_string(),
        }
    }

    async fn call(caller: Option<UserInfo>, allowed: &[Role]) -> StatusCode {
        let app: Router = Router::new()
            .route("/test", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state((), require_any_role::<()>(allowed)));

        let mut req = Request::builder().uri("/test").body(Body::empty()).unwrap();
        if let Some(caller) = caller {
            req.extensions_mut().insert(caller);
        }
        app.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_matching_role_passes() {
        assert_eq!(call(Some(user(Role::Doctor)), &[Role::Admin, Role::Doctor]).await, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_role_is_forbidden() {
        assert_eq!(call(Some(user(Role::Student)), &[Role::Admin]).await, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_missing_context_is_internal_error() {
        assert_eq!(call(None, &[Role::Admin]).await, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
