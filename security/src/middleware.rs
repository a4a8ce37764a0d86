// security/src/middleware.rs

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use log::debug;
use serde_json::json;

use crate::{AuthError, JwtKeys};
use models::errors::ErrorKind;
use models::medical::Actor;

/// Extracts the acting account from an `Authorization: Bearer <jwt>` header.
///
/// Handlers that take this argument reject anonymous requests with 401; the
/// role check itself happens in the clinic service.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedActor(pub Actor);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedActor
where
    JwtKeys: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let keys = JwtKeys::from_ref(state);
        let actor = keys.resolve(token).map_err(|e| {
            debug!("Rejected bearer token: {}", e);
            e
        })?;
        Ok(AuthenticatedActor(actor))
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|hv| hv.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::InsufficientStock => StatusCode::CONFLICT,
        ErrorKind::Authorization => StatusCode::FORBIDDEN,
        ErrorKind::Infrastructure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl AuthError {
    /// HTTP status plus the `kind` label used in error bodies.
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "authentication")
            }
            AuthError::PasswordHashError(_) | AuthError::JwtError(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Infrastructure.as_str())
            }
            AuthError::Clinic(e) => (status_for_kind(e.kind()), e.kind().as_str()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let body = Json(json!({
            "status": "error",
            "kind": kind,
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use models::identifiers::AccountId;
    use models::medical::Role;

    fn keys() -> JwtKeys {
        JwtKeys::from_secret(b"middleware-test-secret-0123456789", 1)
    }

    async fn extract(header: Option<&str>) -> Result<AuthenticatedActor, AuthError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        AuthenticatedActor::from_request_parts(&mut parts, &keys()).await
    }

    #[tokio::test]
    async fn resolves_bearer_header() {
        let id = AccountId::new();
        let token = keys().issue(id, Role::Cashier).unwrap();
        let AuthenticatedActor(actor) = extract(Some(&format!("Bearer {token}"))).await.unwrap();
        assert_eq!(actor, Actor::new(id, Role::Cashier));
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(extract(None).await, Err(AuthError::MissingToken)));
        assert!(matches!(extract(Some("Basic abc")).await, Err(AuthError::MissingToken)));
        let err = extract(Some("Bearer not.a.jwt")).await.unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn kinds_map_to_status_codes() {
        assert_eq!(status_for_kind(ErrorKind::Validation), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_kind(ErrorKind::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for_kind(ErrorKind::Conflict), StatusCode::CONFLICT);
        assert_eq!(status_for_kind(ErrorKind::Authorization), StatusCode::FORBIDDEN);
        assert_eq!(status_for_kind(ErrorKind::Infrastructure), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn clinic_errors_keep_their_kind_label() {
        let err = AuthError::from(models::errors::ClinicError::DuplicateAccount("a@b.c".into()));
        assert_eq!(err.status_and_kind(), (StatusCode::CONFLICT, "conflict"));
        assert_eq!(AuthError::MissingToken.status_and_kind(), (StatusCode::UNAUTHORIZED, "authentication"));
    }
}
