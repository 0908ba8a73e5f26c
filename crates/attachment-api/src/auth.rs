//! # Authentication Middleware
//!
//! Bearer token middleware that places every caller in one of three realms:
//!
//! - `oauth2`: users of this organisation.
//! - `internal`: other services of this organisation.
//! - `external`: services of peer organisations. The subject is the
//!   caller's chain account and is what the authorization webhook sees.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {realm}:{subject}:{secret}
//! Bearer {secret}                     (treated as internal)
//! ```
//!
//! The secret is compared in constant time with `AUTH_TOKEN`. When no token
//! is configured every request is treated as internal.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use utoipa::ToSchema;
use zeroize::Zeroizing;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── Realm ───────────────────────────────────────────────────────────────────

/// Security realm of a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Realm {
    /// End users of the local organisation.
    #[serde(rename = "oauth2")]
    OAuth2,
    /// Services of the local organisation.
    Internal,
    /// Services of a peer organisation.
    External,
}

impl Realm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OAuth2 => "oauth2",
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// Identity of the authenticated caller, injected by [`auth_middleware`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub realm: Realm,
    /// User id for `oauth2`, client id for `internal`, chain account for
    /// `external`.
    pub subject: Option<String>,
}

impl CallerIdentity {
    pub fn internal() -> Self {
        Self {
            realm: Realm::Internal,
            subject: None,
        }
    }

    pub fn is_external(&self) -> bool {
        self.realm == Realm::External
    }
}

#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Check that the caller belongs to one of `allowed`.
pub fn require_realm(caller: &CallerIdentity, allowed: &[Realm]) -> Result<(), AppError> {
    if allowed.contains(&caller.realm) {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "realm '{}' may not use this endpoint",
            caller.realm.as_str()
        )))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// A shared secret held in zeroizing memory.
#[derive(Clone)]
pub struct SecretToken(Zeroizing<String>);

impl SecretToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Zeroizing::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

/// Auth configuration injected into request extensions.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: Option<SecretToken>,
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token of the form `{realm}:{subject}:{secret}` or `{secret}`.
pub fn parse_bearer_token(provided: &str, expected_secret: &str) -> Result<CallerIdentity, String> {
    let parts: Vec<&str> = provided.splitn(3, ':').collect();

    match parts.as_slice() {
        [secret] => {
            if constant_time_token_eq(secret, expected_secret) {
                Ok(CallerIdentity::internal())
            } else {
                Err("invalid bearer token".into())
            }
        }
        [realm, subject, secret] => {
            if !constant_time_token_eq(secret, expected_secret) {
                return Err("invalid bearer token".into());
            }
            let realm = match *realm {
                "oauth2" => Realm::OAuth2,
                "internal" => Realm::Internal,
                "external" => Realm::External,
                other => return Err(format!("unknown realm: {other}")),
            };
            let subject = (!subject.is_empty()).then(|| subject.to_string());
            if realm == Realm::External && subject.is_none() {
                return Err("external tokens must name the calling account".into());
            }
            Ok(CallerIdentity { realm, subject })
        }
        _ => Err("invalid token format: expected {realm}:{subject}:{secret} or {secret}".into()),
    }
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Validate the bearer token and inject the caller's [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected_token = request.extensions().get::<AuthConfig>().cloned();

    match expected_token {
        Some(AuthConfig {
            token: Some(ref expected),
        }) => {
            let auth_header = request
                .headers()
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|v| v.strip_prefix("Bearer ")) {
                Some(provided) => match parse_bearer_token(provided, expected.expose()) {
                    Ok(identity) => {
                        tracing::debug!(realm = identity.realm.as_str(), "caller authenticated");
                        request.extensions_mut().insert(identity);
                        next.run(request).await
                    }
                    Err(msg) => {
                        tracing::warn!(reason = %msg, "authentication failed: invalid bearer token");
                        unauthorized_response(&msg)
                    }
                },
                None if auth_header.is_some() => {
                    tracing::warn!("authentication failed: non-Bearer authorization scheme");
                    unauthorized_response("authorization header must use Bearer scheme")
                }
                None => {
                    tracing::warn!("authentication failed: missing authorization header");
                    unauthorized_response("missing authorization header")
                }
            }
        }
        _ => {
            request.extensions_mut().insert(CallerIdentity::internal());
            next.run(request).await
        }
    }
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn whoami(caller: CallerIdentity) -> String {
        format!(
            "{}:{}",
            caller.realm.as_str(),
            caller.subject.unwrap_or_default()
        )
    }

    fn app(token: Option<&str>) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(AuthConfig {
                token: token.map(SecretToken::new),
            }))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, String) {
        let mut req = axum::http::Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            req = req.header("authorization", value);
        }
        let response = app.oneshot(req.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn parses_realm_tokens() {
        let caller = parse_bearer_token("external:0xpeer:s3cret", "s3cret").unwrap();
        assert_eq!(caller.realm, Realm::External);
        assert_eq!(caller.subject.as_deref(), Some("0xpeer"));

        let caller = parse_bearer_token("oauth2::s3cret", "s3cret").unwrap();
        assert_eq!(caller.realm, Realm::OAuth2);
        assert_eq!(caller.subject, None);

        assert_eq!(
            parse_bearer_token("s3cret", "s3cret").unwrap(),
            CallerIdentity::internal()
        );
    }

    #[test]
    fn rejects_bad_tokens() {
        assert!(parse_bearer_token("internal:svc:wrong", "s3cret").is_err());
        assert!(parse_bearer_token("admin:svc:s3cret", "s3cret").is_err());
        assert!(parse_bearer_token("external::s3cret", "s3cret").is_err());
        assert!(parse_bearer_token("a:b", "s3cret").is_err());
        assert!(parse_bearer_token("s3cre", "s3cret").is_err());
    }

    #[test]
    fn secret_token_debug_is_redacted() {
        let token = SecretToken::new("hunter2");
        assert_eq!(format!("{token:?}"), "[REDACTED]");
        assert!(!format!("{:?}", AuthConfig { token: Some(token) }).contains("hunter2"));
    }

    #[test]
    fn realm_checks() {
        let external = CallerIdentity {
            realm: Realm::External,
            subject: Some("0xpeer".into()),
        };
        assert!(require_realm(&external, &[Realm::OAuth2, Realm::Internal]).is_err());
        assert!(require_realm(&CallerIdentity::internal(), &[Realm::Internal]).is_ok());
    }

    #[tokio::test]
    async fn middleware_injects_identity() {
        let (status, body) = call(app(Some("s3cret")), Some("Bearer external:0xpeer:s3cret")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "external:0xpeer");
    }

    #[tokio::test]
    async fn middleware_rejects_missing_and_non_bearer() {
        let (status, _) = call(app(Some("s3cret")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        let (status, body) = call(app(Some("s3cret")), Some("Basic czNjcmV0")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.contains("Bearer scheme"));
    }

    #[tokio::test]
    async fn disabled_auth_treats_callers_as_internal() {
        let (status, body) = call(app(None), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "internal:");
    }
}
