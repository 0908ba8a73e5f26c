//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented attachment routes into one document,
//! served unauthenticated at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the Bearer token security scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "`{realm}:{subject}:{secret}` where realm is oauth2, internal or external.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attachment API",
        description = "Upload attachments, list their metadata and fetch integrity-verified content from local storage or the owning peer organisation.\n\nHealth probes (`/health/*`) and this document are unauthenticated.",
    ),
    security(("bearer_auth" = [])),
    paths(
        crate::routes::attachment::list_attachments,
        crate::routes::attachment::create_attachment,
        crate::routes::attachment::get_attachment,
        crate::routes::attachment::delete_attachment,
    ),
    components(schemas(
        crate::routes::attachment::Attachment,
        crate::routes::attachment::InternalCreateRequest,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    modifiers(&SecurityAddon),
    tags((name = "attachment", description = "Attachment upload and retrieval")),
)]
pub struct ApiDoc;

/// Router serving `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_attachment_paths() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v1/attachment"));
        assert!(doc.paths.paths.contains_key("/v1/attachment/{idOrHash}"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("Attachment"));
    }
}
