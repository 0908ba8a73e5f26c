//! # Attachment API
//!
//! Upload, list, fetch and delete attachments. Responses report the owner
//! by alias; addresses are translated through the identity directory once
//! per request.

use std::collections::HashMap;

use attachment_core::{
    attachment_disposition, normalize_integrity_hash, AttachmentRecord, Column, Comparison,
    Filter, NewAttachment, JSON_FILENAME,
};
use attachment_federation::{FederationError, IdentityDirectory, Member};
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::{require_realm, CallerIdentity, Realm};
use crate::error::AppError;
use crate::extractors::{from_json_value, UploadBody};
use crate::resolver::Resolved;
use crate::state::AppState;

/// One year, in seconds.
const IMMUTABLE_MAX_AGE: u32 = 365 * 24 * 60 * 60;

/// Attachment metadata as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: Uuid,
    /// Original filename, `json` for JSON uploads, or null if not yet known.
    pub filename: Option<String>,
    pub size: Option<i64>,
    pub integrity_hash: String,
    /// Owner alias, or address when the identity service does not know it.
    pub owner: String,
    pub created_at: DateTime<Utc>,
}

/// Body of an internal attachment registration.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct InternalCreateRequest {
    pub integrity_hash: String,
    pub owner_address: String,
}

/// Per-request address ↔ alias memo.
struct OwnerAliases<'a> {
    identity: &'a dyn IdentityDirectory,
    aliases: HashMap<String, String>,
}

impl<'a> OwnerAliases<'a> {
    fn new(identity: &'a dyn IdentityDirectory) -> Self {
        Self {
            identity,
            aliases: HashMap::new(),
        }
    }

    fn remember(&mut self, member: &Member) {
        self.aliases
            .insert(member.address.clone(), member.alias.clone());
    }

    async fn alias_of(&mut self, address: &str) -> Result<String, AppError> {
        if let Some(alias) = self.aliases.get(address) {
            return Ok(alias.clone());
        }
        match self.identity.member_by_address(address).await {
            Ok(member) => {
                self.remember(&member);
                Ok(member.alias)
            }
            Err(FederationError::IdentityNotFound(_)) => {
                tracing::warn!(owner = address, "attachment owner unknown to identity service");
                self.aliases.insert(address.to_string(), address.to_string());
                Ok(address.to_string())
            }
            Err(e) => {
                tracing::error!(owner = address, error = %e, "owner lookup failed");
                Err(AppError::Unknown(e.to_string()))
            }
        }
    }

    async fn present(&mut self, record: AttachmentRecord) -> Result<Attachment, AppError> {
        let owner = self.alias_of(&record.owner).await?;
        Ok(Attachment {
            id: record.id,
            filename: record.filename,
            size: record.size,
            integrity_hash: record.integrity_hash,
            owner,
            created_at: record.created_at,
        })
    }
}

/// Build the attachment router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/attachment",
            get(list_attachments).post(create_attachment),
        )
        .route(
            "/v1/attachment/:id_or_hash",
            get(get_attachment).delete(delete_attachment),
        )
}

/// Parsed list query. `id` may repeat.
#[derive(Debug, Default, PartialEq)]
struct ListQuery {
    updated_since: Option<DateTime<Utc>>,
    owner: Option<String>,
    integrity_hash: Option<String>,
    ids: Vec<Uuid>,
}

impl ListQuery {
    fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return Ok(query);
        };
        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            match key.as_ref() {
                "updated_since" => {
                    let ts = DateTime::parse_from_rfc3339(&value).map_err(|_| {
                        AppError::BadRequest(format!("updated_since is not an RFC 3339 date: {value}"))
                    })?;
                    query.updated_since = Some(ts.with_timezone(&Utc));
                }
                "owner" => query.owner = Some(value.into_owned()),
                "integrityHash" => query.integrity_hash = Some(value.into_owned()),
                "id" => query.ids.push(
                    Uuid::parse_str(&value)
                        .map_err(|_| AppError::BadRequest(format!("id is not a UUID: {value}")))?,
                ),
                _ => {}
            }
        }
        Ok(query)
    }
}

/// GET /v1/attachment — List attachments.
#[utoipa::path(
    get,
    path = "/v1/attachment",
    params(
        ("updated_since" = Option<String>, Query, description = "Only attachments updated after this RFC 3339 time"),
        ("owner" = Option<String>, Query, description = "Owner alias"),
        ("integrityHash" = Option<String>, Query, description = "Integrity hash"),
        ("id" = Option<Vec<Uuid>>, Query, description = "Attachment ids (repeatable)"),
    ),
    responses(
        (status = 200, description = "Matching attachments", body = Vec<Attachment>),
        (status = 400, description = "Invalid query", body = crate::error::ErrorBody),
    ),
    tag = "attachment"
)]
pub async fn list_attachments(
    State(state): State<AppState>,
    caller: CallerIdentity,
    RawQuery(raw): RawQuery,
) -> Result<Json<Vec<Attachment>>, AppError> {
    require_realm(&caller, &[Realm::OAuth2, Realm::Internal])?;
    let query = ListQuery::parse(raw.as_deref())?;
    let mut aliases = OwnerAliases::new(state.identity.as_ref());

    let mut filter = Filter::new();
    if let Some(since) = query.updated_since {
        filter = filter.compare(Column::UpdatedAt, Comparison::Gt, since);
    }
    if let Some(hash) = query.integrity_hash {
        filter = filter.equals(Column::IntegrityHash, canonical_hash(hash));
    }
    if !query.ids.is_empty() {
        filter = filter.is_in(Column::Id, query.ids);
    }
    if let Some(owner) = query.owner {
        match state.identity.member_by_alias(&owner).await {
            Ok(member) => {
                aliases.remember(&member);
                filter = filter.equals(Column::Owner, member.address);
            }
            Err(FederationError::IdentityNotFound(_)) => {
                return Err(AppError::BadRequest(format!("Invalid identity {owner}")));
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::debug!(?filter, "listing attachments");
    let records = state.metadata.get(&filter).await?;

    let mut out = Vec::with_capacity(records.len());
    for record in records {
        out.push(aliases.present(record).await?);
    }
    Ok(Json(out))
}

/// POST /v1/attachment — Upload an attachment.
///
/// A multipart `file` part is stored under its filename; any other JSON
/// body is stored as the attachment `json`. Internal callers without a file
/// register an existing hash instead.
#[utoipa::path(
    post,
    path = "/v1/attachment",
    request_body(content = InternalCreateRequest, description = "Multipart `file`, any JSON document, or an internal registration"),
    responses(
        (status = 201, description = "Attachment created", body = Attachment),
        (status = 400, description = "Nothing to upload", body = crate::error::ErrorBody),
    ),
    tag = "attachment"
)]
pub async fn create_attachment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    body: UploadBody,
) -> Result<(StatusCode, Json<Attachment>), AppError> {
    require_realm(&caller, &[Realm::OAuth2, Realm::Internal])?;
    let mut aliases = OwnerAliases::new(state.identity.as_ref());

    let (filename, bytes) = match body {
        UploadBody::File { filename, bytes } => (filename, bytes),
        other if caller.realm == Realm::Internal => {
            let record = create_internal(&state, other).await?;
            return Ok((StatusCode::CREATED, Json(aliases.present(record).await?)));
        }
        UploadBody::Json(value) => (
            JSON_FILENAME.to_string(),
            serde_json::to_vec(&value).map_err(|e| AppError::Internal(e.to_string()))?,
        ),
        UploadBody::Empty => return Err(AppError::BadRequest("nothing to upload".into())),
    };

    tracing::debug!(%filename, size = bytes.len(), "creating attachment");
    let size = i64::try_from(bytes.len()).ok();
    let (integrity_hash, me) = tokio::try_join!(
        async {
            state
                .storage
                .store(bytes, &filename)
                .await
                .map_err(AppError::from)
        },
        async { state.identity.self_member().await.map_err(AppError::from) },
    )?;
    aliases.remember(&me);

    let record = state
        .metadata
        .insert(NewAttachment {
            integrity_hash,
            owner: me.address,
            filename: Some(filename),
            size,
            encoding: Some(state.storage.encoding()),
        })
        .await?;
    tracing::info!(
        attachment = %record.id,
        integrity_hash = %record.integrity_hash,
        backend = state.storage.name(),
        "attachment stored"
    );

    Ok((StatusCode::CREATED, Json(aliases.present(record).await?)))
}

async fn create_internal(state: &AppState, body: UploadBody) -> Result<AttachmentRecord, AppError> {
    const INVALID: &str = "Invalid body for internal attachment creation";
    let UploadBody::Json(value) = body else {
        return Err(AppError::BadRequest(INVALID.into()));
    };
    let req: InternalCreateRequest = from_json_value(value, INVALID)?;
    let (encoding, integrity_hash) = normalize_integrity_hash(&req.integrity_hash)?;

    tracing::debug!(%integrity_hash, owner = %req.owner_address, "registering internal attachment");
    let record = state
        .metadata
        .insert(NewAttachment {
            integrity_hash,
            owner: req.owner_address,
            filename: None,
            size: None,
            encoding: Some(encoding),
        })
        .await?;
    Ok(record)
}

/// Canonical form of a hash used as a lookup key. Unclassifiable input is
/// kept as given and simply matches nothing.
fn canonical_hash(hash: String) -> String {
    match normalize_integrity_hash(&hash) {
        Ok((_, canonical)) => canonical,
        Err(_) => hash,
    }
}

/// GET /v1/attachment/{idOrHash} — Fetch attachment content.
#[utoipa::path(
    get,
    path = "/v1/attachment/{idOrHash}",
    params(("idOrHash" = String, Path, description = "Attachment id or integrity hash")),
    responses(
        (status = 200, description = "Attachment JSON body or octet stream"),
        (status = 400, description = "Integrity check failed", body = crate::error::ErrorBody),
        (status = 403, description = "Access denied", body = crate::error::ErrorBody),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "attachment"
)]
pub async fn get_attachment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id_or_hash): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let filter = match Uuid::parse_str(&id_or_hash) {
        Ok(id) => Filter::by_id(id),
        Err(_) => Filter::by_integrity_hash(canonical_hash(id_or_hash)),
    };
    let record = state.metadata.get(&filter).await?.into_iter().next();

    let record = match record {
        Some(record) => record,
        None if caller.is_external() => return Err(AppError::Forbidden("access denied".into())),
        None => return Err(AppError::NotFound("attachment".into())),
    };
    let me = state.identity.self_member().await?;

    if caller.is_external() {
        if record.owner != me.address {
            return Err(AppError::Forbidden("access denied".into()));
        }
        let account = caller
            .subject
            .as_deref()
            .ok_or_else(|| AppError::Forbidden("access denied".into()))?;
        state.authorizer.authorize(record.id, account).await?;
    }

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("*/*");
    match state.resolver.resolve(&record, &me.address, accept).await? {
        Resolved::Json(value) => Ok(Json(value).into_response()),
        Resolved::Octet { bytes, filename } => Ok(octet_response(bytes, &filename)),
    }
}

fn octet_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, attachment_disposition(filename)),
            (
                header::ACCESS_CONTROL_EXPOSE_HEADERS,
                "content-disposition".to_string(),
            ),
            (
                header::CACHE_CONTROL,
                format!("public, max-age={IMMUTABLE_MAX_AGE}, immutable"),
            ),
        ],
        bytes,
    )
        .into_response()
}

/// DELETE /v1/attachment/{id} — Remove an attachment record.
#[utoipa::path(
    delete,
    path = "/v1/attachment/{id}",
    params(("id" = Uuid, Path, description = "Attachment id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "attachment"
)]
pub async fn delete_attachment(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    require_realm(&caller, &[Realm::Internal])?;
    let id = Uuid::parse_str(&id).map_err(|_| AppError::NotFound(format!("attachment {id}")))?;

    let filter = Filter::by_id(id);
    if state.metadata.get(&filter).await?.is_empty() {
        return Err(AppError::NotFound(format!("attachment {id}")));
    }
    state.metadata.delete(&filter).await?;
    tracing::info!(attachment = %id, "attachment deleted");
    Ok(StatusCode::NO_CONTENT)
}
