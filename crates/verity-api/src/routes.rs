//! API routes for Verity endpoints

use axum::{
    extract::{rejection::JsonRejection, Multipart, Path, Query, State},
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::OpenApi;
use uuid::Uuid;

use verity_anchor::LedgerAnchorRecord;
use verity_core::AnchorId;
use verity_runtime::{CreateAnchorRequest, UploadedFile};

use crate::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::AppState;

/// Header naming the submitting client; recorded as the claim owner
pub const CLIENT_ID_HEADER: &str = "x-client-id";

/// Service banner
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RootResponse {
    pub message: String,
    pub version: String,
    pub docs: String,
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Service banner", body = RootResponse)
    )
)]
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Verity API - Content Commitment Anchoring".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        docs: "/openapi.json".to_string(),
    })
}

/// Health check response
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub services: ServicesStatus,
}

/// Per-dependency status: `healthy`, `unhealthy` or `unknown`
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct ServicesStatus {
    pub database: String,
    pub blockchain: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Dependency health; never fails", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let report = state.orchestrator().health().await;
    Json(HealthResponse {
        status: report.status.as_str().to_string(),
        timestamp: report.timestamp,
        services: ServicesStatus {
            database: report.services.database.as_str().to_string(),
            blockchain: report.services.blockchain.as_str().to_string(),
        },
    })
}

/// Form fields may also arrive as query parameters
#[derive(Debug, Default, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreateAnchorParams {
    pub claim_type: Option<String>,
    pub description: Option<String>,
    pub metadata: Option<String>,
}

/// Multipart body of anchor creation (documentation only)
#[derive(Debug, utoipa::ToSchema)]
pub struct CreateAnchorForm {
    pub claim_type: String,
    pub description: Option<String>,
    /// JSON object, defaults to `{}`
    pub metadata: Option<String>,
    /// One or more files, hashed in upload order
    pub files: Vec<String>,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateAnchorData {
    pub claim_id: Uuid,
    pub anchor_id: String,
    pub commitment_hash: String,
    pub file_hashes: Vec<String>,
    pub proof_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_height: Option<u64>,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct CreateAnchorResponse {
    pub success: bool,
    pub data: CreateAnchorData,
}

fn bad_multipart(e: axum::extract::multipart::MultipartError) -> ApiError {
    ApiError::BadRequest(format!("Invalid multipart body: {}", e))
}

fn parse_metadata(
    raw: Option<String>,
) -> ApiResult<serde_json::Map<String, serde_json::Value>> {
    let raw = raw.unwrap_or_else(|| "{}".to_string());
    match serde_json::from_str::<serde_json::Value>(&raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(ApiError::BadRequest(
            "metadata must be a JSON object".to_string(),
        )),
        Err(e) => Err(ApiError::BadRequest(format!("Invalid metadata JSON: {}", e))),
    }
}

/// Create anchor handler
#[utoipa::path(
    post,
    path = "/v1/anchors",
    params(CreateAnchorParams),
    request_body(content = CreateAnchorForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Claim anchored", body = CreateAnchorResponse),
        (status = 400, description = "No files or invalid input", body = ErrorResponse),
        (status = 500, description = "Store or ledger failure", body = ErrorResponse)
    )
)]
pub async fn create_anchor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<CreateAnchorParams>,
    mut multipart: Multipart,
) -> ApiResult<Json<CreateAnchorResponse>> {
    let CreateAnchorParams {
        mut claim_type,
        mut description,
        mut metadata,
    } = params;
    let mut files = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "claim_type" => claim_type = Some(field.text().await.map_err(bad_multipart)?),
            "description" => description = Some(field.text().await.map_err(bad_multipart)?),
            "metadata" => metadata = Some(field.text().await.map_err(bad_multipart)?),
            "files" | "file" => {
                let filename = field.file_name().map(str::to_string);
                let content = field.bytes().await.map_err(bad_multipart)?;
                files.push(UploadedFile {
                    filename,
                    content: content.to_vec(),
                });
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let metadata = parse_metadata(metadata)?;

    let owner = headers
        .get(CLIENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let outcome = state
        .orchestrator()
        .create_anchor(CreateAnchorRequest {
            owner,
            claim_type: claim_type.unwrap_or_default(),
            description,
            metadata: Some(metadata),
            files,
        })
        .await
        .map_err(|e| ApiError::from_orchestrator("Failed to create anchor", e))?;

    Ok(Json(CreateAnchorResponse {
        success: true,
        data: CreateAnchorData {
            claim_id: outcome.claim_id,
            anchor_id: outcome.anchor_id.into_string(),
            commitment_hash: outcome.commitment_hash.into_string(),
            file_hashes: outcome
                .file_hashes
                .into_iter()
                .map(|d| d.into_string())
                .collect(),
            proof_id: outcome.proof_id,
            transaction_hash: outcome.transaction_hash,
            block_height: outcome.block_height,
            message: "Claim anchored successfully to blockchain".to_string(),
        },
    }))
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct GetAnchorResponse {
    pub success: bool,
    /// Ledger record, passed through unchanged
    #[schema(value_type = Object)]
    pub data: LedgerAnchorRecord,
}

/// Get anchor handler
#[utoipa::path(
    get,
    path = "/v1/anchors/{anchor_id}",
    params(
        ("anchor_id" = String, Path, description = "Anchor identifier")
    ),
    responses(
        (status = 200, description = "Ledger record", body = GetAnchorResponse),
        (status = 404, description = "Anchor not found", body = ErrorResponse),
        (status = 500, description = "Ledger read failure", body = ErrorResponse)
    )
)]
pub async fn get_anchor(
    State(state): State<AppState>,
    Path(anchor_id): Path<String>,
) -> ApiResult<Json<GetAnchorResponse>> {
    let record = state
        .orchestrator()
        .get_anchor(&AnchorId::from(anchor_id))
        .await
        .map_err(|e| ApiError::from_orchestrator("Failed to get anchor", e))?;

    Ok(Json(GetAnchorResponse {
        success: true,
        data: record,
    }))
}

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct VerifyRequest {
    pub anchor_id: String,
    pub commitment_hash: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VerifyData {
    pub verified: bool,
    pub anchor_id: String,
    pub commitment_hash: String,
    pub proof_id: Option<Uuid>,
    pub message: String,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct VerifyResponse {
    pub success: bool,
    pub data: VerifyData,
}

/// Verify handler
#[utoipa::path(
    post,
    path = "/v1/verify",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Ledger verdict", body = VerifyResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 500, description = "Ledger or store failure", body = ErrorResponse)
    )
)]
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(req) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let outcome = state
        .orchestrator()
        .verify(AnchorId::from(req.anchor_id), req.commitment_hash)
        .await
        .map_err(|e| ApiError::from_orchestrator("Failed to verify proof", e))?;

    let message = if outcome.verified {
        "Proof verified successfully"
    } else {
        "Proof verification failed"
    };

    Ok(Json(VerifyResponse {
        success: true,
        data: VerifyData {
            verified: outcome.verified,
            anchor_id: outcome.anchor_id.into_string(),
            commitment_hash: outcome.commitment_hash,
            proof_id: outcome.proof_id,
            message: message.to_string(),
        },
    }))
}

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[derive(OpenApi)]
#[openapi(
    info(title = "Verity API", description = "Content commitment anchoring"),
    paths(root, health, create_anchor, get_anchor, verify),
    components(
        schemas(
            RootResponse,
            HealthResponse, ServicesStatus,
            CreateAnchorForm, CreateAnchorData, CreateAnchorResponse,
            GetAnchorResponse,
            VerifyRequest, VerifyData, VerifyResponse,
            ErrorResponse,
        )
    )
)]
pub struct ApiDoc;

/// Build the API router; every collection route also answers with a trailing slash
pub fn api_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/openapi.json", get(openapi_json))
        .route("/health", get(health))
        .route("/health/", get(health))
        .route("/v1/anchors", post(create_anchor))
        .route("/v1/anchors/", post(create_anchor))
        .route("/v1/anchors/{anchor_id}", get(get_anchor))
        .route("/v1/verify", post(verify))
        .route("/v1/verify/", post(verify))
        .with_state(state)
}
