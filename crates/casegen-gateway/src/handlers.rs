use axum::Json;
use axum::body::Bytes;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use casegen_core::{Document, IngestOutcome, RecordList};
use casegen_storage::{ArtifactKind, MetadataRecord, RequestId};

use super::error::ApiError;
use super::server::AppState;

pub(crate) const UPLOAD_FIELD: &str = "file";

#[derive(serde::Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
}

#[derive(Debug, Default, serde::Deserialize)]
pub(crate) struct ListParams {
    pub limit: Option<u32>,
}

/// Read the `file` field, keeping at most `max_bytes + 1` bytes so an
/// oversized upload is still recognised as such downstream.
async fn read_upload(multipart: &mut Multipart, max_bytes: usize) -> Result<Document, ApiError> {
    while let Some(mut field) = multipart.next_field().await? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_owned();
        let content_type = field.content_type().map(str::to_owned);

        let mut bytes = Vec::new();
        while let Some(chunk) = field.chunk().await? {
            bytes.extend_from_slice(&chunk);
            if bytes.len() > max_bytes {
                tracing::debug!(%filename, "upload exceeds {max_bytes} bytes, stopped reading");
                bytes.truncate(max_bytes + 1);
                break;
            }
        }
        return Ok(Document {
            filename,
            content_type,
            bytes,
        });
    }
    Err(ApiError::bad_request(format!("Missing multipart field \"{UPLOAD_FIELD}\"")))
}

pub(crate) async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<IngestOutcome>, ApiError> {
    let max_bytes = state.orchestrator.limits().max_upload_bytes;
    let document = read_upload(&mut multipart, max_bytes).await?;
    let outcome = state.orchestrator.ingest(document).await?;
    Ok(Json(outcome))
}

pub(crate) async fn list_records_handler(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<RecordList> {
    Json(state.catalog.list_records(params.limit).await)
}

fn parse_id(raw: &str) -> Result<RequestId, ApiError> {
    raw.parse().map_err(|_| ApiError::not_found("File not found"))
}

pub(crate) async fn get_record_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<MetadataRecord>, ApiError> {
    let id = parse_id(&id)?;
    Ok(Json(state.catalog.get_record(id).await?))
}

pub(crate) async fn artifact_handler(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let kind: ArtifactKind = kind
        .parse()
        .map_err(|_| ApiError::not_found(format!("Unknown artifact kind: {kind}")))?;
    let download = state.catalog.fetch_artifact(id, kind).await?;

    let content_type = HeaderValue::from_str(&download.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(kind.content_type()));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, attachment(&download.filename)),
        ],
        Bytes::from(download.bytes),
    )
        .into_response())
}

/// `attachment; filename="..."` with the name reduced to printable ASCII.
fn attachment(filename: &str) -> HeaderValue {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c == ' ' || (c.is_ascii_graphic() && c != '"' && c != '\\') {
                c
            } else {
                '_'
            }
        })
        .collect();
    HeaderValue::from_str(&format!("attachment; filename=\"{safe}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
    })
}
