//! Entries export routes.
//!
//! The page route serves the page data and both downloads; the AJAX route
//! serves the form fields and the step driver. Requests the export does
//! not recognize get an empty 404.

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Form, Json,
};
use domain::models::{RequestArgs, RequestMethod};
use tokio_util::io::ReaderStream;
use tracing::{error, warn};

use crate::app::AppState;
use crate::error::{admin_notice, download_failure_page, export_failure, export_success, ApiError};
use crate::extractors::{ApiKeyAuth, VIEW_ENTRIES};
use crate::services::entries_export::{
    ExportDownload, ACTION_DOWNLOAD, ACTION_FORM_DATA, ACTION_SINGLE_ENTRY_DOWNLOAD, ACTION_STEP,
};
use crate::services::{ExportCaller, ExportRequest, ExportSurface};

type Pairs = Vec<(String, String)>;

fn export_request(
    auth: &ApiKeyAuth,
    headers: &HeaderMap,
    query: &[(String, String)],
    body: &[(String, String)],
) -> ExportRequest {
    ExportRequest {
        args: RequestArgs::new(query, body),
        referer: headers
            .get(header::REFERER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        caller: ExportCaller {
            subject: auth.api_key_id.to_string(),
            can_view_entries: auth.can(VIEW_ENTRIES),
        },
    }
}

fn not_found() -> Response {
    StatusCode::NOT_FOUND.into_response()
}

/// GET /api/v1/tools/export
pub async fn export_page(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    headers: HeaderMap,
    Query(query): Query<Pairs>,
) -> Response {
    let export = state.export.as_ref();
    let debug = export.debug();
    let request = export_request(&auth, &headers, &query, &[]);

    let Some(session) = export.init(ExportSurface::Page, request).await else {
        return not_found();
    };

    let action = session.args().get(RequestMethod::Get).action.clone();
    match action.as_str() {
        ACTION_DOWNLOAD => match session.download_batch().await {
            Ok(download) => download_response(download),
            Err(e) => download_failure_page(&e, debug),
        },
        ACTION_SINGLE_ENTRY_DOWNLOAD => match session.download_single_entry().await {
            Ok(download) => download_response(download),
            Err(e) => admin_notice(&e, debug),
        },
        _ => match session.page_data().await {
            Ok(data) => Json(data).into_response(),
            Err(e) => ApiError::Internal(format!("Export page data: {}", e.render(true)))
                .into_response(),
        },
    }
}

/// POST /api/v1/tools/export/ajax
pub async fn export_ajax(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    headers: HeaderMap,
    Query(query): Query<Pairs>,
    Form(body): Form<Pairs>,
) -> Response {
    let export = state.export.as_ref();
    let debug = export.debug();
    let request = export_request(&auth, &headers, &query, &body);

    let Some(session) = export.init(ExportSurface::Ajax, request).await else {
        return not_found();
    };

    let action = session.args().action().to_string();
    match action.as_str() {
        ACTION_FORM_DATA => match session.form_data() {
            Ok(fields) => export_success(fields),
            Err(e) => export_failure(&e, debug),
        },
        ACTION_STEP => match session.export_step().await {
            Ok(response) => export_success(response),
            Err(e) => {
                if matches!(e, domain::ExportError::Storage(_) | domain::ExportError::Io(_)) {
                    error!(error = %e, detail = ?e.detail(), "Export step failed");
                }
                export_failure(&e, debug)
            }
        },
        _ => not_found(),
    }
}

/// Streams an export file as an attachment.
fn download_response(download: ExportDownload) -> Response {
    let headers = download.headers();
    let file = tokio::fs::File::from_std(download.file);
    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = name, "Skipping invalid download header"),
        }
    }

    response
}
