use axum::{
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use domain::ExportError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg.clone()),
            ApiError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".into(),
                )
            }
        };

        let body = ErrorBody {
            error: error_code.into(),
            message,
        };

        (status, Json(body)).into_response()
    }
}

// Export responses. Export failures are expected outcomes and never map to
// an error status: the client reads them from the body.

/// `{"success": true, "data": ...}` envelope of the export AJAX actions.
#[derive(Debug, Serialize)]
pub struct ExportEnvelope<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Serialize)]
pub struct ExportErrorData {
    pub error: String,
}

pub fn export_success<T: Serialize>(data: T) -> Response {
    Json(ExportEnvelope {
        success: true,
        data,
    })
    .into_response()
}

pub fn export_failure(err: &ExportError, debug: bool) -> Response {
    Json(ExportEnvelope {
        success: false,
        data: ExportErrorData {
            error: err.render(debug),
        },
    })
    .into_response()
}

/// Error page of the batch download, loaded in the export page iframe.
///
/// The script forwards the message to the parent window's `csv_file_error`
/// listener; the `<pre>` is shown when the page is opened directly.
pub fn download_failure_page(err: &ExportError, debug: bool) -> Response {
    let error = err.render(debug).replace('\'', "&#039;");
    let body = format!(
        r#"
<script>
	( function() {{
		var w = window;
		if ( w.frameElement != null &&
			 w.frameElement.nodeName === 'IFRAME' &&
			 w.parent.jQuery )
		{{
			w.parent.jQuery( w.parent.document ).trigger( 'csv_file_error', [ '{}' ] );
			w.parent.WPFormsEntriesExport.displaySubmitSpinner( false );
		}}
	}} )();
</script>
<pre>{}</pre>"#,
        error.replace('\n', ""),
        error
    );
    Html(body).into_response()
}

/// Admin notice shown when the single entry export fails.
pub fn admin_notice(err: &ExportError, debug: bool) -> Response {
    let body = format!(
        r#"<div class="notice notice-error"><p>{}</p></div>"#,
        err.render(debug)
    );
    (
        [(header::CACHE_CONTROL, "no-cache, must-revalidate, max-age=0")],
        Html(body),
    )
        .into_response()
}
