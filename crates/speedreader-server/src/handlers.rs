//! HTTP request handlers.

use crate::ApiState;
use axum::{
    body::Bytes,
    extract::{FromRequest, Multipart, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use futures::future::join_all;
use serde::Serialize;
use speedreader_core::{json, Image, OcrError, OcrJsonResult, PageContext};
use tracing::{info, warn};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Health check endpoint.
pub async fn health() -> &'static str {
    "Healthy"
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

/// Error responses are JSON `{"error": "..."}`.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn from_ocr(err: &OcrError) -> Self {
        let status = match err {
            OcrError::InvalidInput(_) | OcrError::NonContiguous { .. } => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::to_string_pretty(&ErrorBody {
            error: self.message,
        })
        .unwrap_or_else(|_| "{\"error\": \"serialization failed\"}".into());
        (
            self.status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response()
    }
}

/// One uploaded image: the bytes plus its multipart file name, if any.
struct Upload {
    filename: Option<String>,
    bytes: Bytes,
}

/// OCR endpoint: a raw image body, or `multipart/form-data` with one file
/// per part. The response array preserves input order.
pub async fn ocr(State(state): State<ApiState>, request: Request) -> Result<Response, ApiError> {
    let uploads = collect_uploads(request).await?;
    if uploads.is_empty() {
        return Err(ApiError::bad_request("empty request body"));
    }
    info!(images = uploads.len(), "ocr request");

    // Decode everything up front so input errors surface before any
    // inference is scheduled.
    let mut pages = Vec::with_capacity(uploads.len());
    for (index, upload) in uploads.into_iter().enumerate() {
        let image = Image::decode(&upload.bytes).map_err(|e| ApiError::from_ocr(&e))?;
        let ctx = match &upload.filename {
            Some(name) => PageContext::with_source(index, name.clone()),
            None => PageContext::new(index),
        };
        pages.push((image, ctx, upload.filename));
    }

    let futures: Vec<_> = pages
        .into_iter()
        .map(|(image, ctx, filename)| {
            let pipeline = state.pipeline.clone();
            async move {
                let result = pipeline.submit(image, ctx).await?;
                Ok::<_, OcrError>(OcrJsonResult::new(filename, result))
            }
        })
        .collect();

    let mut results = Vec::new();
    for outcome in join_all(futures).await {
        match outcome {
            Ok(page) => results.push(page),
            Err(err) => {
                warn!(error = %err, "ocr submission failed");
                return Err(ApiError::from_ocr(&err));
            }
        }
    }

    let body = json::to_pretty_json(&results)
        .map_err(|e| ApiError::from_ocr(&OcrError::Pipeline(e.to_string())))?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body,
    )
        .into_response())
}

/// Pull images out of the request: multipart file parts, or the raw body.
async fn collect_uploads(request: Request) -> Result<Vec<Upload>, ApiError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("multipart/form-data") {
        let mut multipart = Multipart::from_request(request, &())
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {e}")))?;
        let mut uploads = Vec::new();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart field: {e}")))?
        {
            let filename = field.file_name().map(ToString::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("unreadable multipart field: {e}")))?;
            if bytes.is_empty() {
                continue;
            }
            uploads.push(Upload { filename, bytes });
        }
        Ok(uploads)
    } else {
        let bytes = axum::body::to_bytes(request.into_body(), MAX_BODY_BYTES)
            .await
            .map_err(|e| ApiError::bad_request(format!("unreadable request body: {e}")))?;
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Upload {
            filename: None,
            bytes,
        }])
    }
}
