//! Unified error response handling for the edge
//!
//! Every terminal rejection leaves the pipeline as a JSON body carrying a
//! machine-readable code, a short message and the request ID, with the
//! matching HTTP status.

use crate::edge::headers::X_REQUEST_ID;
use crate::edge::types::EdgeError;
use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

/// Standard error response format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Unique error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Request ID for correlation
    pub request_id: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            request_id: None,
        }
    }

    /// Add request ID for correlation
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Convert to HTTP response with proper headers
    pub fn into_response_with_status(self, status: StatusCode) -> Response {
        let request_id = self.request_id.clone();
        let mut response = (status, Json(self)).into_response();

        if let Some(id) = request_id {
            if let Ok(header_value) = HeaderValue::from_str(&id) {
                response.headers_mut().insert(X_REQUEST_ID, header_value);
            }
        }

        response
    }
}

/// Extension trait for consistent error formatting
pub trait ErrorResponseExt {
    /// Convert to standardized error response
    fn to_error_response(&self) -> ErrorResponse;

    /// Get the appropriate HTTP status code
    fn status_code(&self) -> StatusCode;

    /// Machine-readable reason code
    fn reason_code(&self) -> &'static str;
}

impl ErrorResponseExt for EdgeError {
    fn to_error_response(&self) -> ErrorResponse {
        use EdgeError::*;

        let message = match self {
            AbsentReferer => "Referer required".to_string(),
            MalformedReferer(_) => "Invalid referer".to_string(),
            DisallowedRefererDomain(_) => "Hotlink denied".to_string(),
            UnrecognizedHost(_) => "Invalid host".to_string(),
            InvalidShard(_) => "Invalid shard".to_string(),
            EmptyPath => "Not found".to_string(),
            UnsupportedAssetType(_) => "File not allowed".to_string(),
            InvalidAssetName { kind, .. } => format!("Invalid {kind} name"),
            InvalidPreviewId(_) => "Invalid preview id".to_string(),
            MalformedIdentifier(_) => "Malformed identifier".to_string(),
            OriginStatus(_) => "File not found".to_string(),
            OriginUnavailable(_) => "Origin unavailable".to_string(),
            OriginTimeout(_) => "Origin timed out".to_string(),
            Internal(_) => "Internal server error".to_string(),
        };

        ErrorResponse::new(self.reason_code(), message)
    }

    fn status_code(&self) -> StatusCode {
        use EdgeError::*;

        match self {
            AbsentReferer
            | MalformedReferer(_)
            | DisallowedRefererDomain(_)
            | UnrecognizedHost(_)
            | InvalidShard(_)
            | UnsupportedAssetType(_)
            | InvalidAssetName { .. }
            | InvalidPreviewId(_) => StatusCode::FORBIDDEN,
            EmptyPath => StatusCode::NOT_FOUND,
            MalformedIdentifier(_) => StatusCode::BAD_REQUEST,
            OriginStatus(status) => *status,
            OriginUnavailable(_) => StatusCode::BAD_GATEWAY,
            OriginTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn reason_code(&self) -> &'static str {
        use EdgeError::*;

        match self {
            AbsentReferer => "REFERER_REQUIRED",
            MalformedReferer(_) => "INVALID_REFERER",
            DisallowedRefererDomain(_) => "HOTLINK_DENIED",
            UnrecognizedHost(_) => "INVALID_HOST",
            InvalidShard(_) => "INVALID_SHARD",
            EmptyPath => "NOT_FOUND",
            UnsupportedAssetType(_) => "FILE_NOT_ALLOWED",
            InvalidAssetName { .. } => "INVALID_ASSET_NAME",
            InvalidPreviewId(_) => "INVALID_PREVIEW_ID",
            MalformedIdentifier(_) => "MALFORMED_IDENTIFIER",
            OriginStatus(_) => "ORIGIN_STATUS",
            OriginUnavailable(_) => "ORIGIN_UNAVAILABLE",
            OriginTimeout(_) => "ORIGIN_TIMEOUT",
            Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error conversion for Axum responses using standardized format
impl IntoResponse for EdgeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        self.to_error_response().into_response_with_status(status)
    }
}

/// Helper to extract request ID from headers
pub fn extract_request_id(headers: &http::HeaderMap) -> Option<String> {
    headers
        .get(X_REQUEST_ID)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.to_string())
}
