// SPDX-FileCopyrightText: 2026 Omnidesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response envelope shared by every JSON route.
//!
//! Success and failure use the same body shape,
//! `{data, isError, errorStatus, errorMessage}`, so the dashboard can
//! branch on `errorStatus` without inspecting HTTP codes.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use omnidesk_core::{ErrorStatus, OmniError};
use serde::Serialize;
use tracing::{debug, error, warn};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T> {
    pub data: Option<T>,
    pub is_error: bool,
    pub error_status: String,
    pub error_message: String,
}

/// 200 with `data` filled in.
pub fn ok<T: Serialize>(data: T) -> Response {
    Json(Envelope {
        data: Some(data),
        is_error: false,
        error_status: String::new(),
        error_message: String::new(),
    })
    .into_response()
}

/// A failed request: HTTP status plus wire status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorStatus,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorStatus) -> Self {
        Self { status, code }
    }

    pub fn invalid_query() -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, ErrorStatus::InvalidQuery)
    }

    pub fn bad_json() -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorStatus::FailedBindJson)
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, ErrorStatus::Unauthorized)
    }
}

impl From<OmniError> for ApiError {
    fn from(err: OmniError) -> Self {
        let code = err.error_status();
        let status = match &err {
            OmniError::NotFound { .. } => StatusCode::NOT_FOUND,
            OmniError::InvalidPayload(_) | OmniError::Rule(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        match &err {
            OmniError::NotFound { .. } | OmniError::Rule(_) => debug!(error = %err, "request rejected"),
            OmniError::InvalidPayload(_) => warn!(error = %err, "invalid payload"),
            _ => error!(error = %err, "request failed"),
        }
        Self { status, code }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()> {
            data: None,
            is_error: true,
            error_status: self.code.to_string(),
            error_message: self.code.message().to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

/// Unwrap a JSON body, reporting malformed input as `FAILED_BIND_JSON`.
pub fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value).map_err(|rejection| {
        debug!(error = %rejection, "failed to bind JSON body");
        ApiError::bad_json()
    })
}

/// Unwrap query parameters, reporting bad input as `INVALID_QUERY`.
pub fn query_params<T>(
    query: Result<axum::extract::Query<T>, QueryRejection>,
) -> Result<T, ApiError> {
    query.map(|axum::extract::Query(value)| value).map_err(|rejection| {
        debug!(error = %rejection, "invalid query parameters");
        ApiError::invalid_query()
    })
}

/// Collapse a handler result into a response.
pub fn respond<T: Serialize>(result: Result<T, ApiError>) -> Response {
    match result {
        Ok(data) => ok(data),
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use omnidesk_core::RuleViolation;

    #[test]
    fn success_envelope_shape() {
        let body = serde_json::to_value(Envelope {
            data: Some(1),
            is_error: false,
            error_status: String::new(),
            error_message: String::new(),
        })
        .unwrap();
        assert_eq!(
            body,
            serde_json::json!({"data": 1, "isError": false, "errorStatus": "", "errorMessage": ""})
        );
    }

    #[test]
    fn errors_map_to_http_status() {
        let cases = [
            (OmniError::not_found("interaction", 1), StatusCode::NOT_FOUND, ErrorStatus::DataNotFound),
            (
                OmniError::InvalidPayload("x".into()),
                StatusCode::BAD_REQUEST,
                ErrorStatus::FailedBindJson,
            ),
            (
                OmniError::Rule(RuleViolation::ChannelAccountMismatch),
                StatusCode::BAD_REQUEST,
                ErrorStatus::ChannelAccountNotMatch,
            ),
            (
                OmniError::Crm { message: "500".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorStatus::CrmResponseError,
            ),
            (
                OmniError::Internal("boom".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorStatus::SystemBusy,
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(ApiError::from(err), ApiError::new(status, code));
        }
    }
}
