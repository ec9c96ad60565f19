// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Response envelope shared by HTTP-facing callers.

use crate::error::{ErrorKind, LedgerError};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub kind: ErrorKind,
    pub detail: String,
    pub retryable: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn from_error(err: &LedgerError) -> Self {
        Self {
            success: false,
            data: None,
            message: user_message(err.kind()).to_string(),
            error: Some(ErrorDetail {
                kind: err.kind(),
                detail: err.to_string(),
                retryable: err.is_retryable(),
            }),
        }
    }
}

/// Short human text per error kind; the detail carries the specifics.
pub fn user_message(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::NotFound => "Resource not found",
        ErrorKind::InvalidState => "Operation not allowed in the current state",
        ErrorKind::InsufficientFunds => "Insufficient balance",
        ErrorKind::Duplicate => "Already done",
        ErrorKind::Validation => "Invalid request",
        ErrorKind::Conflict => "Please try again",
        ErrorKind::Internal => "Internal error",
    }
}

/// HTTP status plus the serialized envelope for a ledger result.
pub fn respond<T: Serialize>(
    result: Result<T, LedgerError>,
    message: &str,
) -> serde_json::Result<(u16, String)> {
    match result {
        Ok(data) => Ok((200, serde_json::to_string(&ApiResponse::ok(data, message))?)),
        Err(e) => Ok((
            e.kind().http_status(),
            serde_json::to_string(&ApiResponse::from_error(&e))?,
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    #[test]
    fn error_envelope_carries_kind_and_status() {
        let err = LedgerError::insufficient(Decimal::from(20_000), Decimal::from(80_000));
        let (status, body) = respond::<()>(Err(err), "purchase").unwrap();
        assert_eq!(status, 422);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"]["kind"], "insufficient_funds");
        assert!(v.get("data").is_none());
    }

    #[test]
    fn ok_envelope() {
        let (status, body) = respond(Ok(vec![1, 2]), "listed").unwrap();
        assert_eq!(status, 200);
        let v: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["message"], "listed");
        assert_eq!(v["data"][1], 2);
    }

    #[test]
    fn conflict_is_503_and_retryable() {
        let resp = ApiResponse::from_error(&LedgerError::Conflict("busy".into()));
        let detail = resp.error.unwrap();
        assert_eq!(detail.kind.http_status(), 503);
        assert!(detail.retryable);
    }
}
