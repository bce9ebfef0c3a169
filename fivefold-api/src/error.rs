//! HTTP error mapping.

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;

use crate::session::SessionError;
use fivefold_core::RejectionReason;

#[derive(Serialize)]
pub struct ErrorModel {
    pub detail: String,
    /// Machine-readable reason for rule rejections.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Session(err) => match err {
                SessionError::UnknownPlayer(_) => StatusCode::FORBIDDEN,
                SessionError::GameFull
                | SessionError::WaitingForOpponent
                | SessionError::NotYourTurn(_)
                | SessionError::Rejected(RejectionReason::GameOver { .. }) => StatusCode::CONFLICT,
                SessionError::Rejected(_) => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    fn reason(&self) -> Option<&'static str> {
        match self {
            ApiError::Session(SessionError::Rejected(reason)) => Some(reason.code()),
            ApiError::Session(_) => None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorModel {
            detail: self.to_string(),
            reason: self.reason(),
        };
        (self.status(), Json(body)).into_response()
    }
}
