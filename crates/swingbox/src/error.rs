//! HTTP error mapping.

use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use swingdeck::DeckError;

use crate::library::LibraryError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Deck(#[from] DeckError),

    #[error(transparent)]
    Library(#[from] LibraryError),

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Query(#[from] QueryRejection),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Deck(e) => match e {
                DeckError::NotFound(_) => StatusCode::NOT_FOUND,
                DeckError::Decode { .. } | DeckError::Validation(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                DeckError::NothingLoaded => StatusCode::CONFLICT,
                DeckError::Output(_) | DeckError::Delivery(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Library(e) => match e {
                LibraryError::NotFound(_) => StatusCode::NOT_FOUND,
                LibraryError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
                LibraryError::ExternalTool { .. } => StatusCode::BAD_GATEWAY,
                LibraryError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Validation(_) | ApiError::Query(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Check that `value` lies in `range`; NaN never does.
pub fn check_range(
    what: &str,
    value: f32,
    range: std::ops::RangeInclusive<f32>,
) -> Result<f32, ApiError> {
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::Validation(format!(
            "{} must be between {} and {}, got {}",
            what,
            range.start(),
            range.end(),
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(DeckError::NotFound(PathBuf::from("x"))), 404),
            (ApiError::from(DeckError::NothingLoaded), 409),
            (ApiError::from(DeckError::Validation("bad".into())), 422),
            (
                ApiError::from(LibraryError::ExternalTool {
                    tool: "yt-dlp".into(),
                    message: "boom".into(),
                }),
                502,
            ),
            (ApiError::from(LibraryError::Validation("bad".into())), 422),
            (ApiError::Internal("x".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err}");
        }
    }

    #[test]
    fn test_check_range() {
        assert_eq!(check_range("pan", 0.5, -1.0..=1.0).unwrap(), 0.5);
        assert!(check_range("pan", 1.5, -1.0..=1.0).is_err());
        assert!(check_range("volume", f32::NAN, 0.0..=1.0).is_err());
    }
}
