use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::MarketError;

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: Vec<String>,
}

fn body_for(err: &MarketError) -> ErrorBody {
    let message = match err {
        MarketError::Validation { message, .. } => message.clone(),
        MarketError::Internal(_) => "Internal server error".to_string(),
        other => other.to_string(),
    };

    ErrorBody {
        code: err.code().as_str(),
        message,
        details: err.details(),
    }
}

impl IntoResponse for MarketError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code().http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(code = self.code().as_str(), error = %self, "request rejected");
        }

        (status, Json(ErrorEnvelope { error: body_for(&self) })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_keeps_every_detail() {
        let err = MarketError::validation(
            "Validation Error",
            vec![
                "Job completion state not progressive.".to_string(),
                "Job completion state is out of bound (> 10).".to_string(),
            ],
        );
        let body = body_for(&err);
        assert_eq!(body.code, "VALIDATION_ERROR");
        assert_eq!(body.message, "Validation Error");
        assert_eq!(body.details.len(), 2);
    }

    #[test]
    fn internal_errors_do_not_leak() {
        let err = MarketError::Internal(anyhow::anyhow!("connection refused to 10.0.0.3"));
        let body = body_for(&err);
        assert_eq!(body.code, "INTERNAL_ERROR");
        assert_eq!(body.message, "Internal server error");
    }

    #[test]
    fn statuses_follow_the_error_code() {
        let resp = MarketError::Conflict("Job is already in the desired state.".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let resp = MarketError::Dependency("Technician bank account not found".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let resp = MarketError::Unauthorized.into_response();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
