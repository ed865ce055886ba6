use std::{error::Error, fmt};

use actix_web::http::StatusCode;
use actix_web::{error, HttpResponse};
use serde_json::json;
use stockroom::error::StockroomError;
use tracing::{debug, error};

pub(crate) type Result<T, E = ApiError> = std::result::Result<T, E>;

#[derive(Debug)]
pub(crate) struct ApiError {
    pub(crate) msg: String,
    pub(crate) status: StatusCode,
}

impl ApiError {
    pub(crate) fn new(status: StatusCode, msg: &str) -> Self {
        Self {
            msg: msg.to_string(),
            status,
        }
    }

    pub(crate) fn forbidden(msg: &str) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }

    pub(crate) fn unauthorized(msg: &str) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, msg)
    }
}

impl Error for ApiError {}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Stockroom server error: {}", self.msg)
    }
}

impl error::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        self.status
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status).json(json!({ "error": self.msg }))
    }
}

impl From<StockroomError> for ApiError {
    fn from(e: StockroomError) -> Self {
        let status = match &e {
            StockroomError::NotFound(_) => StatusCode::NOT_FOUND,
            StockroomError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            StockroomError::CacheUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            StockroomError::Internal(_)
            | StockroomError::DbError(_)
            | StockroomError::SerDe(_)
            | StockroomError::Configuration(_)
            | StockroomError::MalformedHierarchy(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!("Returning StockroomError to caller: {e}");
        } else {
            debug!("Rejecting request: {e}");
        }
        ApiError {
            msg: e.to_string(),
            status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::ResponseError;

    #[test]
    fn maps_domain_errors_to_statuses() {
        let cases = [
            (StockroomError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (StockroomError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (
                StockroomError::MalformedHierarchy("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                StockroomError::Configuration("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (e, status) in cases {
            assert_eq!(ApiError::from(e).status_code(), status);
        }
        assert_eq!(
            ApiError::forbidden("no").status_code(),
            StatusCode::FORBIDDEN
        );
    }
}
