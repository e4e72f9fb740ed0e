use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::forms::ValidationErrors;

/// Every failure a request can end with.
#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("{entity} with id = {id} does not exist")]
    NotFound { entity: &'static str, id: i32 },

    #[error("no route matches {0}")]
    RouteNotFound(String),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("malformed request body: {0}")]
    BadRequest(String),

    #[error("method not allowed, expected one of: {0}")]
    MethodNotAllowed(&'static str),

    #[error("storage is temporarily unavailable")]
    Unavailable,

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("blocking task failed: {0}")]
    Blocking(#[from] actix_web::error::BlockingError),
}

impl AppError {
    pub(crate) fn not_found(entity: &'static str, id: i32) -> Self {
        AppError::NotFound { entity, id }
    }

    /// Whether this error says something about the health of storage,
    /// as opposed to the request that was made against it.
    pub(crate) fn is_storage_failure(&self) -> bool {
        use diesel::result::{DatabaseErrorKind, Error as DieselError};

        match self {
            AppError::Pool(_) => true,
            AppError::Database(DieselError::NotFound) => false,
            AppError::Database(DieselError::DatabaseError(kind, _)) => !matches!(
                kind,
                DatabaseErrorKind::UniqueViolation
                    | DatabaseErrorKind::ForeignKeyViolation
                    | DatabaseErrorKind::NotNullViolation
                    | DatabaseErrorKind::CheckViolation
            ),
            AppError::Database(_) => true,
            _ => false,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound { .. } | AppError::RouteNotFound(_) => "not_found",
            AppError::Validation(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::MethodNotAllowed(_) => "method_not_allowed",
            AppError::Unavailable => "service_unavailable",
            AppError::Database(_)
            | AppError::Pool(_)
            | AppError::Migration(_)
            | AppError::Blocking(_) => "internal_error",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    status: u16,
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<&'a ValidationErrors>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound { .. } | AppError::RouteNotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let message = if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            log::error!("request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        let fields = match self {
            AppError::Validation(errors) => Some(errors),
            _ => None,
        };
        let mut response = HttpResponse::build(status);
        if let AppError::MethodNotAllowed(allowed) = self {
            response.insert_header((header::ALLOW, *allowed));
        }
        response.json(ErrorBody {
            status: status.as_u16(),
            error: self.kind(),
            message,
            fields,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::not_found("recipe", 1).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            AppError::from(ValidationErrors::field("name", "required")).status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::MethodNotAllowed("GET").status_code(),
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(AppError::Unavailable.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            AppError::Database(DieselError::RollbackTransaction).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_request_errors_do_not_count_as_storage_failures() {
        assert!(!AppError::not_found("ingredient", 7).is_storage_failure());
        assert!(!AppError::from(ValidationErrors::field("size", "required")).is_storage_failure());
        assert!(!AppError::Database(DieselError::NotFound).is_storage_failure());
        assert!(!AppError::Database(DieselError::DatabaseError(
            DatabaseErrorKind::ForeignKeyViolation,
            Box::new("FOREIGN KEY constraint failed".to_string()),
        ))
        .is_storage_failure());
        assert!(AppError::Database(DieselError::BrokenTransactionManager).is_storage_failure());
    }

    #[test]
    fn test_not_found_message() {
        assert_eq!(
            AppError::not_found("recipe", 42).to_string(),
            "recipe with id = 42 does not exist"
        );
    }
}
