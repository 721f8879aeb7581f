use crate::accounts::AccountError;
use crate::controller::QuizError;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;
use tracing::error;

#[derive(Debug, Clone, Serialize)]
pub struct ErrorDetail {
    pub field: String,
    pub issue: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub error: ErrorPayload,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorPayload {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
    pub details: Vec<ErrorDetail>,
    pub request_id: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: Vec::new(),
            request_id: request_id.into(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }

    pub fn unauthorized(request_id: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "not logged in", request_id)
    }

    pub fn from_quiz(err: QuizError, request_id: impl Into<String>) -> Self {
        let (status, code) = match &err {
            QuizError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            QuizError::UnknownQuestion(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            QuizError::Unanswered(_)
            | QuizError::NoInput(_)
            | QuizError::Inaccessible(_)
            | QuizError::NotAtLastQuestion
            | QuizError::AlreadyCompleted => (StatusCode::CONFLICT, "CONFLICT"),
        };
        Self::new(status, code, err.to_string(), request_id)
    }

    pub fn from_account(err: AccountError, request_id: impl Into<String>) -> Self {
        let request_id = request_id.into();
        let field = match &err {
            AccountError::MissingEmail | AccountError::InvalidEmail => Some("email"),
            AccountError::MissingPassword | AccountError::InvalidPassword => Some("password"),
            _ => None,
        };
        let (status, code) = match &err {
            AccountError::MissingEmail
            | AccountError::InvalidEmail
            | AccountError::MissingPassword
            | AccountError::InvalidPassword
            | AccountError::MissingFields => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AccountError::NoAccounts | AccountError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED")
            }
            AccountError::NoAccountData => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AccountError::Corrupt(_) | AccountError::Storage(_) => {
                error!(request_id = %request_id, "account storage failed: {}", err);
                return Self::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "account data could not be read or written",
                    request_id,
                );
            }
        };
        let details = vec![ErrorDetail {
            field: field.unwrap_or("credentials").to_string(),
            issue: err.title().to_string(),
        }];
        Self::new(status, code, err.to_string(), request_id).with_details(details)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let payload = ErrorBody {
            error: ErrorPayload {
                code: self.code,
                message: self.message,
                details: self.details,
                request_id: self.request_id,
            },
        };
        (self.status, Json(payload)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_errors_map_to_statuses() {
        let err = AppError::from_quiz(QuizError::Validation("bad age".into()), "r1");
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.message, "bad age");
        assert_eq!(
            AppError::from_quiz(QuizError::UnknownQuestion(9), "r1").status,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::from_quiz(QuizError::AlreadyCompleted, "r1").status,
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn account_errors_carry_title() {
        let err = AppError::from_account(AccountError::InvalidPassword, "r2");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.details[0].field, "password");
        assert_eq!(err.details[0].issue, "Invalid Password");
        assert_eq!(err.message, "Please enter a valid password.");

        let err = AppError::from_account(AccountError::InvalidCredentials, "r2");
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
        assert_eq!(err.details[0].issue, "Login Failed");
    }
}
