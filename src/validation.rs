use crate::error::AppError;
use crate::models::SubmissionFields;
use once_cell::sync::Lazy;
use regex::Regex;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::instrument;
use validator::{Validate, ValidationErrors};

pub static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").expect("phone pattern compiles"));

pub static EMAIL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+$").expect("email pattern compiles"));

const REQUIRED_FIELDS: [&str; 4] = ["student_name", "parent_name", "wa_number", "email"];

/// Checks a normalized form. Missing fields win over format errors, and the
/// phone is checked before the email.
#[instrument(skip_all)]
pub fn validate_fields(fields: &SubmissionFields) -> Result<(), AppError> {
    match fields.validate() {
        Ok(()) => Ok(()),
        Err(errors) => Err(first_rejection(&errors)),
    }
}

fn first_rejection(errors: &ValidationErrors) -> AppError {
    let field_errors = errors.field_errors();
    let has_code = |field: &str, code: &str| {
        field_errors
            .get(field)
            .is_some_and(|errs| errs.iter().any(|e| e.code == code))
    };

    if let Some(field) = REQUIRED_FIELDS
        .iter()
        .find(|field| has_code(*field, "missing_field"))
    {
        return AppError::MissingField(field.to_string());
    }

    if has_code("wa_number", "invalid_phone") {
        return AppError::InvalidPhone;
    }

    if has_code("email", "invalid_email") {
        return AppError::InvalidEmail;
    }

    AppError::Validation(errors.to_string())
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ValidationResponse {
    pub status: String,
    pub errors: HashMap<String, Vec<String>>,
}

impl ValidationResponse {
    pub fn new(errors: HashMap<String, Vec<String>>) -> Self {
        Self {
            status: "error".to_string(),
            errors,
        }
    }

    pub fn with_error(field: &str, message: &str) -> Self {
        let mut errors = HashMap::new();
        errors.insert(field.to_string(), vec![message.to_string()]);
        Self::new(errors)
    }
}

pub trait ToValidationResponse {
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>>;
}

impl ToValidationResponse for AppError {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        self.log_and_record("API Validation Error");
        let status = self.status_code();

        let (field, message) = match &self {
            AppError::MissingField(field) => (
                field.as_str(),
                "Please fill in all the required fields.".to_string(),
            ),
            AppError::InvalidPhone => ("wa_number", self.to_string()),
            AppError::InvalidEmail => ("email", self.to_string()),
            AppError::Validation(msg) => ("request", msg.clone()),
            AppError::Store(_) => (
                "server",
                "Your submission could not be saved. Please try again later.".to_string(),
            ),
            AppError::NotFound(msg) => ("resource", format!("Not found: {}", msg)),
            AppError::TemplateMissing(_) | AppError::Compose(_) => (
                "document",
                "Your submission was saved but the confirmation document could not be generated."
                    .to_string(),
            ),
            AppError::MailAuth(_) | AppError::Delivery(_) => (
                "email",
                "Your submission was saved but the confirmation email could not be sent."
                    .to_string(),
            ),
            AppError::Authentication(msg) => ("authentication", msg.clone()),
            AppError::Config(_) | AppError::Internal(_) => {
                ("server", "Internal server error".to_string())
            }
        };

        Custom(status, Json(ValidationResponse::with_error(field, &message)))
    }
}

impl ToValidationResponse for Status {
    #[instrument]
    fn to_validation_response(self) -> Custom<Json<ValidationResponse>> {
        let (field, message) = match self {
            Status::Unauthorized => ("authentication", "Authentication required"),
            Status::NotFound => ("resource", "Resource not found"),
            Status::BadRequest => ("request", "Bad request"),
            Status::UnprocessableEntity => ("validation", "Validation failed"),
            Status::InternalServerError => ("server", "Internal server error"),
            _ => ("error", "An error occurred"),
        };

        Custom(self, Json(ValidationResponse::with_error(field, message)))
    }
}

impl<'r> rocket::response::Responder<'r, 'static> for AppError {
    fn respond_to(self, req: &'r rocket::Request<'_>) -> rocket::response::Result<'static> {
        tracing::debug!(method = %req.method(), uri = %req.uri(), "Responding with error");
        self.to_validation_response().respond_to(req)
    }
}
