use opentelemetry_semantic_conventions::{attribute::OTEL_STATUS_CODE, trace::ERROR_TYPE};
use rocket::http::Status;
use thiserror::Error;
use tracing::{Span, error, warn};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Please enter a valid phone number in the format: +1234567890")]
    InvalidPhone,

    #[error("Please enter a valid email address")]
    InvalidEmail,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Template missing: {0}")]
    TemplateMissing(String),

    #[error("Document composition failed: {0}")]
    Compose(String),

    #[error("Mail authentication rejected: {0}")]
    MailAuth(String),

    #[error("Mail delivery failed: {0}")]
    Delivery(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::MissingField(_) => "missing_field",
            AppError::InvalidPhone => "invalid_phone",
            AppError::InvalidEmail => "invalid_email",
            AppError::Validation(_) => "validation_error",
            AppError::Store(_) => "store_error",
            AppError::NotFound(_) => "not_found_error",
            AppError::TemplateMissing(_) => "template_missing",
            AppError::Compose(_) => "compose_error",
            AppError::MailAuth(_) => "mail_auth_error",
            AppError::Delivery(_) => "delivery_error",
            AppError::Authentication(_) => "authentication_error",
            AppError::Config(_) => "config_error",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Input errors the submitter can fix and resubmit.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            AppError::MissingField(_)
                | AppError::InvalidPhone
                | AppError::InvalidEmail
                | AppError::Validation(_)
        )
    }

    pub fn log_and_record(&self, ctx: &str) {
        let current_span = Span::current();
        let is_valid_span = !current_span.is_none();

        let message = self.to_string();
        let error_kind = self.kind();

        match self {
            AppError::Store(err) => {
                error!(error = %message, context = %ctx, db_error = %err, "Storage error");
            }
            AppError::TemplateMissing(_)
            | AppError::Compose(_)
            | AppError::MailAuth(_)
            | AppError::Delivery(_)
            | AppError::Config(_)
            | AppError::Internal(_) => {
                error!(message = %message, context = %ctx, kind = error_kind, "Pipeline error");
            }
            _ => {
                warn!(message = %message, context = %ctx, kind = error_kind, "Request rejected");
            }
        }

        if is_valid_span {
            current_span.record("error", tracing::field::display(true));
            current_span.record(ERROR_TYPE, tracing::field::display(error_kind));
            current_span.record("error.message", tracing::field::display(&message));

            if !self.is_rejection()
                && !matches!(self, AppError::NotFound(_) | AppError::Authentication(_))
            {
                current_span.record(OTEL_STATUS_CODE, tracing::field::display("ERROR"));
            }
        }
    }

    pub fn status_code(&self) -> Status {
        match self {
            AppError::MissingField(_)
            | AppError::InvalidPhone
            | AppError::InvalidEmail
            | AppError::Validation(_) => Status::UnprocessableEntity,
            AppError::Store(_) => Status::InternalServerError,
            AppError::NotFound(_) => Status::NotFound,
            AppError::TemplateMissing(_) | AppError::Compose(_) => Status::InternalServerError,
            AppError::MailAuth(_) | AppError::Delivery(_) => Status::BadGateway,
            AppError::Authentication(_) => Status::Unauthorized,
            AppError::Config(_) | AppError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn to_status_with_log(&self, context: &str) -> Status {
        self.log_and_record(context);
        self.status_code()
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AppError::Internal(format!("Cryptography error: {}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {}", error))
    }
}

impl From<lopdf::Error> for AppError {
    fn from(error: lopdf::Error) -> Self {
        AppError::Compose(error.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(error: image::ImageError) -> Self {
        AppError::Validation(format!("Signature image error: {}", error))
    }
}

impl From<csv::Error> for AppError {
    fn from(error: csv::Error) -> Self {
        AppError::Internal(format!("Export error: {}", error))
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        err.to_status_with_log("Error conversion into Status")
    }
}
