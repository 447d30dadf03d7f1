use std::path::PathBuf;

use chrono::FixedOffset;

use crate::error::AppError;

const DEFAULT_DATABASE_URL: &str = "sqlite://responses.db?mode=rwc";
const DEFAULT_TEMPLATE_PATH: &str = "konfirmasi.pdf";
const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_FROM_NAME: &str = "Sekolah Harapan Bangsa";
const DEFAULT_UTC_OFFSET_HOURS: i32 = 7;

pub const DEFAULT_SUBJECT: &str = "Form Email and WA Number Submission Confirmation";
pub const DEFAULT_BODY: &str = "Dear Parent/Guardian, here is your confirmation email and Whatsapp number, respectively. Thanks. Please find the attached PDF for your form submission.";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub template_path: PathBuf,
    pub template_layout_path: Option<PathBuf>,
    pub display_offset: FixedOffset,
    pub smtp: SmtpSettings,
    pub mail: MailSettings,
    pub admin: AdminCredentials,
    pub otlp_endpoint: Option<String>,
}

#[derive(Clone)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SmtpSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Sender identity and message text for confirmation emails.
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub from_name: String,
    pub from_address: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password_hash: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("username", &self.username)
            .field("password_hash", &"<redacted>")
            .finish()
    }
}

impl AdminCredentials {
    pub fn verify(&self, username: &str, password: &str) -> bool {
        if username != self.username {
            return false;
        }
        bcrypt::verify(password, &self.password_hash).unwrap_or(false)
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let smtp_username = required("SMTP_USERNAME")?;

        let port = match optional("SMTP_PORT") {
            Some(port) => port
                .parse::<u16>()
                .map_err(|e| AppError::Config(format!("SMTP_PORT is not a port: {}", e)))?,
            None => DEFAULT_SMTP_PORT,
        };

        let offset_hours = match optional("DISPLAY_UTC_OFFSET_HOURS") {
            Some(hours) => hours.parse::<i32>().map_err(|e| {
                AppError::Config(format!("DISPLAY_UTC_OFFSET_HOURS is not an integer: {}", e))
            })?,
            None => DEFAULT_UTC_OFFSET_HOURS,
        };
        let display_offset = FixedOffset::east_opt(offset_hours * 3600).ok_or_else(|| {
            AppError::Config(format!("UTC offset of {} hours is out of range", offset_hours))
        })?;

        Ok(Self {
            database_url: optional("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            template_path: optional("TEMPLATE_PATH")
                .unwrap_or_else(|| DEFAULT_TEMPLATE_PATH.to_string())
                .into(),
            template_layout_path: optional("TEMPLATE_LAYOUT_PATH").map(PathBuf::from),
            display_offset,
            mail: MailSettings {
                from_name: optional("MAIL_FROM_NAME")
                    .unwrap_or_else(|| DEFAULT_FROM_NAME.to_string()),
                from_address: optional("MAIL_FROM_ADDRESS")
                    .unwrap_or_else(|| smtp_username.clone()),
                subject: optional("MAIL_SUBJECT").unwrap_or_else(|| DEFAULT_SUBJECT.to_string()),
                body: optional("MAIL_BODY").unwrap_or_else(|| DEFAULT_BODY.to_string()),
            },
            smtp: SmtpSettings {
                host: optional("SMTP_HOST").unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                port,
                username: smtp_username,
                password: required("SMTP_PASSWORD")?,
            },
            admin: AdminCredentials {
                username: optional("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string()),
                password_hash: required("ADMIN_PASSWORD_HASH")?,
            },
            otlp_endpoint: optional("OTEL_EXPORTER_OTLP_ENDPOINT"),
        })
    }
}

fn optional(key: &str) -> Option<String> {
    dotenvy::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn required(key: &str) -> Result<String, AppError> {
    optional(key).ok_or_else(|| AppError::Config(format!("{} must be set", key)))
}
