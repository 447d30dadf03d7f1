use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::AppError;
use crate::validation::{EMAIL_PATTERN, PHONE_PATTERN};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "Grade 7A")]
    Grade7A,
    #[serde(rename = "Grade 7B")]
    Grade7B,
    #[serde(rename = "Grade 8A")]
    Grade8A,
    #[serde(rename = "Grade 8B")]
    Grade8B,
    #[serde(rename = "Grade 9A")]
    Grade9A,
    #[serde(rename = "Grade 9B")]
    Grade9B,
    #[serde(rename = "Grade 10")]
    Grade10,
    #[serde(rename = "Grade 11")]
    Grade11,
    #[serde(rename = "Grade 12")]
    Grade12,
}

impl Grade {
    pub const ALL: [Grade; 9] = [
        Grade::Grade7A,
        Grade::Grade7B,
        Grade::Grade8A,
        Grade::Grade8B,
        Grade::Grade9A,
        Grade::Grade9B,
        Grade::Grade10,
        Grade::Grade11,
        Grade::Grade12,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::Grade7A => "Grade 7A",
            Grade::Grade7B => "Grade 7B",
            Grade::Grade8A => "Grade 8A",
            Grade::Grade8B => "Grade 8B",
            Grade::Grade9A => "Grade 9A",
            Grade::Grade9B => "Grade 9B",
            Grade::Grade10 => "Grade 10",
            Grade::Grade11 => "Grade 11",
            Grade::Grade12 => "Grade 12",
        }
    }
}

impl FromStr for Grade {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Grade::ALL
            .iter()
            .copied()
            .find(|grade| grade.as_str() == s)
            .ok_or_else(|| AppError::Validation(format!("Unknown grade: {}", s)))
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the confirmation document reached the parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "sent" => Ok(DeliveryStatus::Sent),
            "failed" => Ok(DeliveryStatus::Failed),
            _ => Err(AppError::Internal(format!("Unknown delivery status: {}", s))),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable, user-entered part of a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SubmissionFields {
    pub grade: Grade,
    #[validate(length(min = 1, code = "missing_field"))]
    pub student_name: String,
    #[validate(length(min = 1, code = "missing_field"))]
    pub parent_name: String,
    #[validate(
        length(min = 1, code = "missing_field"),
        regex(path = *PHONE_PATTERN, code = "invalid_phone")
    )]
    pub wa_number: String,
    #[validate(
        length(min = 1, code = "missing_field"),
        regex(path = *EMAIL_PATTERN, code = "invalid_email")
    )]
    pub email: String,
}

impl SubmissionFields {
    pub fn normalized(self) -> Self {
        Self {
            grade: self.grade,
            student_name: self.student_name.trim().to_string(),
            parent_name: self.parent_name.trim().to_string(),
            wa_number: self.wa_number.trim().to_string(),
            email: self.email.trim().to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub fields: SubmissionFields,
    pub signature: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub id: i64,
    pub fields: SubmissionFields,
    pub signature: Option<Vec<u8>>,
    pub delivery_status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
}

impl Submission {
    pub fn attachment_name(&self) -> String {
        format!("{}_form.pdf", self.fields.student_name)
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSubmission {
    pub id: Option<i64>,
    pub grade: Option<String>,
    pub student_name: Option<String>,
    pub parent_name: Option<String>,
    pub wa_number: Option<String>,
    pub email: Option<String>,
    pub signature: Option<Vec<u8>>,
    pub delivery_status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbSubmission> for Submission {
    type Error = AppError;

    fn try_from(db: DbSubmission) -> Result<Self, Self::Error> {
        let grade = Grade::from_str(&db.grade.unwrap_or_default())
            .map_err(|e| AppError::Internal(format!("Corrupt submission row: {}", e)))?;

        Ok(Self {
            id: db.id.unwrap_or_default(),
            fields: SubmissionFields {
                grade,
                student_name: db.student_name.unwrap_or_default(),
                parent_name: db.parent_name.unwrap_or_default(),
                wa_number: db.wa_number.unwrap_or_default(),
                email: db.email.unwrap_or_default(),
            },
            signature: db.signature,
            delivery_status: db
                .delivery_status
                .as_deref()
                .map(DeliveryStatus::from_str)
                .transpose()?
                .unwrap_or(DeliveryStatus::Pending),
            created_at: db.created_at.unwrap_or_else(Utc::now),
        })
    }
}

/// Raw pixels captured from the signature pad, RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRaster {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}
