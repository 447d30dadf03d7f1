use tracing::instrument;

use crate::error::AppError;
use crate::models::Submission;

pub const EXPORT_FILE_NAME: &str = "form_responses.csv";

const HEADERS: [&str; 8] = [
    "ID",
    "Grade",
    "Student Name",
    "Parent Name",
    "WA Active Parent",
    "Email Active Parent",
    "Delivery Status",
    "Timestamp",
];

/// All non-binary columns; the signature is left out.
#[instrument(skip_all, fields(rows = submissions.len()))]
pub fn submissions_to_csv(submissions: &[Submission]) -> Result<Vec<u8>, AppError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(HEADERS)?;

    for submission in submissions {
        let fields = &submission.fields;
        writer.write_record([
            submission.id.to_string().as_str(),
            fields.grade.as_str(),
            fields.student_name.as_str(),
            fields.parent_name.as_str(),
            fields.wa_number.as_str(),
            fields.email.as_str(),
            submission.delivery_status.as_str(),
            submission.created_at.to_rfc3339().as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| AppError::Internal(format!("Export error: {}", e)))
}
