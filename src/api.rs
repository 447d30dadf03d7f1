use chrono::Utc;
use rocket::http::{ContentType, Cookie, CookieJar, Header, SameSite, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::{Request, State};
use serde::{Deserialize, Serialize};
use sqlx::{Pool, Sqlite};
use tracing::info;

use crate::auth::{Admin, AdminSession, SESSION_COOKIE};
use crate::composer::DocumentComposer;
use crate::config::{AdminCredentials, MailSettings};
use crate::db::{
    create_admin_session, delete_submission, get_submission, invalidate_admin_session,
    list_submissions, update_submission,
};
use crate::error::AppError;
use crate::export::{EXPORT_FILE_NAME, submissions_to_csv};
use crate::models::{Grade, SignatureRaster, Submission, SubmissionFields};
use crate::notifier::Notifier;
use crate::pipeline::{
    PipelineStage, SubmissionContext, SubmissionReceipt, SubmissionRequest, resend, submit,
};
use crate::signature::SignaturePayload;
use crate::validation::{ToValidationResponse, ValidationResponse, validate_fields};

pub const SUCCESS_MESSAGE: &str =
    "Form submitted successfully! please kindly check your email. Thanks";

#[derive(Deserialize)]
pub struct SubmitRequest {
    #[serde(flatten)]
    pub fields: SubmissionFields,
    #[serde(default)]
    pub signature: Option<SignaturePayload>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct SubmitResponse {
    pub success: bool,
    pub id: i64,
    pub stage: String,
    pub message: String,
}

impl From<SubmissionReceipt> for SubmitResponse {
    fn from(receipt: SubmissionReceipt) -> Self {
        Self {
            success: receipt.stage == PipelineStage::Notified,
            id: receipt.id,
            stage: format!("{:?}", receipt.stage).to_lowercase(),
            message: SUCCESS_MESSAGE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SubmissionResponse {
    pub id: i64,
    pub grade: String,
    pub student_name: String,
    pub parent_name: String,
    pub wa_number: String,
    pub email: String,
    pub has_signature: bool,
    pub delivery_status: String,
    pub created_at: String,
}

impl From<Submission> for SubmissionResponse {
    fn from(submission: Submission) -> Self {
        Self {
            id: submission.id,
            grade: submission.fields.grade.to_string(),
            student_name: submission.fields.student_name,
            parent_name: submission.fields.parent_name,
            wa_number: submission.fields.wa_number,
            email: submission.fields.email,
            has_signature: submission.signature.is_some(),
            delivery_status: submission.delivery_status.to_string(),
            created_at: submission.created_at.to_rfc3339(),
        }
    }
}

#[derive(Deserialize)]
pub struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Responder)]
#[response(status = 200, content_type = "text/csv")]
pub struct CsvExport {
    body: Vec<u8>,
    disposition: Header<'static>,
}

fn submission_context<'a>(
    db: &'a State<Pool<Sqlite>>,
    composer: &'a State<DocumentComposer>,
    notifier: &'a State<Box<dyn Notifier>>,
    mail: &'a State<MailSettings>,
) -> SubmissionContext<'a> {
    SubmissionContext {
        db,
        composer,
        notifier: notifier.inner().as_ref(),
        mail,
    }
}

#[get("/health")]
pub fn health() -> Status {
    Status::Ok
}

#[get("/grades")]
pub fn api_grades() -> Json<Vec<&'static str>> {
    Json(Grade::ALL.iter().map(Grade::as_str).collect())
}

#[post("/submissions", data = "<request>")]
pub async fn api_submit(
    request: Json<SubmitRequest>,
    db: &State<Pool<Sqlite>>,
    composer: &State<DocumentComposer>,
    notifier: &State<Box<dyn Notifier>>,
    mail: &State<MailSettings>,
) -> Result<Json<SubmitResponse>, AppError> {
    let request = request.into_inner();
    let signature = request
        .signature
        .map(SignatureRaster::try_from)
        .transpose()?;

    let ctx = submission_context(db, composer, notifier, mail);
    let receipt = submit(
        &ctx,
        SubmissionRequest {
            fields: request.fields,
            signature,
        },
    )
    .await?;

    Ok(Json(SubmitResponse::from(receipt)))
}

#[post("/admin/login", data = "<login>")]
pub async fn api_admin_login(
    login: Json<LoginRequest>,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
    credentials: &State<AdminCredentials>,
) -> Result<Json<LoginResponse>, AppError> {
    if !credentials.verify(&login.username, &login.password) {
        tracing::warn!(username = %login.username, "Admin login rejected");
        return Ok(Json(LoginResponse {
            success: false,
            error: Some("Invalid username or password".to_string()),
        }));
    }

    let token = AdminSession::generate_token();
    let expires_at = Utc::now() + chrono::Duration::hours(1);
    create_admin_session(db, &token, expires_at).await?;

    let cookie = Cookie::build((SESSION_COOKIE, token))
        .same_site(SameSite::Lax)
        .http_only(true)
        .max_age(rocket::time::Duration::hours(1));
    cookies.add_private(cookie);

    info!(username = %login.username, "Admin logged in");
    Ok(Json(LoginResponse {
        success: true,
        error: None,
    }))
}

#[post("/admin/logout")]
pub async fn api_admin_logout(
    admin: Admin,
    cookies: &CookieJar<'_>,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    invalidate_admin_session(db, &admin.session_token).await?;
    cookies.remove_private(Cookie::build(SESSION_COOKIE));
    Ok(Status::Ok)
}

#[get("/admin/submissions")]
pub async fn api_list_submissions(
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<Vec<SubmissionResponse>>, AppError> {
    let submissions = list_submissions(db).await?;
    Ok(Json(
        submissions
            .into_iter()
            .map(SubmissionResponse::from)
            .collect(),
    ))
}

#[get("/admin/submissions/<id>")]
pub async fn api_view_submission(
    id: i64,
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let submission = get_submission(db, id).await?;
    Ok(Json(SubmissionResponse::from(submission)))
}

#[get("/admin/submissions/<id>/signature")]
pub async fn api_view_signature(
    id: i64,
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<(ContentType, Vec<u8>), AppError> {
    let submission = get_submission(db, id).await?;
    match submission.signature {
        Some(png) => Ok((ContentType::PNG, png)),
        None => Err(AppError::NotFound(format!(
            "Submission {} has no signature",
            id
        ))),
    }
}

#[put("/admin/submissions/<id>", data = "<fields>")]
pub async fn api_update_submission(
    id: i64,
    fields: Json<SubmissionFields>,
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let fields = fields.into_inner().normalized();
    validate_fields(&fields)?;

    update_submission(db, id, &fields).await?;

    let submission = get_submission(db, id).await?;
    Ok(Json(SubmissionResponse::from(submission)))
}

#[delete("/admin/submissions/<id>")]
pub async fn api_delete_submission(
    id: i64,
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
) -> Result<Status, AppError> {
    delete_submission(db, id).await?;
    Ok(Status::NoContent)
}

#[post("/admin/submissions/<id>/resend")]
pub async fn api_resend_submission(
    id: i64,
    _admin: Admin,
    db: &State<Pool<Sqlite>>,
    composer: &State<DocumentComposer>,
    notifier: &State<Box<dyn Notifier>>,
    mail: &State<MailSettings>,
) -> Result<Json<SubmitResponse>, AppError> {
    let ctx = submission_context(db, composer, notifier, mail);
    let receipt = resend(&ctx, id).await?;
    Ok(Json(SubmitResponse::from(receipt)))
}

#[get("/admin/export")]
pub async fn api_export(_admin: Admin, db: &State<Pool<Sqlite>>) -> Result<CsvExport, AppError> {
    let submissions = list_submissions(db).await?;
    let body = submissions_to_csv(&submissions)?;

    Ok(CsvExport {
        body,
        disposition: Header::new(
            "Content-Disposition",
            format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
        ),
    })
}

#[catch(422)]
pub fn unprocessable_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::UnprocessableEntity.to_validation_response()
}

#[catch(400)]
pub fn bad_request_api(_req: &Request) -> Custom<Json<ValidationResponse>> {
    Status::BadRequest.to_validation_response()
}
