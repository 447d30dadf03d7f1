use serde::Serialize;
use sqlx::{Pool, Sqlite};
use tracing::{Instrument, error, info, info_span, instrument};

use crate::composer::DocumentComposer;
use crate::config::MailSettings;
use crate::db::{get_submission, insert_submission, set_delivery_status};
use crate::error::AppError;
use crate::models::{DeliveryStatus, NewSubmission, SignatureRaster, Submission, SubmissionFields};
use crate::notifier::{Notifier, OutgoingMail};
use crate::signature;
use crate::validation::validate_fields;

/// Steps a submission moves through. `Notified` is the only success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineStage {
    Received,
    Validated,
    Persisted,
    Composed,
    Notified,
}

/// Everything one submit needs, handed in per request.
pub struct SubmissionContext<'a> {
    pub db: &'a Pool<Sqlite>,
    pub composer: &'a DocumentComposer,
    pub notifier: &'a dyn Notifier,
    pub mail: &'a MailSettings,
}

#[derive(Debug)]
pub struct SubmissionRequest {
    pub fields: SubmissionFields,
    pub signature: Option<SignatureRaster>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmissionReceipt {
    pub id: i64,
    pub stage: PipelineStage,
}

#[instrument(skip_all, fields(grade = %request.fields.grade))]
pub async fn submit(
    ctx: &SubmissionContext<'_>,
    request: SubmissionRequest,
) -> Result<SubmissionReceipt, AppError> {
    let mut stage = PipelineStage::Received;
    let fields = request.fields.normalized();

    validate_fields(&fields)?;
    let signature = signature::encode(request.signature.as_ref())?;
    advance(&mut stage, PipelineStage::Validated);

    let submission = insert_submission(
        ctx.db,
        &NewSubmission {
            fields,
            signature,
        },
    )
    .await?;
    advance(&mut stage, PipelineStage::Persisted);

    deliver(ctx, &submission, &mut stage).await?;
    Ok(SubmissionReceipt {
        id: submission.id,
        stage,
    })
}

/// One more compose-and-send attempt for a stored submission.
#[instrument(skip(ctx))]
pub async fn resend(ctx: &SubmissionContext<'_>, id: i64) -> Result<SubmissionReceipt, AppError> {
    let submission = get_submission(ctx.db, id).await?;
    let mut stage = PipelineStage::Persisted;

    deliver(ctx, &submission, &mut stage).await?;
    Ok(SubmissionReceipt { id, stage })
}

/// Failures here leave the stored row in place, marked `failed`.
async fn deliver(
    ctx: &SubmissionContext<'_>,
    submission: &Submission,
    stage: &mut PipelineStage,
) -> Result<(), AppError> {
    let result = compose_and_send(ctx, submission, stage)
        .instrument(info_span!("deliver", submission_id = submission.id))
        .await;

    let status = match &result {
        Ok(()) => DeliveryStatus::Sent,
        Err(_) => DeliveryStatus::Failed,
    };

    if let Err(e) = set_delivery_status(ctx.db, submission.id, status).await {
        error!(submission_id = submission.id, error = %e, "Could not record delivery status");
    }

    if let Err(e) = &result {
        error!(
            submission_id = submission.id,
            stage = ?*stage,
            kind = e.kind(),
            "Submission stored but not delivered"
        );
    }

    result
}

async fn compose_and_send(
    ctx: &SubmissionContext<'_>,
    submission: &Submission,
    stage: &mut PipelineStage,
) -> Result<(), AppError> {
    let document = ctx.composer.compose(submission)?;
    advance(stage, PipelineStage::Composed);

    let mail = OutgoingMail {
        to_address: submission.fields.email.clone(),
        subject: ctx.mail.subject.clone(),
        body: ctx.mail.body.clone(),
        attachment: document,
        attachment_name: submission.attachment_name(),
    };

    ctx.notifier.send(&mail).await?;
    advance(stage, PipelineStage::Notified);

    Ok(())
}

fn advance(stage: &mut PipelineStage, next: PipelineStage) {
    info!(from = ?*stage, to = ?next, "Submission stage reached");
    *stage = next;
}
