#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use rocket::tokio;

    use crate::db::{get_submission, list_submissions};
    use crate::error::AppError;
    use crate::models::DeliveryStatus;
    use crate::pipeline::{PipelineStage, SubmissionRequest, resend, submit};
    use crate::test::test_utils::{
        NotifierBehaviour, RecordingNotifier, context, drawn_signature, jane_doe, setup_test_db,
        test_composer, test_mail_settings, write_template,
    };

    fn request() -> SubmissionRequest {
        SubmissionRequest {
            fields: jane_doe(),
            signature: Some(drawn_signature()),
        }
    }

    #[tokio::test]
    async fn test_valid_submission_is_stored_and_mailed() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        let receipt = submit(&ctx, request()).await.expect("submission succeeds");
        assert_eq!(receipt.stage, PipelineStage::Notified);

        let stored = get_submission(&pool, receipt.id).await.expect("stored");
        assert_eq!(stored.fields, jane_doe());
        assert!(stored.signature.is_some());
        assert_eq!(stored.delivery_status, DeliveryStatus::Sent);

        let sent = notifier.attempts();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to_address, "john@example.com");
        assert_eq!(sent[0].subject, mail.subject);
        assert_eq!(sent[0].attachment_name, "Jane Doe_form.pdf");
        assert!(sent[0].attachment.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_invalid_phone_stops_before_storage() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        let mut request = request();
        request.fields.wa_number = "12345".to_string();

        assert!(matches!(
            submit(&ctx, request).await,
            Err(AppError::InvalidPhone)
        ));
        assert!(list_submissions(&pool).await.expect("list").is_empty());
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_missing_field_stops_before_storage() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        let mut request = request();
        request.fields.student_name = String::new();

        assert!(matches!(
            submit(&ctx, request).await,
            Err(AppError::MissingField(field)) if field == "student_name"
        ));
        assert!(list_submissions(&pool).await.expect("list").is_empty());
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_unavailable_store_stops_before_mail() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        pool.close().await;

        assert!(matches!(
            submit(&ctx, request()).await,
            Err(AppError::Store(_))
        ));
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_mail_credentials_leave_row_marked_failed() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::RejectCredentials);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        let result = submit(&ctx, request()).await;
        assert!(matches!(result, Err(AppError::MailAuth(_))));

        let stored = list_submissions(&pool).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fields, jane_doe());
        assert_eq!(stored[0].delivery_status, DeliveryStatus::Failed);

        let attempts = notifier.attempts();
        assert_eq!(attempts.len(), 1);
        assert!(attempts[0].attachment.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_missing_template_leaves_row_and_skips_mail() {
        let pool = setup_test_db().await;
        let composer = test_composer(&PathBuf::from("/nonexistent/konfirmasi.pdf"));
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        assert!(matches!(
            submit(&ctx, request()).await,
            Err(AppError::TemplateMissing(_))
        ));

        let stored = list_submissions(&pool).await.expect("list");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].delivery_status, DeliveryStatus::Failed);
        assert!(notifier.attempts().is_empty());
    }

    #[tokio::test]
    async fn test_blank_signature_is_stored_as_absent() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        let mut request = request();
        if let Some(raster) = request.signature.as_mut() {
            raster.rgba.fill(255);
        }

        let receipt = submit(&ctx, request).await.expect("submission succeeds");
        let stored = get_submission(&pool, receipt.id).await.expect("stored");
        assert_eq!(stored.signature, None);
    }

    #[tokio::test]
    async fn test_resend_after_failed_delivery() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let mail = test_mail_settings();

        let failing = RecordingNotifier::new(NotifierBehaviour::DropConnection);
        let id = {
            let ctx = context(&pool, &composer, &failing, &mail);
            assert!(matches!(
                submit(&ctx, request()).await,
                Err(AppError::Delivery(_))
            ));
            list_submissions(&pool).await.expect("list")[0].id
        };

        let working = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let ctx = context(&pool, &composer, &working, &mail);
        let receipt = resend(&ctx, id).await.expect("resend succeeds");

        assert_eq!(receipt.id, id);
        assert_eq!(receipt.stage, PipelineStage::Notified);
        assert_eq!(working.attempts().len(), 1);
        assert_eq!(
            get_submission(&pool, id).await.expect("stored").delivery_status,
            DeliveryStatus::Sent
        );
        assert_eq!(list_submissions(&pool).await.expect("list").len(), 1);
    }

    #[tokio::test]
    async fn test_resend_of_unknown_id_is_not_found() {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let composer = test_composer(template.path());
        let notifier = RecordingNotifier::new(NotifierBehaviour::Deliver);
        let mail = test_mail_settings();
        let ctx = context(&pool, &composer, &notifier, &mail);

        assert!(matches!(resend(&ctx, 99).await, Err(AppError::NotFound(_))));
        assert!(notifier.attempts().is_empty());
    }
}
