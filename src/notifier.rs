use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::response::Code;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::config::{MailSettings, SmtpSettings};
use crate::error::AppError;

/// One outbound message with a single PDF attachment.
#[derive(Debug, Clone)]
pub struct OutgoingMail {
    pub to_address: String,
    pub subject: String,
    pub body: String,
    pub attachment: Vec<u8>,
    pub attachment_name: String,
}

#[rocket::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), AppError>;
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(smtp: &SmtpSettings, mail: &MailSettings) -> Result<Self, AppError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| AppError::Config(format!("Invalid SMTP relay {}: {}", smtp.host, e)))?
            .port(smtp.port)
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();

        let address = mail.from_address.parse().map_err(|e| {
            AppError::Config(format!("Invalid sender {}: {}", mail.from_address, e))
        })?;

        Ok(Self {
            transport,
            from: Mailbox::new(Some(mail.from_name.clone()), address),
        })
    }

    pub(crate) fn build_message(&self, mail: &OutgoingMail) -> Result<Message, AppError> {
        let to: Mailbox = mail
            .to_address
            .parse()
            .map_err(|e| AppError::Delivery(format!("Invalid recipient: {}", e)))?;

        let pdf = ContentType::parse("application/pdf")
            .map_err(|e| AppError::Internal(format!("Bad content type: {}", e)))?;

        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(mail.subject.clone())
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(
                        Attachment::new(mail.attachment_name.clone())
                            .body(mail.attachment.clone(), pdf),
                    ),
            )
            .map_err(|e| AppError::Delivery(format!("Cannot build message: {}", e)))
    }
}

#[rocket::async_trait]
impl Notifier for SmtpNotifier {
    #[instrument(skip_all, fields(attachment = %mail.attachment_name))]
    async fn send(&self, mail: &OutgoingMail) -> Result<(), AppError> {
        let message = self.build_message(mail)?;

        self.transport
            .send(message)
            .await
            .map_err(classify_smtp_error)?;

        info!("Confirmation email sent");
        Ok(())
    }
}

/// 530, 534 and 535 are the replies a relay gives to refused credentials.
pub(crate) fn is_credential_rejection(code: &Code) -> bool {
    matches!(code.to_string().as_str(), "530" | "534" | "535")
}

fn classify_smtp_error(error: lettre::transport::smtp::Error) -> AppError {
    if error.status().as_ref().is_some_and(is_credential_rejection) {
        AppError::MailAuth(error.to_string())
    } else {
        AppError::Delivery(error.to_string())
    }
}
