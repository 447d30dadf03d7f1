#[cfg(test)]
pub mod test_utils {
    use std::path::Path;
    use std::sync::{Arc, Mutex, Once};

    use chrono::FixedOffset;
    use lopdf::{Dictionary, Document, Object, Stream, dictionary};
    use rocket::http::{ContentType, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::{Pool, Sqlite};
    use tempfile::NamedTempFile;

    use crate::Services;
    use crate::api::LoginResponse;
    use crate::composer::{DocumentComposer, TemplateLayout};
    use crate::config::{AdminCredentials, DEFAULT_BODY, DEFAULT_SUBJECT, MailSettings};
    use crate::error::AppError;
    use crate::init_rocket;
    use crate::models::{Grade, SignatureRaster, SubmissionFields};
    use crate::notifier::{Notifier, OutgoingMail};
    use crate::pipeline::SubmissionContext;

    static INIT: Once = Once::new();
    pub static ADMIN_USERNAME: &str = "admin";
    pub static ADMIN_PASSWORD: &str = "password123";

    pub fn init_test_logging() {
        INIT.call_once(|| {
            let _ = tracing_subscriber::fmt()
                .with_env_filter("debug")
                .with_test_writer()
                .try_init();
        });
    }

    pub async fn setup_test_db() -> Pool<Sqlite> {
        init_test_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    pub fn jane_doe() -> SubmissionFields {
        SubmissionFields {
            grade: Grade::Grade7A,
            student_name: "Jane Doe".to_string(),
            parent_name: "John Doe".to_string(),
            wa_number: "+628123456789".to_string(),
            email: "john@example.com".to_string(),
        }
    }

    /// A 40x10 pad with a black diagonal stroke on white.
    pub fn drawn_signature() -> SignatureRaster {
        let (width, height) = (40u32, 10u32);
        let mut rgba = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            for x in 0..width {
                if x / 4 == y {
                    rgba.extend_from_slice(&[0, 0, 0, 255]);
                } else {
                    rgba.extend_from_slice(&[255, 255, 255, 255]);
                }
            }
        }
        SignatureRaster {
            width,
            height,
            rgba,
        }
    }

    /// Writes a letter-size PDF with `page_count` pages, each carrying a line
    /// of its own text so the template content can be told apart from the overlay.
    pub fn write_template(page_count: usize) -> NamedTempFile {
        let mut doc = Document::with_version("1.5");

        let font_id = doc.add_object(
            dictionary! {"Type" => "Font", "Subtype" => "Type1", "BaseFont" => "Helvetica"},
        );
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => Object::Reference(font_id) },
        });

        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();

        for index in 0..page_count {
            let content = format!(
                "BT /F1 18 Tf 100 720 Td (Template page {}) Tj ET",
                index + 1
            );
            let content_id =
                doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => Object::Reference(pages_id),
                "Contents" => Object::Reference(content_id),
            });
            kids.push(Object::Reference(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count as i64,
                "Resources" => Object::Reference(resources_id),
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        });
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        doc.save_to(&mut file).expect("Failed to write template");
        file
    }

    pub fn test_composer(template: &Path) -> DocumentComposer {
        DocumentComposer::new(
            template.to_path_buf(),
            TemplateLayout::confirmation_form(),
            FixedOffset::east_opt(7 * 3600).expect("valid offset"),
        )
    }

    pub fn test_mail_settings() -> MailSettings {
        MailSettings {
            from_name: "Sekolah Harapan Bangsa".to_string(),
            from_address: "office@example.com".to_string(),
            subject: DEFAULT_SUBJECT.to_string(),
            body: DEFAULT_BODY.to_string(),
        }
    }

    pub fn test_admin_credentials() -> AdminCredentials {
        AdminCredentials {
            username: ADMIN_USERNAME.to_string(),
            password_hash: bcrypt::hash(ADMIN_PASSWORD, 4).expect("Failed to hash password"),
        }
    }

    #[derive(Clone, Copy, Debug)]
    pub enum NotifierBehaviour {
        Deliver,
        RejectCredentials,
        DropConnection,
    }

    /// Records every message handed to it, whether or not it "delivers".
    #[derive(Clone)]
    pub struct RecordingNotifier {
        pub outbox: Arc<Mutex<Vec<OutgoingMail>>>,
        behaviour: NotifierBehaviour,
    }

    impl RecordingNotifier {
        pub fn new(behaviour: NotifierBehaviour) -> Self {
            Self {
                outbox: Arc::new(Mutex::new(Vec::new())),
                behaviour,
            }
        }

        pub fn attempts(&self) -> Vec<OutgoingMail> {
            self.outbox.lock().expect("outbox lock").clone()
        }
    }

    #[rocket::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, mail: &OutgoingMail) -> Result<(), AppError> {
            self.outbox.lock().expect("outbox lock").push(mail.clone());

            match self.behaviour {
                NotifierBehaviour::Deliver => Ok(()),
                NotifierBehaviour::RejectCredentials => Err(AppError::MailAuth(
                    "535 5.7.8 Username and Password not accepted".to_string(),
                )),
                NotifierBehaviour::DropConnection => {
                    Err(AppError::Delivery("connection reset".to_string()))
                }
            }
        }
    }

    pub fn context<'a>(
        pool: &'a Pool<Sqlite>,
        composer: &'a DocumentComposer,
        notifier: &'a RecordingNotifier,
        mail: &'a MailSettings,
    ) -> SubmissionContext<'a> {
        SubmissionContext {
            db: pool,
            composer,
            notifier,
            mail,
        }
    }

    pub struct TestApp {
        pub client: Client,
        pub pool: Pool<Sqlite>,
        pub notifier: RecordingNotifier,
        pub template: NamedTempFile,
    }

    pub async fn setup_test_client(behaviour: NotifierBehaviour) -> TestApp {
        let pool = setup_test_db().await;
        let template = write_template(1);
        let notifier = RecordingNotifier::new(behaviour);

        let services = Services {
            composer: test_composer(template.path()),
            notifier: Box::new(notifier.clone()),
            mail: test_mail_settings(),
            admin: test_admin_credentials(),
        };

        let client = Client::tracked(init_rocket(pool.clone(), services).await)
            .await
            .expect("valid rocket instance");

        TestApp {
            client,
            pool,
            notifier,
            template,
        }
    }

    pub async fn login_admin(client: &Client) {
        let response = client
            .post("/api/admin/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": ADMIN_USERNAME,
                    "password": ADMIN_PASSWORD
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok);
        let body: LoginResponse = response.into_json().await.expect("login response");
        assert!(body.success, "Admin login failed");
    }
}
