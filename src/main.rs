#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod composer;
mod config;
mod db;
mod env;
mod error;
mod export;
mod models;
mod notifier;
mod pipeline;
mod signature;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use anyhow::Context;
use api::{
    api_admin_login, api_admin_logout, api_delete_submission, api_export, api_grades,
    api_list_submissions, api_resend_submission, api_submit, api_update_submission,
    api_view_signature, api_view_submission, bad_request_api, health, unprocessable_api,
};
use auth::unauthorized_api;
use composer::DocumentComposer;
use config::{AdminCredentials, AppConfig, MailSettings};
use db::clean_expired_admin_sessions;
use notifier::{Notifier, SmtpNotifier};
use rocket::{Build, Rocket, tokio};
use telemetry::{TelemetryFairing, init_tracing};

use sqlx::SqlitePool;
use tracing::{error, info};

/// Collaborators the routes need besides the pool.
pub struct Services {
    pub composer: DocumentComposer,
    pub notifier: Box<dyn Notifier>,
    pub mail: MailSettings,
    pub admin: AdminCredentials,
}

impl Services {
    pub fn from_config(config: &AppConfig) -> Result<Self, error::AppError> {
        Ok(Self {
            composer: DocumentComposer::from_config(config)?,
            notifier: Box::new(SmtpNotifier::new(&config.smtp, &config.mail)?),
            mail: config.mail.clone(),
            admin: config.admin.clone(),
        })
    }
}

#[launch]
async fn rocket() -> _ {
    match startup().await {
        Ok((pool, services)) => init_rocket(pool, services).await,
        Err(e) => {
            error!("Startup failed: {:#}", e);
            panic!("Startup failed: {:#}", e);
        }
    }
}

async fn startup() -> anyhow::Result<(SqlitePool, Services)> {
    let environment = env::load_environment().context("Failed to load environment files")?;
    let config = AppConfig::from_env().context("Invalid configuration")?;

    init_tracing(config.otlp_endpoint.as_deref());
    environment.log();

    let pool = SqlitePool::connect(&config.database_url)
        .await
        .context("Failed to connect to SQLite database")?;

    info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Database migration failed")?;
    info!("Migrations completed successfully");

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_admin_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired admin sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired admin sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    let services = Services::from_config(&config).context("Failed to build services")?;

    Ok((pool, services))
}

pub async fn init_rocket(pool: SqlitePool, services: Services) -> Rocket<Build> {
    info!("Starting confirmation form service");

    rocket::build()
        .manage(pool)
        .manage(services.composer)
        .manage(services.notifier)
        .manage(services.mail)
        .manage(services.admin)
        .mount(
            "/api",
            routes![
                health,
                api_grades,
                api_submit,
                api_admin_login,
                api_admin_logout,
                api_list_submissions,
                api_view_submission,
                api_view_signature,
                api_update_submission,
                api_delete_submission,
                api_resend_submission,
                api_export,
            ],
        )
        .register(
            "/api",
            catchers![unauthorized_api, unprocessable_api, bad_request_api],
        )
        .attach(TelemetryFairing)
}
