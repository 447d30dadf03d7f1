use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde_json::{Value, json};
use sqlx::SqlitePool;
use tracing::Instrument;

use crate::db::get_admin_session;

pub const SESSION_COOKIE: &str = "session_token";

/// Request guard for the admin action set.
#[derive(Debug, Clone)]
pub struct Admin {
    pub session_token: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        authenticate_admin(request)
            .instrument(tracing::info_span!("admin_auth_guard"))
            .await
    }
}

async fn authenticate_admin(request: &Request<'_>) -> Outcome<Admin, ()> {
    let token = request
        .cookies()
        .get_private(SESSION_COOKIE)
        .map(|c| c.value().to_string());

    let Some(token) = token else {
        return Outcome::Error((Status::Unauthorized, ()));
    };

    let db = match request.rocket().state::<SqlitePool>() {
        Some(pool) => pool,
        _ => {
            tracing::error!("Database pool not found in managed state");
            return Outcome::Error((Status::InternalServerError, ()));
        }
    };

    match get_admin_session(db, &token).await {
        Ok(session) if session.is_valid() => {
            tracing::info!(
                session_id = session.id,
                issued_at = %session.created_at,
                "Admin authenticated via session token"
            );
            Outcome::Success(Admin {
                session_token: session.token,
            })
        }
        Ok(session) => {
            tracing::warn!(session_id = session.id, "Admin session expired");
            Outcome::Error((Status::Unauthorized, ()))
        }
        Err(err) => {
            tracing::warn!(error = ?err, "Invalid admin session token");
            Outcome::Error((Status::Unauthorized, ()))
        }
    }
}

#[catch(401)]
pub fn unauthorized_api(_req: &Request) -> Custom<Json<Value>> {
    let error_json = json!({
        "error": "Unauthorized",
        "message": "Authentication required"
    });

    Custom(Status::Unauthorized, Json(error_json))
}
