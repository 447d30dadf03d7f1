use chrono::{DateTime, Utc};

#[derive(sqlx::FromRow, Clone)]
pub struct DbAdminSession {
    pub id: Option<i64>,
    pub token: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct AdminSession {
    pub id: i64,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn generate_token() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    pub fn is_valid(&self) -> bool {
        self.expires_at > Utc::now()
    }
}

impl From<DbAdminSession> for AdminSession {
    fn from(session: DbAdminSession) -> Self {
        Self {
            id: session.id.unwrap_or_default(),
            token: session.token.unwrap_or_default(),
            created_at: session.created_at.unwrap_or_else(Utc::now),
            // A row without an expiry is treated as already expired.
            expires_at: session.expires_at.unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }
}
