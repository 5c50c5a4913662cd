use serde::Serialize;
use time::OffsetDateTime;

use super::repo_types::UserRecord;

/// What clients see of a user. The secret hash never leaves the server.
#[derive(Debug, Serialize)]
pub struct PublicUser {
    pub id: String,
    pub name: String,
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<UserRecord> for PublicUser {
    fn from(u: UserRecord) -> Self {
        Self {
            id: u.id,
            name: u.name,
            image: u.image,
            created_at: u.created_at,
        }
    }
}
