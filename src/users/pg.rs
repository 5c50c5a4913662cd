use anyhow::Context;
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, FromRow, PgPool};
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{
    repo::UserRepo,
    repo_types::{NewUser, RepoError, UpdatedUser, UserPatch, UserRecord},
};

/// Row of the `users` table.
#[derive(Debug, Clone, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    secret_hash: String,
    image: Option<String>,
    created_at: OffsetDateTime,
}

impl From<UserRow> for UserRecord {
    fn from(r: UserRow) -> Self {
        Self {
            id: r.id.to_string(),
            name: r.name,
            secret_hash: r.secret_hash,
            image: r.image,
            created_at: r.created_at,
        }
    }
}

/// `UPDATE ... RETURNING` row: the new state plus the image it displaced.
#[derive(Debug, FromRow)]
struct UpdatedRow {
    #[sqlx(flatten)]
    user: UserRow,
    previous_image: Option<String>,
}

impl From<UpdatedRow> for UpdatedUser {
    fn from(r: UpdatedRow) -> Self {
        Self {
            user: r.user.into(),
            previous_image: r.previous_image,
        }
    }
}

fn parse_id(id: &str) -> Result<Uuid, RepoError> {
    Uuid::parse_str(id).map_err(|_| RepoError::InvalidId(id.to_string()))
}

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub async fn connect(database_url: &str, max_connections: u32) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db })
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, secret_hash, image, created_at
              FROM users
             ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list users")?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT id, name, secret_hash, image, created_at
              FROM users
             WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("get user")?;
        Ok(row.map(Into::into))
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (id, name, secret_hash, image, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, secret_hash, image, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.secret_hash)
        .bind(&user.image) // Option<String> → NULL allowed
        .bind(OffsetDateTime::now_utc())
        .fetch_one(&self.db)
        .await
        .context("insert user")?;
        Ok(row.into())
    }

    async fn update(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UpdatedUser>, RepoError> {
        let id = parse_id(id)?;
        let set_image = patch.image.is_some();
        // the locked sub-select pins the pre-update image for this row
        let row = sqlx::query_as::<_, UpdatedRow>(
            r#"
            UPDATE users AS u
               SET name        = COALESCE($2, u.name),
                   secret_hash = COALESCE($3, u.secret_hash),
                   image       = CASE WHEN $4::boolean THEN $5::text ELSE u.image END
              FROM (SELECT id, image FROM users WHERE id = $1 FOR UPDATE) AS old
             WHERE u.id = old.id
            RETURNING u.id, u.name, u.secret_hash, u.image, u.created_at,
                      old.image AS previous_image
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.secret_hash)
        .bind(set_image)
        .bind(patch.image.flatten())
        .fetch_optional(&self.db)
        .await
        .context("update user")?;
        Ok(row.map(Into::into))
    }

    async fn delete(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            DELETE FROM users
             WHERE id = $1
            RETURNING id, name, secret_hash, image, created_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("delete user")?;
        Ok(row.map(Into::into))
    }

    async fn close(&self) {
        self.db.close().await;
        info!("postgres pool closed");
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
