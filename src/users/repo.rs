use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::info;

use super::{
    memory::MemoryUserRepo,
    mongo::MongoUserRepo,
    pg::PgUserRepo,
    repo_types::{NewUser, RepoError, UpdatedUser, UserPatch, UserRecord},
};
use crate::config::{DatabaseConfig, StoreBackend};

/// Persistence seam for user records. Each backend owns its id format and
/// reports malformed ids as `RepoError::InvalidId`.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Oldest first.
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError>;
    async fn get(&self, id: &str) -> Result<Option<UserRecord>, RepoError>;
    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepoError>;
    /// `Ok(None)` when no record has that id. The image reference held before
    /// the write is read atomically with it.
    async fn update(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UpdatedUser>, RepoError>;
    /// Returns the removed record so its asset can be released.
    async fn delete(&self, id: &str) -> Result<Option<UserRecord>, RepoError>;
    async fn close(&self);
    fn backend(&self) -> &'static str;
}

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<Arc<dyn UserRepo>> {
    let repo: Arc<dyn UserRepo> = match cfg.backend {
        StoreBackend::Postgres => {
            let url = cfg
                .database_url
                .as_deref()
                .context("DATABASE_URL is not set")?;
            Arc::new(PgUserRepo::connect(url, cfg.max_connections).await?)
        }
        StoreBackend::Mongo => {
            let uri = cfg.mongo_uri.as_deref().context("MONGO_URI is not set")?;
            Arc::new(MongoUserRepo::connect(uri, &cfg.mongo_database).await?)
        }
        StoreBackend::Memory => Arc::new(MemoryUserRepo::default()),
    };
    info!(backend = repo.backend(), "user store connected");
    Ok(repo)
}
