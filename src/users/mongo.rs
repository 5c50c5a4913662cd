use anyhow::Context;
use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document},
    options::{ClientOptions, FindOneAndUpdateOptions, FindOptions, ReturnDocument},
    Client, Collection,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use super::{
    repo::UserRepo,
    repo_types::{NewUser, RepoError, UpdatedUser, UserPatch, UserRecord},
};

const COLLECTION: &str = "users";

/// Shape of a document in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id")]
    id: ObjectId,
    name: String,
    secret_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<String>,
    created_at: BsonDateTime,
}

impl TryFrom<UserDocument> for UserRecord {
    type Error = RepoError;

    fn try_from(d: UserDocument) -> Result<Self, Self::Error> {
        let nanos = d.created_at.timestamp_millis() as i128 * 1_000_000;
        let created_at = OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .context("created_at out of range")?;
        Ok(Self {
            id: d.id.to_hex(),
            name: d.name,
            secret_hash: d.secret_hash,
            image: d.image,
            created_at,
        })
    }
}

fn parse_id(id: &str) -> Result<ObjectId, RepoError> {
    ObjectId::parse_str(id).map_err(|_| RepoError::InvalidId(id.to_string()))
}

/// `$set` / `$unset` document for a patch, `None` when nothing changes.
fn update_document(patch: &UserPatch) -> Option<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();
    if let Some(name) = &patch.name {
        set.insert("name", name.as_str());
    }
    if let Some(hash) = &patch.secret_hash {
        set.insert("secret_hash", hash.as_str());
    }
    match &patch.image {
        Some(Some(path)) => {
            set.insert("image", path.as_str());
        }
        Some(None) => {
            unset.insert("image", "");
        }
        None => {}
    }

    let mut update = Document::new();
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    (!update.is_empty()).then_some(update)
}

#[derive(Clone)]
pub struct MongoUserRepo {
    client: Client,
    users: Collection<UserDocument>,
}

impl MongoUserRepo {
    pub async fn connect(uri: &str, database: &str) -> anyhow::Result<Self> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("parse MONGO_URI")?;
        options.app_name = Some(env!("CARGO_PKG_NAME").to_string());
        let client = Client::with_options(options).context("build mongo client")?;

        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .context("ping mongo")?;
        info!(database, "connected to mongo");

        Ok(Self {
            users: db.collection(COLLECTION),
            client,
        })
    }
}

#[async_trait]
impl UserRepo for MongoUserRepo {
    async fn list(&self) -> Result<Vec<UserRecord>, RepoError> {
        let options = FindOptions::builder()
            .sort(doc! { "created_at": 1, "_id": 1 })
            .build();
        let docs: Vec<UserDocument> = self
            .users
            .find(None, options)
            .await
            .context("find users")?
            .try_collect()
            .await
            .context("read users cursor")?;
        docs.into_iter().map(UserRecord::try_from).collect()
    }

    async fn get(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        self.users
            .find_one(doc! { "_id": id }, None)
            .await
            .context("find user")?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn insert(&self, user: NewUser) -> Result<UserRecord, RepoError> {
        let doc = UserDocument {
            id: ObjectId::new(),
            name: user.name,
            secret_hash: user.secret_hash,
            image: user.image,
            created_at: BsonDateTime::now(),
        };
        self.users
            .insert_one(&doc, None)
            .await
            .context("insert user")?;
        doc.try_into()
    }

    async fn update(
        &self,
        id: &str,
        patch: UserPatch,
    ) -> Result<Option<UpdatedUser>, RepoError> {
        let oid = parse_id(id)?;
        let before = match update_document(&patch) {
            Some(update) => {
                // the pre-image is returned by the same atomic operation
                let options = FindOneAndUpdateOptions::builder()
                    .return_document(ReturnDocument::Before)
                    .build();
                self.users
                    .find_one_and_update(doc! { "_id": oid }, update, options)
                    .await
                    .context("update user")?
                    .map(UserRecord::try_from)
                    .transpose()?
            }
            None => self.get(id).await?,
        };
        Ok(before.map(|mut user| {
            let previous_image = patch.apply(&mut user);
            UpdatedUser {
                user,
                previous_image,
            }
        }))
    }

    async fn delete(&self, id: &str) -> Result<Option<UserRecord>, RepoError> {
        let id = parse_id(id)?;
        self.users
            .find_one_and_delete(doc! { "_id": id }, None)
            .await
            .context("delete user")?
            .map(UserRecord::try_from)
            .transpose()
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
        info!("mongo client shut down");
    }

    fn backend(&self) -> &'static str {
        "mongo"
    }
}
