use time::OffsetDateTime;

/// User record as every backend returns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,                 // backend-assigned, opaque to callers
    pub name: String,
    pub secret_hash: String,        // Argon2 PHC string, never exposed
    pub image: Option<String>,      // public path of the avatar asset
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub secret_hash: String,
    pub image: Option<String>,
}

/// Partial update. `image: Some(None)` clears the reference.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub name: Option<String>,
    pub secret_hash: Option<String>,
    pub image: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.secret_hash.is_none() && self.image.is_none()
    }

    /// Writes the patch into `user` and returns the image reference it held
    /// before.
    pub fn apply(self, user: &mut UserRecord) -> Option<String> {
        if let Some(name) = self.name {
            user.name = name;
        }
        if let Some(hash) = self.secret_hash {
            user.secret_hash = hash;
        }
        match self.image {
            Some(image) => std::mem::replace(&mut user.image, image),
            None => user.image.clone(),
        }
    }
}

/// A committed patch. `previous_image` is read in the same atomic step as
/// the write, so concurrent updates each see the reference they displaced.
#[derive(Debug, Clone)]
pub struct UpdatedUser {
    pub user: UserRecord,
    pub previous_image: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("invalid user id {0:?}")]
    InvalidId(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}
