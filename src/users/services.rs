use tracing::{info, instrument};

use super::{
    password::hash_secret,
    repo_types::{NewUser, UpdatedUser, UserPatch, UserRecord},
};
use crate::{error::AppError, images::dto::UploadedImage, state::AppState};

const MIN_NAME_CHARS: usize = 3;
const MAX_NAME_CHARS: usize = 100;
const MIN_SECRET_CHARS: usize = 6;
const MAX_SECRET_CHARS: usize = 256;

pub struct CreateUser {
    pub name: String,
    pub secret: String,
    pub image: Option<UploadedImage>,
}

/// Every field is optional; absent fields keep their stored value.
#[derive(Default)]
pub struct UpdateUser {
    pub name: Option<String>,
    pub secret: Option<String>,
    pub image: Option<UploadedImage>,
    pub remove_image: bool,
}

pub(crate) fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    let len = name.chars().count();
    if len < MIN_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "name must be at least {} characters",
            MIN_NAME_CHARS
        )));
    }
    if len > MAX_NAME_CHARS {
        return Err(AppError::Validation(format!(
            "name must be at most {} characters",
            MAX_NAME_CHARS
        )));
    }
    Ok(name.to_string())
}

pub(crate) fn validate_secret(secret: &str) -> Result<(), AppError> {
    let len = secret.chars().count();
    if len < MIN_SECRET_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at least {} characters",
            MIN_SECRET_CHARS
        )));
    }
    if len > MAX_SECRET_CHARS {
        return Err(AppError::Validation(format!(
            "password must be at most {} characters",
            MAX_SECRET_CHARS
        )));
    }
    Ok(())
}

pub async fn list_users(st: &AppState) -> Result<Vec<UserRecord>, AppError> {
    Ok(st.users.list().await?)
}

pub async fn get_user(st: &AppState, id: &str) -> Result<UserRecord, AppError> {
    st.users.get(id).await?.ok_or(AppError::NotFound)
}

/// Validates, stores the avatar (if any), then inserts. A failed upload
/// creates no record; a failed insert releases the stored avatar.
#[instrument(skip(st, input), fields(user_name = %input.name))]
pub async fn create_user(st: &AppState, input: CreateUser) -> Result<UserRecord, AppError> {
    let name = validate_name(&input.name)?;
    validate_secret(&input.secret)?;
    let secret_hash = hash_secret(input.secret).await?;

    let image = match input.image {
        Some(upload) => Some(st.images.ingest(upload).await?.path),
        None => None,
    };

    let inserted = st
        .users
        .insert(NewUser {
            name,
            secret_hash,
            image: image.clone(),
        })
        .await;

    match inserted {
        Ok(user) => {
            info!(user_id = %user.id, has_image = user.image.is_some(), "user created");
            Ok(user)
        }
        Err(e) => {
            if let Some(path) = image {
                st.images.release(&path).await;
            }
            Err(e.into())
        }
    }
}

/// Applies the provided fields. A new avatar is stored before the record is
/// touched. The avatar the commit displaced, as reported by the store, is
/// released afterwards.
#[instrument(skip(st, input))]
pub async fn update_user(
    st: &AppState,
    id: &str,
    input: UpdateUser,
) -> Result<UserRecord, AppError> {
    let current = get_user(st, id).await?;

    let mut patch = UserPatch::default();
    if let Some(name) = input.name.as_deref() {
        patch.name = Some(validate_name(name)?);
    }
    if let Some(secret) = input.secret {
        validate_secret(&secret)?;
        patch.secret_hash = Some(hash_secret(secret).await?);
    }

    let new_image = match input.image {
        Some(upload) => Some(st.images.ingest(upload).await?.path),
        None => None,
    };
    if let Some(path) = &new_image {
        patch.image = Some(Some(path.clone()));
    } else if input.remove_image {
        patch.image = Some(None);
    }

    if patch.is_empty() {
        return Ok(current);
    }

    let UpdatedUser {
        user: updated,
        previous_image,
    } = match st.users.update(id, patch).await {
        Ok(Some(updated)) => updated,
        result => {
            if let Some(path) = &new_image {
                st.images.release(path).await;
            }
            return Err(match result {
                Err(e) => e.into(),
                Ok(_) => AppError::NotFound,
            });
        }
    };

    if let Some(old) = previous_image {
        if updated.image.as_deref() != Some(old.as_str()) {
            st.images.release(&old).await;
        }
    }

    info!(user_id = %updated.id, "user updated");
    Ok(updated)
}

/// Removes the record and then its avatar.
#[instrument(skip(st))]
pub async fn delete_user(st: &AppState, id: &str) -> Result<UserRecord, AppError> {
    let removed = st.users.delete(id).await?.ok_or(AppError::NotFound)?;
    if let Some(path) = removed.image.as_deref() {
        st.images.release(path).await;
    }
    info!(user_id = %removed.id, "user deleted");
    Ok(removed)
}
