use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::PublicUser,
    services::{self, CreateUser, UpdateUser},
};
use crate::{error::AppError, forms::FormData, state::AppState};

pub fn user_routes(body_limit: usize) -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
        .layer(DefaultBodyLimit::max(body_limit))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<PublicUser>>, AppError> {
    let users = services::list_users(&state).await?;
    Ok(Json(users.into_iter().map(PublicUser::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(services::get_user(&state, &id).await?.into()))
}

/// POST /users (multipart): `name`, `password`, optional file `image`.
#[instrument(skip(state, mp))]
pub async fn create_user(
    State(state): State<AppState>,
    mp: Multipart,
) -> Result<(StatusCode, HeaderMap, Json<PublicUser>), AppError> {
    let mut form = FormData::read(mp).await?;
    let input = CreateUser {
        name: form
            .text("name")
            .ok_or_else(|| AppError::Validation("name is required".into()))?
            .to_string(),
        secret: form
            .text("password")
            .ok_or_else(|| AppError::Validation("password is required".into()))?
            .to_string(),
        image: form.take_file("image"),
    };

    let user = services::create_user(&state, input).await?;

    let mut headers = HeaderMap::new();
    let location = format!("/api/v1/users/{}", user.id);
    if let Ok(value) = HeaderValue::from_str(&location) {
        headers.insert(header::LOCATION, value);
    }
    Ok((StatusCode::CREATED, headers, Json(user.into())))
}

/// PUT /users/:id (multipart): any of `name`, `password`, `image`,
/// `remove_image`. Blank fields are left as they are.
#[instrument(skip(state, mp))]
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mp: Multipart,
) -> Result<Json<PublicUser>, AppError> {
    let mut form = FormData::read(mp).await?;
    let input = UpdateUser {
        name: form.text("name").map(str::to_string),
        secret: form.text("password").map(str::to_string),
        image: form.take_file("image"),
        remove_image: form.flag("remove_image"),
    };

    let user = services::update_user(&state, &id, input).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    services::delete_user(&state, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
