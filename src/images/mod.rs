pub mod dto;
pub mod handlers;
pub mod sanitize;
pub mod services;
pub mod transform;

use crate::state::AppState;
use axum::Router;

pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new().merge(handlers::upload_routes(body_limit))
}
