pub mod dto;
pub mod handlers;
pub mod memory;
pub mod mongo;
mod password;
pub mod pg;
pub mod repo;
pub mod repo_types;
pub mod services;

use crate::state::AppState;
use axum::Router;

pub fn router(body_limit: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(body_limit))
}
