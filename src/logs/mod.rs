mod dto;
pub mod duration;
pub mod handlers;
pub mod policy;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::log_routes()
}
