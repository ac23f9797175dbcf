use crate::state::AppState;
use axum::Router;

pub mod csv;
pub mod handlers;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
