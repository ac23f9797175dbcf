use crate::state::AppState;
use axum::Router;

pub mod doc;
pub mod handlers;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
