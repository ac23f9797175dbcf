use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod jwt;
mod mailer;
mod password;
pub mod repo;

pub use dto::Role;
pub use jwt::{AuthUser, Staff};
pub(crate) use password::is_valid_email;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
