use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
#[cfg(test)]
pub mod memory;
mod pages;
pub mod repo;
pub mod repo_types;
#[cfg(test)]
pub(crate) mod test_support;
mod validation;
pub mod verification;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::account_routes())
        .merge(verification::verification_routes())
}
