//! Records route group, mounted at `/api/records`. Every route requires a
//! bearer token; records are only visible to their owner.

pub mod handlers;
pub mod store;

use axum::{middleware::from_fn_with_state, routing::get, Router};

use crate::auth::require_auth;
use crate::state::AppState;

pub use store::Record;

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list).post(handlers::create))
        .route(
            "/{id}",
            get(handlers::get).put(handlers::update).delete(handlers::delete),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
}
