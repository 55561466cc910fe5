//! Authentication route group, mounted at `/api/auth`.
//!
//! - `POST /register` create an account, returns a token
//! - `POST /login` exchange credentials for a token
//! - `GET /me` current user (bearer token required)

pub mod handlers;
pub mod middleware;
pub mod password;
pub mod store;
pub mod token;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub use middleware::{require_auth, AuthUser};
pub use token::{Claims, JwtAuth};

pub fn router(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/me", get(handlers::me))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .merge(protected)
}
