use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::{self, AuthState};

pub fn auth_routes(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(handlers::login))
        .route("/validate", get(handlers::validate))
        .with_state(state)
}
