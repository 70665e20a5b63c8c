use axum::{Router, routing::post};
use crate::state::AppState;
use crate::handlers::auth::obtain_token;

pub fn routes() -> Router<AppState> {
    Router::new().route("/token-auth/", post(obtain_token))
}
