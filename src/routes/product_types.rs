use axum::{
    routing::{get, post, put},
    Router, middleware,
};
use crate::handlers::product_type::{
    list_product_types, get_product_type, create_product_type, update_product_type, delete_product_type
};
use crate::middleware::auth::require_auth;
use crate::state::AppState;

pub fn routes(state: AppState) -> Router<AppState> {
    let open_routes = Router::new()
        .route("/product-types/", get(list_product_types))
        .route("/product-types/{id}/", get(get_product_type));

    let protected_routes = Router::new()
        .route("/product-types/", post(create_product_type))
        .route(
            "/product-types/{id}/",
            put(update_product_type).patch(update_product_type).delete(delete_product_type),
        )
        .layer(middleware::from_fn_with_state(state, require_auth));

    open_routes.merge(protected_routes)
}
