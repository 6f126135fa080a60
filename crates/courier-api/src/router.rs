use axum::{
    Json, Router, middleware,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{auth, messages, users};

/// All routes, nested under `/api`. Everything except health and auth
/// requires a bearer token.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    // `{id}` is a peer id for GET and a message id for PUT/DELETE.
    let protected_routes = Router::new()
        .route("/users/me", get(users::get_me).put(users::update_me))
        .route("/users/search", get(users::search_users))
        .route("/users/{id}", get(users::get_user))
        .route("/messages", post(messages::send_message))
        .route("/messages/conversations", get(messages::list_conversations))
        .route(
            "/messages/{id}",
            get(messages::list_messages)
                .put(messages::edit_message)
                .delete(messages::delete_message),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
