// routes.rs
use std::{sync::Arc, time::Duration};

use axum::{
    routing::{get, patch, post},
    Router,
};
use http::{
    header::{AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{handlers, state::AppState, store::Store};

pub fn create_routes<S: Store>(state: Arc<AppState<S>>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/accounts/register", post(handlers::register::<S>))
        .route("/api/accounts/login", post(handlers::login::<S>))
        .route("/api/accounts/me", get(handlers::me::<S>))
        .route(
            "/api/polls",
            get(handlers::list_polls::<S>).post(handlers::create_poll::<S>),
        )
        .route("/api/polls/my-polls", get(handlers::my_polls::<S>))
        .route(
            "/api/polls/{id}",
            get(handlers::get_poll::<S>)
                .patch(handlers::update_poll::<S>)
                .delete(handlers::delete_poll::<S>),
        )
        .route(
            "/api/polls/{id}/toggle-visibility",
            patch(handlers::toggle_visibility::<S>),
        )
        .route("/api/polls/{id}/vote", post(handlers::cast_vote::<S>))
        .route("/api/polls/{id}/results", get(handlers::poll_results::<S>))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
