use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use state::AppState;

pub fn create_app(state: AppState) -> Router {
    // TODO: restrict origins once the frontend domain is fixed
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(routes::auth::routes())
        .merge(routes::user::routes())
        .merge(routes::vote::routes())
        .merge(routes::rating::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
