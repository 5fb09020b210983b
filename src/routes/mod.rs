pub mod assets;
pub mod events;
pub mod posts;
pub mod profile;
pub mod users;

use axum::http::{header, HeaderValue};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Assemble the full application router: API routes, the realtime channel,
/// embedded assets, and the SPA fallback.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/assets/{*path}", get(assets::serve))
        .merge(users::router())
        .merge(profile::router())
        .merge(posts::router())
        .merge(events::router())
        .fallback(assets::spa_fallback)
        .layer(SetResponseHeaderLayer::if_not_present(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
