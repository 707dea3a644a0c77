use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config;
use crate::entities::{Entity, Organization, PerformanceAssessment, Reservation, Usage, User, Vehicle};
use crate::handlers::{protected, public};
use crate::middleware::jwt_auth_middleware;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let config = config::config();

    let api = Router::new()
        .merge(entity_routes::<Organization>())
        .merge(entity_routes::<Vehicle>())
        .merge(entity_routes::<Usage>())
        .merge(entity_routes::<PerformanceAssessment>())
        .merge(entity_routes::<Reservation>())
        .merge(entity_routes::<User>())
        // Identity is resolved before any handler runs
        .route_layer(middleware::from_fn(jwt_auth_middleware));

    let mut app = Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        // Protected
        .merge(api)
        .fallback(public::not_found)
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes));

    if config.security.enable_cors {
        app = app.layer(cors_layer(&config.security.cors_origins));
    }
    if config.api.enable_request_logging {
        app = app.layer(TraceLayer::new_for_http());
    }

    app.with_state(state)
}

/// Collection and record routes for one entity; every method reaches the
/// handler so unsupported ones get the uniform 405 body
fn entity_routes<E: Entity>() -> Router<AppState> {
    let base = format!("/api/{}", E::KIND.route());

    Router::new()
        .route(&base, any(protected::collection::<E>))
        .route(&format!("{}/:id", base), any(protected::record::<E>))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        if crate::is_production!() {
            tracing::warn!("CORS allows any origin in production");
        }
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new().allow_origin(origins).allow_methods(Any).allow_headers(Any)
}
