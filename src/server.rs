use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{
        header::{self, AUTHORIZATION, CONTENT_TYPE, COOKIE},
        HeaderName, HeaderValue, Method,
    },
    routing::{delete, get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::credentials::API_KEY_HEADER;
use crate::gateway::{Gateway, DEVICE_CLASS_HEADER};
use crate::handlers;
use crate::middleware::gateway_middleware;

/// Shared state for the router and the gateway middleware.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<Gateway>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(gateway: Gateway, config: AppConfig) -> Self {
        Self {
            gateway: Arc::new(gateway),
            config: Arc::new(config),
        }
    }
}

/// Every route is mounted under `route_layer`, so nothing reaches a handler
/// without passing the gateway. A route with no policy rule is refused.
pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        // Public
        .route("/", get(handlers::public::root_get))
        .route("/health", get(handlers::public::health_get))
        .merge(session_routes())
        .merge(oauth_routes())
        .merge(device_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway_middleware,
        ))
        .layer(TraceLayer::new_for_http());

    if state.config.security.security_headers {
        app = with_security_headers(app, state.config.security.hsts);
    }

    if state.config.security.enable_cors {
        app = app.layer(cors_layer(&state.config.security.cors_origins));
    }

    app.with_state(state)
}

fn session_routes() -> Router<AppState> {
    use handlers::{auth, schools};

    Router::new()
        .route("/api/auth/whoami", get(auth::whoami_get))
        .route("/api/auth/session", delete(auth::session_delete))
        .route("/api/schools/:school_id/students", get(schools::students_get))
}

fn oauth_routes() -> Router<AppState> {
    use handlers::oauth;

    Router::new()
        .route("/api/v1/me", get(oauth::me_get))
        .route("/api/v1/schools/:school_id/students", get(oauth::students_get))
}

fn device_routes() -> Router<AppState> {
    use handlers::device;

    Router::new().route("/api/device/luminex/activate", post(device::activate_post))
}

const SECURITY_HEADERS: [(&str, &str); 5] = [
    ("x-frame-options", "DENY"),
    ("x-content-type-options", "nosniff"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("x-xss-protection", "1; mode=block"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Hardening headers on every response, gateway errors included. A header
/// a handler already set is left alone.
fn with_security_headers(mut app: Router<AppState>, hsts: bool) -> Router<AppState> {
    for (name, value) in SECURITY_HEADERS {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        ));
    }
    if hsts {
        app = app.layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        ));
    }
    app
}

/// `*` allows any origin without credentials; an explicit list allows
/// credentials so the session cookie is sent.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let wildcard = origins.is_empty() || origins.iter().any(|o| o == "*");

    let layer = CorsLayer::new().max_age(Duration::from_secs(3600));
    if wildcard {
        return layer
            .allow_origin(AllowOrigin::any())
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    layer
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            COOKIE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(DEVICE_CLASS_HEADER),
        ])
}
