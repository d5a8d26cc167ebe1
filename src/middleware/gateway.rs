use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, MatchedPath, RawPathParams, Request, State},
    http::header::WWW_AUTHENTICATE,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::ApiError;
use crate::gateway::GatewayRequest;
use crate::policy::{PolicyRule, TENANT_PARAM};
use crate::rate_limit::client_ip;
use crate::server::AppState;

/// Gateway middleware applied with `route_layer`, so every routed request
/// has a matched path to look its policy up by.
///
/// On success the `AuthContext` is inserted into the request extensions for
/// handlers to take with `Extension<AuthContext>`.
pub async fn gateway_middleware(
    State(state): State<AppState>,
    matched: Option<MatchedPath>,
    params: Option<RawPathParams>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let route = matched
        .as_ref()
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let rule = state.gateway.rule_for(request.method(), &route)?;

    let school_param = params.as_ref().and_then(|params| {
        params
            .iter()
            .find(|(key, _)| *key == TENANT_PARAM)
            .map(|(_, value)| value.to_string())
    });

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (parts, body) = request.into_parts();

    // Signed routes need the raw body; it is handed back to the handler
    let (body, buffered) = if rule.signed {
        let bytes = axum::body::to_bytes(body, state.config.server.max_body_bytes)
            .await
            .map_err(|e| {
                tracing::warn!("Could not read signed body for {}: {}", rule.name, e);
                ApiError::MalformedPayload("request body unreadable or too large".into())
            })?;
        (Body::from(bytes.clone()), Some(bytes))
    } else {
        (body, None)
    };

    let gateway_request = GatewayRequest {
        headers: &parts.headers,
        client_ip: client_ip(
            &parts.headers,
            peer,
            &state.config.security.trusted_proxies,
        ),
        school_param: school_param.as_deref(),
        body: buffered.as_deref(),
    };

    let context = match state.gateway.authenticate_request(&gateway_request, rule).await {
        Ok(context) => context,
        Err(err) => return Ok(rejection(ApiError::from(err), rule)),
    };
    let rate_limit = context.rate_limit.clone();

    let mut request = Request::from_parts(parts, body);
    request.extensions_mut().insert(context);

    let mut response = next.run(request).await;
    if let Some(decision) = rate_limit {
        decision.write_headers(response.headers_mut());
    }
    Ok(response)
}

/// Error response for a refused request; routes that take OAuth scopes also
/// get a bearer `WWW-Authenticate` challenge.
fn rejection(err: ApiError, rule: &PolicyRule) -> Response {
    let challenge = if rule.takes_bearer_scopes() {
        err.bearer_challenge()
    } else {
        None
    };

    let mut response = err.into_response();
    if let Some(challenge) = challenge {
        response.headers_mut().insert(WWW_AUTHENTICATE, challenge);
    }
    response
}
