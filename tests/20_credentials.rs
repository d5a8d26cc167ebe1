mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use campus_gateway::auth::Role;
use campus_gateway::identity::{ApiKeyRecord, TokenIntrospection};

#[tokio::test]
async fn whoami_requires_a_credential() -> Result<()> {
    let server = common::start().await?;

    let res = server.client.get(server.url("/api/auth/whoami")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    // Session routes do not issue bearer challenges
    assert!(!res.headers().contains_key(header::WWW_AUTHENTICATE));

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHENTICATED");
    Ok(())
}

#[tokio::test]
async fn whoami_returns_the_session_principal() -> Result<()> {
    let server = common::start().await?;
    let school = Uuid::new_v4();
    let (token, user_id) = server.seed_session(Role::Teacher, Some(school)).await;

    let res = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["data"]["user_id"], user_id.to_string());
    assert_eq!(body["data"]["role"], "teacher");
    assert_eq!(body["data"]["school_id"], school.to_string());
    assert_eq!(body["data"]["source"]["type"], "session");
    assert_eq!(body["data"]["rule"], "whoami");
    Ok(())
}

#[tokio::test]
async fn unknown_session_is_rejected() -> Result<()> {
    let server = common::start().await?;

    let res = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(header::COOKIE, common::session_cookie("forged"))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn identity_outage_is_service_unavailable() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::Student, None).await;
    server.identity.set_unavailable(true);

    let res = server
        .client
        .get(server.url("/api/auth/whoami"))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "IDENTITY_UNAVAILABLE");
    Ok(())
}

#[tokio::test]
async fn logout_drops_the_cached_session() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::Parent, None).await;
    let cookie = common::session_cookie(&token);

    let whoami = || {
        server
            .client
            .get(server.url("/api/auth/whoami"))
            .header(header::COOKIE, cookie.clone())
            .send()
    };

    assert_eq!(whoami().await?.status(), StatusCode::OK);

    // Revoked upstream, but still served from the credential cache
    server.identity.remove_session(&token).await;
    assert_eq!(whoami().await?.status(), StatusCode::OK);

    let res = server
        .client
        .delete(server.url("/api/auth/session"))
        .header(header::COOKIE, cookie.clone())
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["logged_out"], true);

    assert_eq!(whoami().await?.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn oauth_routes_ignore_session_cookies() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::Teacher, None).await;

    let res = server
        .client
        .get(server.url("/api/v1/me"))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let challenge = res.headers()[header::WWW_AUTHENTICATE].to_str()?;
    assert!(challenge.starts_with("Bearer error=\"invalid_token\""));
    Ok(())
}

#[tokio::test]
async fn bearer_token_needs_the_route_scope() -> Result<()> {
    let server = common::start().await?;
    let (_, user_id) = server.seed_session(Role::Student, None).await;

    server
        .identity
        .insert_token(
            "token-with-profile",
            TokenIntrospection {
                client_id: "gradebook".into(),
                scopes: vec!["profile.read".into()],
                user_id: Some(user_id),
                rate_limit_per_minute: None,
            },
        )
        .await;
    server
        .identity
        .insert_token(
            "token-without-profile",
            TokenIntrospection {
                client_id: "gradebook".into(),
                scopes: vec!["calendar.read".into()],
                user_id: Some(user_id),
                rate_limit_per_minute: None,
            },
        )
        .await;

    let res = server
        .client
        .get(server.url("/api/v1/me"))
        .bearer_auth("token-with-profile")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await?;
    assert_eq!(body["data"]["id"], user_id.to_string());
    assert_eq!(body["data"]["client_id"], "gradebook");
    assert_eq!(body["data"]["role"], "student");

    let res = server
        .client
        .get(server.url("/api/v1/me"))
        .bearer_auth("token-without-profile")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        res.headers()[header::WWW_AUTHENTICATE],
        "Bearer error=\"insufficient_scope\", error_description=\"insufficient permissions\""
    );
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "FORBIDDEN");
    Ok(())
}

#[tokio::test]
async fn api_key_without_user_has_no_profile() -> Result<()> {
    let server = common::start().await?;
    server
        .identity
        .insert_api_key(
            "ck_live_reporting",
            ApiKeyRecord {
                client_id: "reporting".into(),
                scopes: vec!["profile.read".into()],
                rate_limit_per_minute: None,
            },
        )
        .await;

    let res = server
        .client
        .get(server.url("/api/v1/me"))
        .header("x-api-key", "ck_live_reporting")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}
