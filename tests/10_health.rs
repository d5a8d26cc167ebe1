mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn root_describes_the_gateway() -> Result<()> {
    let server = common::start().await?;

    let res = server.client.get(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Campus Gateway");
    Ok(())
}

#[tokio::test]
async fn health_reports_degraded_without_database() -> Result<()> {
    let server = common::start().await?;

    let res = server.client.get(server.url("/health")).send().await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    // Health carries its own rate limit
    assert_eq!(res.headers()["x-ratelimit-limit"], "120");
    assert_eq!(res.headers()["x-ratelimit-remaining"], "119");
    assert!(res.headers().contains_key("x-ratelimit-reset"));

    let body: Value = res.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["data"]["status"], "degraded");
    Ok(())
}

#[tokio::test]
async fn unknown_routes_never_reach_the_gateway() -> Result<()> {
    let server = common::start().await?;

    let res = server.client.get(server.url("/api/nope")).send().await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = server.client.post(server.url("/api/auth/whoami")).send().await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);

    let res = server.client.get(server.url("/api/device/luminex/activate")).send().await?;
    assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    Ok(())
}

#[tokio::test]
async fn head_follows_the_get_policy() -> Result<()> {
    let server = common::start().await?;

    let res = server.client.head(server.url("/")).send().await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server.client.head(server.url("/api/auth/whoami")).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
