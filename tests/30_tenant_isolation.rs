mod common;

use anyhow::Result;
use reqwest::{header, StatusCode};
use serde_json::Value;
use uuid::Uuid;

use campus_gateway::auth::Role;
use campus_gateway::identity::{ApiKeyRecord, TokenIntrospection};

fn students_path(school: &str) -> String {
    format!("/api/schools/{}/students", school)
}

#[tokio::test]
async fn teacher_cannot_read_another_school() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::Teacher, Some(Uuid::new_v4())).await;

    let res = server
        .client
        .get(server.url(&students_path(&Uuid::new_v4().to_string())))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Generic message: nothing about which school the caller belongs to
    let body: Value = res.json().await?;
    assert_eq!(body["error"], "insufficient permissions");
    Ok(())
}

#[tokio::test]
async fn teacher_reaches_the_data_store_for_own_school() -> Result<()> {
    let server = common::start().await?;
    let school = Uuid::new_v4();
    let (token, _) = server.seed_session(Role::Teacher, Some(school)).await;

    let res = server
        .client
        .get(server.url(&students_path(&school.to_string())))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    // Authorized; the test database is unreachable
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(res.headers()["x-ratelimit-limit"], "300");
    Ok(())
}

#[tokio::test]
async fn students_are_not_staff() -> Result<()> {
    let server = common::start().await?;
    let school = Uuid::new_v4();
    let (token, _) = server.seed_session(Role::Student, Some(school)).await;

    let res = server
        .client
        .get(server.url(&students_path(&school.to_string())))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn malformed_school_id_is_forbidden() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::Admin, Some(Uuid::new_v4())).await;

    let res = server
        .client
        .get(server.url(&students_path("not-a-uuid")))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn super_admin_crosses_schools() -> Result<()> {
    let server = common::start().await?;
    let (token, _) = server.seed_session(Role::SuperAdmin, None).await;

    let res = server
        .client
        .get(server.url(&students_path(&Uuid::new_v4().to_string())))
        .header(header::COOKIE, common::session_cookie(&token))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn oauth_token_is_held_to_the_user_school() -> Result<()> {
    let server = common::start().await?;
    let school = Uuid::new_v4();
    let (_, teacher) = server.seed_session(Role::Teacher, Some(school)).await;
    server
        .identity
        .insert_token(
            "roster-sync",
            TokenIntrospection {
                client_id: "roster".into(),
                scopes: vec!["teacher.students.read".into()],
                user_id: Some(teacher),
                rate_limit_per_minute: None,
            },
        )
        .await;

    let other = format!("/api/v1/schools/{}/students", Uuid::new_v4());
    let res = server
        .client
        .get(server.url(&other))
        .bearer_auth("roster-sync")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let own = format!("/api/v1/schools/{}/students", school);
    let res = server
        .client
        .get(server.url(&own))
        .bearer_auth("roster-sync")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    Ok(())
}

#[tokio::test]
async fn api_key_without_school_is_denied() -> Result<()> {
    let server = common::start().await?;
    server
        .identity
        .insert_api_key(
            "ck_live_roster",
            ApiKeyRecord {
                client_id: "roster".into(),
                scopes: vec!["teacher.students.read".into()],
                rate_limit_per_minute: None,
            },
        )
        .await;

    let path = format!("/api/v1/schools/{}/students", Uuid::new_v4());
    let res = server
        .client
        .get(server.url(&path))
        .header("x-api-key", "ck_live_roster")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}
