mod common;

use anyhow::Result;
use chrono::Utc;
use reqwest::StatusCode;
use serde_json::{json, Value};

use campus_gateway::policy::PolicyTable;

const ACTIVATE: &str = "/api/device/luminex/activate";

fn activation(timestamp: i64) -> Value {
    json!({
        "device_id": "lx-0042",
        "firmware": "2.4.1",
        "timestamp": timestamp
    })
}

#[tokio::test]
async fn signed_activation_is_accepted() -> Result<()> {
    let server = common::start().await?;
    let envelope = common::signed_envelope(activation(Utc::now().timestamp()));

    let res = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.headers()["x-ratelimit-limit"], "30");

    let body: Value = res.json().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["device_id"], "lx-0042");
    assert_eq!(body["data"]["activated"], true);
    assert_eq!(body["data"]["device_class"], "default");
    Ok(())
}

#[tokio::test]
async fn tampered_payload_is_rejected() -> Result<()> {
    let server = common::start().await?;
    let mut envelope = common::signed_envelope(activation(Utc::now().timestamp()));
    envelope["payload"]["device_id"] = json!("lx-9999");

    let res = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "INVALID_SIGNATURE");
    Ok(())
}

#[tokio::test]
async fn key_order_does_not_matter() -> Result<()> {
    let server = common::start().await?;
    let ts = Utc::now().timestamp();
    let envelope = common::signed_envelope(activation(ts));
    let signature = envelope["signature"].as_str().unwrap_or_default().to_string();

    // Same fields, different order on the wire
    let body = format!(
        r#"{{"signature":"{}","payload":{{"timestamp":{},"firmware":"2.4.1","device_id":"lx-0042"}}}}"#,
        signature, ts
    );
    let res = server
        .client
        .post(server.url(ACTIVATE))
        .header("content-type", "application/json")
        .body(body)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn stale_timestamp_is_rejected() -> Result<()> {
    let server = common::start().await?;
    let ten_minutes_ago = Utc::now().timestamp() - 600;
    let envelope = common::signed_envelope(activation(ten_minutes_ago));

    let res = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let body: Value = res.json().await?;
    assert_eq!(body["code"], "STALE_TIMESTAMP");
    Ok(())
}

#[tokio::test]
async fn malformed_envelopes_are_bad_requests() -> Result<()> {
    let server = common::start().await?;

    for body in [
        "not json".to_string(),
        json!({ "payload": { "device_id": "lx-0042" } }).to_string(),
        json!({ "payload": [], "signature": "ab" }).to_string(),
        json!({ "payload": { "device_id": "lx-0042" }, "signature": "zz" }).to_string(),
    ] {
        let res = server
            .client
            .post(server.url(ACTIVATE))
            .header("content-type", "application/json")
            .body(body.clone())
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "body {}", body);

        let err: Value = res.json().await?;
        assert_eq!(err["code"], "MALFORMED_PAYLOAD");
        assert_eq!(err["error"], "malformed signed payload");
    }
    Ok(())
}

#[tokio::test]
async fn signed_payload_without_device_id_is_refused() -> Result<()> {
    let server = common::start().await?;
    let envelope = common::signed_envelope(json!({ "timestamp": Utc::now().timestamp() }));

    let res = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn replayed_envelope_is_rejected_when_guarded() -> Result<()> {
    let mut config = common::test_config();
    config.signature.replay_protection = true;
    let server = common::start_with(config, PolicyTable::builtin()?).await?;
    let envelope = common::signed_envelope(activation(Utc::now().timestamp()));

    let first = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = server.client.post(server.url(ACTIVATE)).json(&envelope).send().await?;
    assert_eq!(second.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
