//! End-to-end webhook admission and dispatch.

use serde_json::{json, Value};
use std::time::Duration;

mod common;

use common::{added, client, deliver, start_gateway, start_mock_dispatch, test_config, SECRET, TOKEN};

#[tokio::test]
async fn test_added_event_dispatched() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;
    let client = client();

    let res = deliver(&client, &gateway, &added(123)).await;
    assert_eq!(res.status(), 200);
    assert_eq!(res.headers()["x-ratelimit-remaining"], "19");
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Webhook processed successfully",
            "result_id": 123,
            "event_type": "result-added"
        })
    );

    let calls = mock.received();
    assert_eq!(calls.len(), 1);
    let call = &calls[0];
    assert_eq!(call.path, "/repos/rower/logbook-sync/dispatches");
    assert_eq!(call.headers["authorization"], format!("Bearer {}", TOKEN).as_str());
    assert_eq!(call.headers["accept"], "application/vnd.github+json");
    assert_eq!(call.headers["x-github-api-version"], "2022-11-28");
    assert_eq!(call.headers["user-agent"], "Concept2-Webhook-Handler/1.0");
    assert_eq!(
        call.body,
        json!({
            "event_type": "c2_new_activity",
            "client_payload": {"result_id": 123, "event_type": "result-added"}
        })
    );
}

#[tokio::test]
async fn test_deleted_event_dispatched() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;

    let res = deliver(&client(), &gateway, r#"{"type":"result-deleted","result_id":456}"#).await;
    assert_eq!(res.status(), 200);
    assert_eq!(mock.received()[0].body["client_payload"]["result_id"], 456);
    assert_eq!(mock.received()[0].body["client_payload"]["event_type"], "result-deleted");
}

#[tokio::test]
async fn test_duplicate_not_redispatched() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;
    let client = client();

    let first = deliver(&client, &gateway, &added(7)).await;
    assert_eq!(first.status(), 200);

    let second = deliver(&client, &gateway, &added(7)).await;
    assert_eq!(second.status(), 202);
    let body: Value = second.json().await.unwrap();
    assert_eq!(
        body,
        json!({"success": true, "duplicate": true, "message": "Webhook already processed"})
    );

    assert_eq!(mock.count(), 1);
}

#[tokio::test]
async fn test_delivery_id_deduplicates_distinct_bodies() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;
    let client = client();

    for (id, expected) in [(1, 200), (2, 202)] {
        let res = client
            .post(gateway.url())
            .header("x-webhook-secret", SECRET)
            .header("x-webhook-id", "delivery-abc")
            .body(added(id))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), expected);
    }
    assert_eq!(mock.count(), 1);
}

#[tokio::test]
async fn test_twenty_first_request_rate_limited() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    // Wide window so the run cannot straddle a boundary.
    config.rate_limit.window_secs = 3600;
    let gateway = start_gateway(config).await;
    let client = client();

    for id in 1..=20 {
        let res = deliver(&client, &gateway, &added(id)).await;
        assert_eq!(res.status(), 200, "request {} should be admitted", id);
    }

    let res = deliver(&client, &gateway, &added(21)).await;
    assert_eq!(res.status(), 429);
    let retry_after: u64 = res.headers()["retry-after"].to_str().unwrap().parse().unwrap();
    assert!((1..=3600).contains(&retry_after));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Rate limit exceeded");

    assert_eq!(mock.count(), 20);
}

#[tokio::test]
async fn test_rejections_never_dispatch() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;
    let client = client();

    let res = client.get(gateway.url()).send().await.unwrap();
    assert_eq!(res.status(), 405);
    assert_eq!(res.headers()["allow"], "POST");

    let res = client
        .post(gateway.url())
        .header("x-webhook-secret", "wrong")
        .body(added(1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({"error": "Unauthorized"}));

    let res = client.post(gateway.url()).body(added(1)).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = deliver(&client, &gateway, r#"{"type":"result-added","result":{}}"#).await;
    assert_eq!(res.status(), 400);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "Missing result.id in result-added event");

    let res = deliver(&client, &gateway, r#"{"type":"unknown"}"#).await;
    assert_eq!(res.status(), 400);

    let res = deliver(&client, &gateway, "not json").await;
    assert_eq!(res.status(), 400);

    assert_eq!(mock.count(), 0);
}

#[tokio::test]
async fn test_query_token_accepted() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;

    let res = client()
        .post(format!("{}?token={}", gateway.url(), SECRET))
        .body(added(99))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(mock.count(), 1);
}

#[tokio::test]
async fn test_trusted_client_ip_header_partitions_clients() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    config.listener.client_ip_header = Some("cf-connecting-ip".into());
    config.rate_limit.max_per_window = 1;
    config.rate_limit.window_secs = 3600;
    let gateway = start_gateway(config).await;
    let client = client();

    let send = |ip: &'static str, id: u64| {
        client
            .post(gateway.url())
            .header("x-webhook-secret", SECRET)
            .header("cf-connecting-ip", ip)
            .body(added(id))
            .send()
    };

    assert_eq!(send("203.0.113.1", 1).await.unwrap().status(), 200);
    assert_eq!(send("203.0.113.2", 2).await.unwrap().status(), 200);
    assert_eq!(send("203.0.113.1", 3).await.unwrap().status(), 429);
}

#[tokio::test]
async fn test_hot_reload_rotates_secret() {
    let mock = start_mock_dispatch().await;
    let config = test_config(&mock.base_url());
    let gateway = start_gateway(config.clone()).await;
    let client = client();

    let mut rotated = config;
    rotated.webhook.secret = Some("rotated-secret".into());
    gateway.config_tx.send(rotated).unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let res = deliver(&client, &gateway, &added(1)).await;
    assert_eq!(res.status(), 401);

    let res = client
        .post(gateway.url())
        .header("x-webhook-secret", "rotated-secret")
        .body(added(1))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_health() {
    let mock = start_mock_dispatch().await;
    let gateway = start_gateway(test_config(&mock.base_url())).await;

    let res = client()
        .get(format!("http://{}/health", gateway.addr))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "OK");
}
