//! Concurrent delivery behaviour.

use std::time::Instant;

mod common;

use common::{added, client, deliver, start_gateway, start_mock_dispatch, test_config};

#[tokio::test]
async fn test_concurrent_duplicates_dispatch_once() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    config.rate_limit.max_per_window = 1_000;
    let gateway = std::sync::Arc::new(start_gateway(config).await);
    let client = client();

    let concurrency = 50;
    let mut tasks = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let gateway = gateway.clone();
        tasks.push(tokio::spawn(async move {
            deliver(&client, &gateway, &added(4242)).await.status().as_u16()
        }));
    }

    let mut statuses = Vec::new();
    for task in tasks {
        statuses.push(task.await.unwrap());
    }

    assert_eq!(statuses.iter().filter(|s| **s == 200).count(), 1, "statuses: {:?}", statuses);
    assert_eq!(statuses.iter().filter(|s| **s == 202).count(), concurrency - 1);
    assert_eq!(mock.count(), 1);
}

#[tokio::test]
async fn test_concurrent_distinct_deliveries() {
    let mock = start_mock_dispatch().await;
    let mut config = test_config(&mock.base_url());
    config.rate_limit.max_per_window = 1_000;
    let gateway = std::sync::Arc::new(start_gateway(config).await);
    let client = client();

    let concurrency = 20;
    let per_task = 10;
    let start = Instant::now();

    let mut tasks = Vec::new();
    for t in 0..concurrency {
        let client = client.clone();
        let gateway = gateway.clone();
        tasks.push(tokio::spawn(async move {
            let mut ok = 0;
            for i in 0..per_task {
                let id = (t * per_task + i + 1) as u64;
                if deliver(&client, &gateway, &added(id)).await.status() == 200 {
                    ok += 1;
                }
            }
            ok
        }));
    }

    let mut admitted = 0;
    for task in tasks {
        admitted += task.await.unwrap();
    }

    println!(
        "{} deliveries admitted in {:?}",
        admitted,
        start.elapsed()
    );
    assert_eq!(admitted, concurrency * per_task);
    assert_eq!(mock.count(), concurrency * per_task);
}
