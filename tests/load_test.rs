//! Load testing for the balancer.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;

use weighted_balancer::config::BalancerConfig;
use weighted_balancer::{Balancer, Shutdown};

mod common;

#[tokio::test]
async fn test_weighted_distribution_under_load() {
    // 1. Setup four mock backends
    let mut builder = BalancerConfig::builder().monitoring(false);
    for name in ["app1", "app2", "app3", "app4"] {
        let addr = common::start_mock_backend(name).await;
        builder = builder.server(name, addr.to_string(), 25);
    }

    // 2. Start balancer
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    let balancer = Balancer::new(builder.build()).unwrap();
    let shutdown = Shutdown::new();
    let sd = shutdown.clone();
    tokio::spawn(async move {
        let _ = balancer.serve(listener, sd).await;
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    // 3. Run load test
    let concurrency = 20;
    let requests_per_task = 100;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..concurrency {
        let client = client.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move {
            let mut hits: HashMap<String, usize> = HashMap::new();
            for _ in 0..requests_per_task {
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        if let Ok(body) = res.text().await {
                            *hits.entry(body).or_default() += 1;
                        }
                    }
                }
            }
            hits
        }));
    }

    let mut hits: HashMap<String, usize> = HashMap::new();
    for handle in handles {
        for (backend, count) in handle.await.unwrap() {
            *hits.entry(backend).or_default() += count;
        }
    }

    let duration = start.elapsed();
    let served: usize = hits.values().sum();
    let rps = served as f64 / duration.as_secs_f64();

    println!("Load Test Results:");
    println!("  Total Requests: {}", total_requests);
    println!("  Served:         {}", served);
    println!("  Duration:       {:?}", duration);
    println!("  RPS:            {:.2}", rps);
    println!("  Per backend:    {:?}", hits);

    // 4. Every request served, shares close to 25% each
    assert_eq!(served, total_requests, "all requests must be proxied");
    for name in ["app1", "app2", "app3", "app4"] {
        let share = hits.get(name).copied().unwrap_or(0) as f64 / served as f64;
        assert!((share - 0.25).abs() < 0.05, "{name} share {share:.3}");
    }

    shutdown.trigger();
}
