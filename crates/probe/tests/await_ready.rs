//! Timing behavior of the readiness probe against real listeners.

use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use xlite_probe::{ReadinessProber, await_ready, is_port_in_use};
use xlite_util::allocate_port;

#[tokio::test]
async fn test_listener_started_late_is_detected_within_budget() {
    let port = allocate_port().unwrap();

    let server = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
        // Keep the listener open long enough for the probe to connect.
        tokio::time::sleep(Duration::from_secs(5)).await;
        drop(listener);
    });

    let start = Instant::now();
    assert!(await_ready("127.0.0.1", port, 6).await);
    assert!(start.elapsed() >= Duration::from_secs(2));

    server.abort();
}

#[tokio::test]
async fn test_listener_that_never_starts_exhausts_budget() {
    let port = allocate_port().unwrap();

    let start = Instant::now();
    assert!(!await_ready("127.0.0.1", port, 3).await);

    // Three attempts, two one-second waits between them.
    assert!(start.elapsed() >= Duration::from_secs(2));
    assert!(!is_port_in_use("127.0.0.1", port).await);
}

#[tokio::test]
async fn test_custom_interval_shortens_the_loop() {
    let port = allocate_port().unwrap();
    let prober = ReadinessProber::new()
        .with_interval(Duration::from_millis(20))
        .with_connect_timeout(Duration::from_millis(200));

    let start = Instant::now();
    assert!(!prober.await_ready("127.0.0.1", port, 5).await);
    assert!(start.elapsed() < Duration::from_secs(2));
}
