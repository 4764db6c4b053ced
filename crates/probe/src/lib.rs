//! Bounded-retry TCP readiness probing.
//!
//! A probe only answers "is something accepting connections on host:port yet?".
//! It never reports why a service is unreachable: refused, timed out and any
//! other connect error all count as a failed attempt.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Default spacing between attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(1);

/// Default timeout of a single connection attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Polls a TCP endpoint until it accepts a connection or the attempt budget runs out.
#[derive(Clone, Copy, Debug)]
pub struct ReadinessProber {
    connect_timeout: Duration,
    interval: Duration,
}

impl Default for ReadinessProber {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            interval: DEFAULT_INTERVAL,
        }
    }
}

impl ReadinessProber {
    /// Creates a prober with one-second attempts and a one-second connect timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the wait between failed attempts.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the timeout of each individual connection attempt.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Makes a single connection attempt.
    pub async fn is_reachable(&self, host: &str, port: u16) -> bool {
        match timeout(self.connect_timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("{}:{} not reachable: {}", host, port, e);
                false
            }
            Err(_) => {
                debug!("{}:{} connect timed out", host, port);
                false
            }
        }
    }

    /// Returns `true` on the first successful connection, `false` once
    /// `max_attempts` attempts have failed.
    pub async fn await_ready(&self, host: &str, port: u16, max_attempts: u32) -> bool {
        for attempt in 1..=max_attempts {
            if self.is_reachable(host, port).await {
                debug!("{}:{} ready after {} attempt(s)", host, port, attempt);
                return true;
            }

            if attempt < max_attempts {
                sleep(self.interval).await;
            }
        }

        false
    }
}

/// Waits for `host:port` to accept connections, one attempt per second.
pub async fn await_ready(host: &str, port: u16, max_attempts: u32) -> bool {
    ReadinessProber::new()
        .await_ready(host, port, max_attempts)
        .await
}

/// Whether something is already listening on `host:port`.
pub async fn is_port_in_use(host: &str, port: u16) -> bool {
    ReadinessProber::new().is_reachable(host, port).await
}
