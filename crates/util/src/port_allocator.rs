//! Allocation of free local ports, mostly for tests that need real listeners.

use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
    net::{SocketAddr, TcpListener},
    sync::LazyLock,
    time::SystemTime,
};

use parking_lot::Mutex;

/// Lowest port handed out by the allocator.
const RANGE_START: u16 = 20000;

/// Width of the allocation window.
const RANGE_WIDTH: u16 = 20000;

/// Next candidate port. Starts at a random offset so concurrent test binaries
/// rarely collide, and stays clear of the 50xx deployment ports.
static NEXT_PORT: LazyLock<Mutex<u16>> = LazyLock::new(|| {
    let mut hasher = DefaultHasher::new();
    SystemTime::now().hash(&mut hasher);
    std::process::id().hash(&mut hasher);
    #[allow(clippy::cast_possible_truncation)]
    let offset = (hasher.finish() % u64::from(RANGE_WIDTH)) as u16;
    Mutex::new(RANGE_START + offset)
});

/// Allocate the next port that can currently be bound on the loopback interface.
///
/// Returns `None` if no port in the window is free.
#[must_use]
pub fn allocate_port() -> Option<u16> {
    let mut next = NEXT_PORT.lock();

    for _ in 0..RANGE_WIDTH {
        let port = *next;
        *next = if port >= RANGE_START + RANGE_WIDTH - 1 {
            RANGE_START
        } else {
            port + 1
        };

        if is_port_available(port) {
            return Some(port);
        }
    }

    None
}

/// Check if a port is available by attempting to bind to it.
#[must_use]
pub fn is_port_available(port: u16) -> bool {
    TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], port))).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocated_ports_are_distinct_and_bindable() {
        let first = allocate_port().unwrap();
        let second = allocate_port().unwrap();

        assert_ne!(first, second);
        assert!(TcpListener::bind(("127.0.0.1", first)).is_ok());
        assert!(TcpListener::bind(("127.0.0.1", second)).is_ok());
    }

    #[test]
    fn test_bound_port_is_not_available() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        assert!(!is_port_available(port));

        drop(listener);
        assert!(is_port_available(port));
    }
}
