//! Free port search.

use std::net::TcpListener;

use tracing::{info, warn};

/// First port in `start..=end` that `host` can bind, else `start`.
pub fn find_free_port(host: &str, start: u16, end: u16) -> u16 {
    for port in start..=end {
        if TcpListener::bind((host, port)).is_ok() {
            if port != start {
                info!(requested = start, port, "Configured port busy, using next free port");
            }
            return port;
        }
    }
    warn!(start, end, "No free port in range, falling back to configured port");
    start
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_busy_port() {
        let busy = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = busy.local_addr().unwrap().port();
        let end = taken.saturating_add(20);

        let port = find_free_port("127.0.0.1", taken, end);
        assert_ne!(port, taken);
        assert!(port > taken && port <= end);
    }

    #[test]
    fn test_falls_back_when_range_exhausted() {
        let busy = TcpListener::bind(("127.0.0.1", 0)).unwrap();
        let taken = busy.local_addr().unwrap().port();
        assert_eq!(find_free_port("127.0.0.1", taken, taken), taken);
    }
}
