// Application state module
// Everything a connection task needs, shared behind one Arc

use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::Config;
use crate::handler::Router;

/// Application state
pub struct AppState {
    pub config: Config,
    pub router: Router,
    active_connections: AtomicUsize,
}

impl AppState {
    pub const fn new(config: Config, router: Router) -> Self {
        Self {
            config,
            router,
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Reserve a connection slot, `false` if `max_connections` is reached
    pub fn try_acquire_connection(&self) -> bool {
        // Increment first, then check, so concurrent accepts cannot overshoot
        let prev = self.active_connections.fetch_add(1, Ordering::SeqCst);
        if let Some(max) = self.config.performance.max_connections {
            if prev >= usize::try_from(max).unwrap_or(usize::MAX) {
                self.active_connections.fetch_sub(1, Ordering::SeqCst);
                return false;
            }
        }
        true
    }

    pub fn release_connection(&self) {
        self.active_connections.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(max_connections: Option<u64>) -> AppState {
        let mut config = Config::load_from("nonexistent-config-file").unwrap();
        config.performance.max_connections = max_connections;
        AppState::new(config, Router::new())
    }

    #[test]
    fn test_connection_limit() {
        let state = state(Some(2));
        assert!(state.try_acquire_connection());
        assert!(state.try_acquire_connection());
        assert!(!state.try_acquire_connection());
        assert_eq!(state.active_connections(), 2);

        state.release_connection();
        assert!(state.try_acquire_connection());
    }

    #[test]
    fn test_unlimited_connections() {
        let state = state(None);
        for _ in 0..100 {
            assert!(state.try_acquire_connection());
        }
        assert_eq!(state.active_connections(), 100);
    }
}
