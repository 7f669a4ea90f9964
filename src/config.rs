// SPDX-License-Identifier: Apache-2.0 OR MIT
// Process-wide engine switches

use std::sync::atomic::{AtomicBool, Ordering};

static GLOBAL_DISABLE: AtomicBool = AtomicBool::new(false);
static AUTO_START_LISTENING: AtomicBool = AtomicBool::new(true);

/// When true, every logger method short-circuits to a no-op success.
/// Default: false.
pub fn set_global_disable(value: bool) {
    GLOBAL_DISABLE.store(value, Ordering::Relaxed);
}

pub fn global_disable() -> bool {
    GLOBAL_DISABLE.load(Ordering::Relaxed)
}

/// When true, `Logger::initialise` starts the listener of any
/// health-checked recorder that is not consuming its channels yet.
/// Default: true.
pub fn set_auto_start_listening(value: bool) {
    AUTO_START_LISTENING.store(value, Ordering::Relaxed);
}

pub fn auto_start_listening() -> bool {
    AUTO_START_LISTENING.load(Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Behavioral coverage for these switches lives in tests/config_flags.rs,
    // which runs in its own process; mutating them here would race the rest
    // of the in-crate test suite.
    #[test]
    fn test_defaults() {
        assert!(!global_disable());
        assert!(auto_start_listening());
    }
}
