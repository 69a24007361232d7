pub mod config;
pub mod core;
pub mod error;
pub mod sync;
pub mod widgets;

use std::sync::atomic::{AtomicBool, Ordering};

/// Whether debug logging is active, shared between the logger filter and the config toggle.
static DEBUG_LOGGING: AtomicBool = AtomicBool::new(false);

pub fn set_debug_logging(enabled: bool) {
    DEBUG_LOGGING.store(enabled, Ordering::Relaxed);
}

pub fn debug_logging() -> bool {
    DEBUG_LOGGING.load(Ordering::Relaxed)
}

/// Journal filter: this crate's targets at info, or debug while the toggle is
/// on; everything else at warn. Read at log time, so the toggle can change
/// after the logger is installed.
pub fn log_enabled(metadata: &log::Metadata) -> bool {
    if metadata.target().starts_with("nook") {
        let max = if debug_logging() {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Info
        };
        metadata.level() <= max
    } else {
        metadata.level() <= log::LevelFilter::Warn
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(target: &str, level: log::Level) -> log::Metadata<'_> {
        log::Metadata::builder().target(target).level(level).build()
    }

    #[test]
    fn filter_follows_debug_toggle_set_after_install() {
        set_debug_logging(false);
        assert!(log_enabled(&meta("nook::config", log::Level::Warn)));
        assert!(log_enabled(&meta("nook::sync", log::Level::Info)));
        assert!(!log_enabled(&meta("nook::sync", log::Level::Debug)));

        set_debug_logging(true);
        assert!(log_enabled(&meta("nook::sync", log::Level::Debug)));
        assert!(!log_enabled(&meta("reqwest::connect", log::Level::Info)));
        assert!(log_enabled(&meta("reqwest::connect", log::Level::Warn)));
        set_debug_logging(false);
    }
}
