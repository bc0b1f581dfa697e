#![cfg(feature = "std")]

use std::env;
use std::sync::OnceLock;

use log::{LevelFilter, Metadata, Record};

/// Which process is talking, e.g. `commander@127.0.0.1:50050`. Several
/// soldiers usually log into the same terminal.
static ROLE: OnceLock<String> = OnceLock::new();

struct FieldLogger;

impl log::Log for FieldLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let role = ROLE.get().map(String::as_str).unwrap_or("-");
        // stderr: stdout belongs to reports.
        eprintln!(
            "{:<5} {} [{}] {}",
            record.level(),
            role,
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: FieldLogger = FieldLogger;

fn short_target(target: &str) -> &str {
    target.rsplit("::").next().unwrap_or(target)
}

fn parse_level(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the logger for this process. The level comes from `WARZONE_LOG`
/// (`error`..`trace`, `off`), `info` when unset or unreadable. Only the
/// first call has any effect.
pub fn init_logging(role: impl Into<String>) {
    let _ = ROLE.set(role.into());
    let level = parse_level(env::var("WARZONE_LOG").ok().as_deref());
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(level));
}
