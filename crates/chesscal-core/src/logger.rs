//! Stderr logging for the calibration tools.
//!
//! Records from the `chesscal*` crates pass at the requested level; records
//! from dependencies (image codecs, zip) are capped at `Warn` so a debug run
//! stays readable. With the `tracing` feature, [`init_tracing`] installs a
//! `tracing-subscriber` with the same default filter.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{Level, LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::util::SubscriberInitExt;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_PREFIX: &str = "chesscal";

struct CalibLogger {
    level: LevelFilter,
    started: Instant,
}

impl CalibLogger {
    fn threshold(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_PREFIX) {
            self.level
        } else {
            self.level.min(LevelFilter::Warn)
        }
    }
}

impl Log for CalibLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.threshold(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let elapsed = self.started.elapsed().as_secs_f64();
        let module = record.target().rsplit("::").next().unwrap_or_default();
        let line = match record.level() {
            Level::Error | Level::Warn => format!(
                "[{elapsed:8.3}s {:<5} {}] {}",
                record.level(),
                record.target(),
                record.args()
            ),
            _ => format!("[{elapsed:8.3}s {:<5} {module}] {}", record.level(), record.args()),
        };
        let _ = writeln!(std::io::stderr().lock(), "{line}");
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: OnceLock<CalibLogger> = OnceLock::new();

/// Install the stderr logger. Later calls keep the first level.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_some() {
        return Ok(());
    }
    let logger = LOGGER.get_or_init(|| CalibLogger {
        level,
        started: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install a `tracing` subscriber. `RUST_LOG` overrides the default
/// `chesscal*=info, warn` filter; `json` switches to one JSON object per event.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "warn,chesscal=info,chesscal_core=info,chesscal_chessboard=info,chesscal_calib=info",
        )
    });
    let builder = fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependency_targets_are_capped_at_warn() {
        let logger = CalibLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(logger.threshold("chesscal_calib::refine"), LevelFilter::Debug);
        assert_eq!(logger.threshold("zip::read"), LevelFilter::Warn);

        let quiet = CalibLogger {
            level: LevelFilter::Error,
            started: Instant::now(),
        };
        assert_eq!(quiet.threshold("image::codecs"), LevelFilter::Error);
    }

    #[test]
    fn repeated_initialisation_is_ok() {
        assert!(init_with_level(LevelFilter::Info).is_ok());
        assert!(init_with_level(LevelFilter::Debug).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Info);
    }
}
