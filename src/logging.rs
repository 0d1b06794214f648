// 📜 Structured logging
// Console layer (optional) + daily rolling JSON file under the log dir.

use std::path::Path;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file prefix inside the log dir (`profiler.log.YYYY-MM-DD`)
pub const LOG_FILE_PREFIX: &str = "profiler.log";

/// Install the global subscriber. RUST_LOG takes precedence over `level`.
///
/// The TUI owns the terminal, so it passes `console = false` and only the
/// file layer is installed. Calling this twice is a no-op.
pub fn init_logging<P: AsRef<Path>>(log_dir: P, level: &str, console: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);

    let file_layer = fmt::layer()
        .json()
        .with_writer(file_appender)
        .with_ansi(false);

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_ansi(true)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();
}
