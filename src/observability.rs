//! Logging setup and structured diagnostics for the builder and the bridge.
//!
//! The `log_metric!` macro emits a structured key/value line at debug level. Its
//! body sits behind `#[cfg(debug_assertions)]`, so release builds compile every
//! call away.

use log::LevelFilter;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Once;

use crate::error::PostmanError;

/// Logs a structured key-value metric string at debug level, only in debug builds.
///
/// # Example
/// ```
/// use arrow_postman::log_metric;
/// let rows = 3;
/// log_metric!("event"="table_assembled", "rows"=rows);
/// ```
#[macro_export]
macro_rules! log_metric {
    ($($key:literal = $value:expr),+ $(,)?) => {
        #[cfg(debug_assertions)]
        {
            let mut parts = Vec::new();
            $(
                parts.push(format!("\"{}\": \"{}\"", $key, $value));
            )+
            log::debug!("POSTMAN_METRIC: {{ {} }}", parts.join(", "));
        }
    };
}

static INIT_LOGGER: Once = Once::new();

/// Installs an `env_logger` backend at `level`, appending to `log_file` if given.
///
/// Only the first successful call has an effect; later calls return `Ok(())`
/// without touching the installed logger.
pub fn init_logging(level: &str, log_file: Option<&str>) -> Result<(), PostmanError> {
    let filter = LevelFilter::from_str(level)
        .map_err(|_| PostmanError::InvalidConfig(format!("unknown log level '{}'", level)))?;
    let file = log_file
        .map(|path| OpenOptions::new().append(true).create(true).open(path))
        .transpose()?;

    INIT_LOGGER.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.is_test(false);
        builder.filter_level(filter);

        // Just the level and the message.
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(buf, "[{}] {}", record.level(), record.args())
        });

        if let Some(file) = file {
            builder.target(env_logger::Target::Pipe(Box::new(file)));
        }

        // Another logger may already be installed by the host application.
        let _ = builder.try_init();
    });
    Ok(())
}
