// ── Logging setup ──
//
// Apps embedding devwatch own stdout, so logs go to a file when one is
// configured and to stderr otherwise. `RUST_LOG` overrides the level.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Log file. `None` logs to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            file: None,
        }
    }
}

fn default_level() -> String {
    "warn".into()
}

fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "devwatch_api={level},devwatch_core={level},devwatch_config={level}"
        ))
    })
}

/// Install the global subscriber.
///
/// Returns the file writer guard when logging to a file; hold it for the
/// lifetime of the app so buffered lines get flushed.
pub fn init_logging(cfg: &LogConfig) -> Result<Option<WorkerGuard>, ConfigError> {
    let filter = build_filter(&cfg.level);

    let (layer, guard) = match &cfg.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path.file_name().ok_or_else(|| ConfigError::Validation {
                field: "log.file".into(),
                reason: format!("not a file path: {}", path.display()),
            })?;

            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let base = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            let layer = match cfg.format {
                LogFormat::Text => base.boxed(),
                LogFormat::Json => base.json().boxed(),
            };
            (layer, Some(guard))
        }
        None => {
            let base = fmt::layer().with_writer(std::io::stderr).with_target(false);
            let layer = match cfg.format {
                LogFormat::Text => base.boxed(),
                LogFormat::Json => base.json().boxed(),
            };
            (layer, None)
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))?;

    Ok(guard)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn format_parses_lowercase() {
        let cfg: LogConfig = toml::from_str("format = \"json\"").unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "warn");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn rejects_directory_as_log_file() {
        let cfg = LogConfig {
            file: Some(PathBuf::from("/")),
            ..LogConfig::default()
        };
        assert!(matches!(
            init_logging(&cfg),
            Err(ConfigError::Validation { .. })
        ));
    }
}
