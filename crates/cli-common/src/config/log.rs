use std::{
    fmt::{self, Display, Formatter},
    fs::OpenOptions,
    path::PathBuf,
    str::FromStr,
};

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr};
use tracing_subscriber::{
    fmt::format::FmtSpan,
    layer::SubscriberExt,
    registry::LookupSpan,
    util::{SubscriberInitExt, TryInitError},
    Layer,
};

// SAFETY: Configuration file needs many bools.
#[allow(clippy::struct_excessive_bools)]
#[serde_as]
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LogConfig {
    #[serde(default = "LogConfig::default_file_path")]
    pub file_path: Option<PathBuf>,

    #[serde(default = "LogConfig::default_emit_journald")]
    pub emit_journald: bool,

    #[serde(default = "LogConfig::default_emit_stdout")]
    pub emit_stdout: bool,

    #[serde(default = "LogConfig::default_emit_stderr")]
    pub emit_stderr: bool,

    #[serde(default = "LogConfig::default_log_filters")]
    pub log_filters: String,

    #[serde(default = "LogConfig::default_log_formatter")]
    #[serde_as(as = "DisplayFromStr")]
    pub formatter: LogFormatter,

    /// Emit a span-close event carrying `time.busy` and `time.idle`.
    #[serde(default = "LogConfig::default_show_fn_latency")]
    pub show_fn_latency: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: Self::default_file_path(),
            emit_journald: Self::default_emit_journald(),
            emit_stdout: Self::default_emit_stdout(),
            emit_stderr: Self::default_emit_stderr(),
            log_filters: Self::default_log_filters(),
            formatter: Self::default_log_formatter(),
            show_fn_latency: Self::default_show_fn_latency(),
        }
    }
}

impl LogConfig {
    #[inline]
    #[must_use]
    pub fn default_log_filters() -> String {
        "info,sqlx=warn,async_graphql=warn,tower_http=info".to_string()
    }

    #[inline]
    #[must_use]
    pub const fn default_file_path() -> Option<PathBuf> { None }

    #[inline]
    #[must_use]
    pub const fn default_emit_journald() -> bool { false }

    #[inline]
    #[must_use]
    pub const fn default_emit_stdout() -> bool { true }

    #[inline]
    #[must_use]
    pub const fn default_emit_stderr() -> bool { false }

    #[inline]
    #[must_use]
    pub const fn default_log_formatter() -> LogFormatter { LogFormatter::Pretty }

    #[inline]
    #[must_use]
    pub const fn default_show_fn_latency() -> bool { false }

    /// Installs the global subscriber described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a global subscriber has already been installed.
    pub fn try_init(&self) -> Result<(), TryInitError> {
        let Self {
            emit_journald,
            file_path,
            emit_stdout,
            emit_stderr,
            log_filters,
            formatter,
            show_fn_latency,
        } = self;

        let filter_layer = tracing_subscriber::filter::EnvFilter::new(log_filters.as_str());
        let span_events = if *show_fn_latency { FmtSpan::CLOSE } else { FmtSpan::NONE };

        let sinks = [
            emit_journald.then_some(LogSink::Journald),
            file_path.clone().map(|path| LogSink::File(path, *formatter)),
            emit_stdout.then_some(LogSink::Stdout(*formatter)),
            emit_stderr.then_some(LogSink::Stderr(*formatter)),
        ];

        let layers = sinks
            .into_iter()
            .flatten()
            .filter_map(|sink| sink.layer(span_events.clone()))
            .collect::<Vec<_>>();

        tracing_subscriber::registry().with(filter_layer).with(layers).try_init()
    }
}

#[derive(Clone, Debug)]
enum LogSink {
    Stdout(LogFormatter),
    Stderr(LogFormatter),
    Journald,
    File(PathBuf, LogFormatter),
}

impl LogSink {
    #[allow(clippy::type_repetition_in_bounds)]
    fn layer<S>(self, span_events: FmtSpan) -> Option<Box<dyn Layer<S> + Send + Sync + 'static>>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
    {
        match self {
            Self::Stdout(formatter) => Some(formatter.layer(std::io::stdout, span_events)),
            Self::Stderr(formatter) => Some(formatter.layer(std::io::stderr, span_events)),
            Self::File(path, formatter) => {
                match OpenOptions::new().create(true).append(true).open(&path) {
                    Ok(file) => Some(formatter.layer(file, span_events)),
                    Err(err) => {
                        eprintln!("Log file {} is not writable, error: {err}", path.display());
                        None
                    }
                }
            }
            Self::Journald => Some(tracing_journald::layer().ok()?.boxed()),
        }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum LogFormatter {
    Pretty,
    Compact,
    Json,
}

impl LogFormatter {
    #[allow(clippy::type_repetition_in_bounds)]
    fn layer<S, W>(self, writer: W, span_events: FmtSpan) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: tracing::Subscriber,
        for<'a> S: LookupSpan<'a>,
        W: for<'w> tracing_subscriber::fmt::MakeWriter<'w> + Send + Sync + 'static,
    {
        let fmt = tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_target(true)
            .with_span_events(span_events)
            .with_writer(writer);

        match self {
            Self::Pretty => fmt.pretty().boxed(),
            Self::Compact => fmt.compact().boxed(),
            Self::Json => fmt.json().flatten_event(true).boxed(),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownLogFormatter(String);

impl Display for UnknownLogFormatter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "unknown log formatter `{}`, expected one of: pretty, compact, json", self.0)
    }
}

impl std::error::Error for UnknownLogFormatter {}

impl FromStr for LogFormatter {
    type Err = UnknownLogFormatter;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            _ => Err(UnknownLogFormatter(s.to_string())),
        }
    }
}

impl Display for LogFormatter {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Compact => write!(f, "compact"),
            Self::Json => write!(f, "json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatter_from_str() {
        assert_eq!("JSON".parse::<LogFormatter>().unwrap(), LogFormatter::Json);
        assert_eq!(" compact ".parse::<LogFormatter>().unwrap(), LogFormatter::Compact);
        assert_eq!("pretty".parse::<LogFormatter>().unwrap(), LogFormatter::Pretty);
        assert!("colorful".parse::<LogFormatter>().is_err());
    }

    #[test]
    fn test_formatter_display_round_trips() {
        for formatter in [LogFormatter::Pretty, LogFormatter::Compact, LogFormatter::Json] {
            assert_eq!(formatter.to_string().parse::<LogFormatter>().unwrap(), formatter);
        }
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: LogConfig =
            serde_yaml::from_str("formatter: json\nemit_stderr: true\n").unwrap();

        assert_eq!(config.formatter, LogFormatter::Json);
        assert!(config.emit_stderr);
        assert!(config.emit_stdout);
        assert!(!config.emit_journald);
        assert_eq!(config.log_filters, LogConfig::default_log_filters());
        assert!(config.file_path.is_none());
    }
}
