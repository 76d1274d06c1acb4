use tracing_subscriber::{fmt, EnvFilter};

/// Level used when the configured default is not a valid filter.
pub const FALLBACK_LEVEL: &str = "info";

/// Output format of the process-wide subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Human,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            LogFormat::Json
        } else {
            LogFormat::Human
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogFormat::Human => "human-readable",
            LogFormat::Json => "json",
        }
    }
}

/// `RUST_LOG` when set, else `default_level`, else [`FALLBACK_LEVEL`].
///
/// Returns the filter and whether the configured default was rejected.
pub fn env_filter(default_level: &str) -> (EnvFilter, bool) {
    if let Ok(from_env) = EnvFilter::try_from_default_env() {
        return (from_env, false);
    }
    match EnvFilter::try_new(default_level) {
        Ok(filter) => (filter, false),
        Err(_) => (EnvFilter::new(FALLBACK_LEVEL), true),
    }
}

/// Install the global subscriber for `service_name`.
///
/// Returns `false` when a subscriber was already installed, in which case
/// nothing changes; tests may call this freely.
pub fn init_logging(service_name: &str, default_level: &str, format: LogFormat) -> bool {
    let (filter, rejected) = env_filter(default_level);
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true);

    let installed = match format {
        LogFormat::Human => builder.with_thread_ids(false).try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if !installed {
        return false;
    }

    if rejected {
        tracing::warn!(
            level = default_level,
            fallback = FALLBACK_LEVEL,
            "configured log level is not a valid filter"
        );
    }
    tracing::info!(
        service = service_name,
        format = format.label(),
        "logging initialised"
    );
    true
}
