use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    fmt,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    Layer, Registry,
};

/// Crates whose log level follows `--debug`.
const CRATES: &[&str] = &["debinfo", "debinfo_site"];

#[derive(clap::Args, Debug, Clone, Default)]
#[group()]
pub struct LoggingArgs {
    /// Enable debug mode.
    #[arg(long, default_value_t = false)]
    pub debug: bool,

    /// Emit logs as JSON lines.
    #[arg(long, default_value_t = false)]
    pub json_logs: bool,
}

impl LoggingArgs {
    pub fn init(&self) -> Result<(), TryInitError> {
        init_logging(self.debug, self.json_logs)
    }
}

/// Filter used when `RUST_LOG` is not set.
pub fn default_filter(debug_mode: bool) -> EnvFilter {
    let level = if debug_mode { "debug" } else { "info" };
    let mut filter = EnvFilter::default().add_directive(if debug_mode {
        LevelFilter::INFO.into()
    } else {
        LevelFilter::WARN.into()
    });
    for krate in CRATES {
        if let Ok(directive) = format!("{}={}", krate, level).parse() {
            filter = filter.add_directive(directive);
        }
    }
    filter
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `debug_mode` when set. Fails if a
/// subscriber is already installed.
pub fn init_logging(debug_mode: bool, json: bool) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(debug_mode));

    let layer = if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_file(debug_mode)
            .with_line_number(debug_mode)
            .boxed()
    };

    Registry::default().with(filter).with(layer).try_init()
}
