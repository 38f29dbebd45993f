use crate::cli::LogFormatArg;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "warn,linkshelf=info";

/// Installs the global subscriber. Logs go to stderr so that command output
/// on stdout stays machine-readable. `RUST_LOG` overrides the default filter.
pub fn init(format: LogFormatArg) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match format {
        LogFormatArg::Text => builder.init(),
        LogFormatArg::Json => builder.json().init(),
    }
}
