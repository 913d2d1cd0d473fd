//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogFormat;

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(level)));

    let registry = tracing_subscriber::registry().with(filter);
    let fmt = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match format {
        LogFormat::Compact => registry.with(fmt.compact()).init(),
        LogFormat::Json => registry.with(fmt.json()).init(),
    }
}

fn default_directives(level: &str) -> String {
    let level = level.trim().to_lowercase();
    format!("vecta_server={level},vecta_llm={level},vecta_core={level},tower_http=info,warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("DEBUG");
        assert!(directives.starts_with("vecta_server=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
