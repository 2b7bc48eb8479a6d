//! Log filter setup for the binary.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "pulsefeed=info";

/// Directive used by `--verbose` when `RUST_LOG` is unset.
pub const VERBOSE_DIRECTIVE: &str = "pulsefeed=debug";

/// Build the log filter.
///
/// A non-blank `env` (the value of `RUST_LOG`) wins over both defaults. An
/// unparsable value falls back to the default directive.
pub fn log_filter(env: Option<&str>, verbose: bool) -> EnvFilter {
    let default = if verbose {
        VERBOSE_DIRECTIVE
    } else {
        DEFAULT_DIRECTIVE
    };

    env.map(str::trim)
        .filter(|value| !value.is_empty())
        .and_then(|value| EnvFilter::try_new(value).ok())
        .unwrap_or_else(|| EnvFilter::new(default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_directive_survives() {
        let filter = log_filter(Some("pulsefeed=trace"), false).to_string();
        assert!(filter.contains("pulsefeed=trace"), "{}", filter);
        assert!(!filter.contains("pulsefeed=info"), "{}", filter);
    }

    #[test]
    fn test_env_wins_over_verbose() {
        let filter = log_filter(Some("pulsefeed_core=warn"), true).to_string();
        assert!(filter.contains("pulsefeed_core=warn"), "{}", filter);
        assert!(!filter.contains("pulsefeed=debug"), "{}", filter);
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(log_filter(None, false).to_string(), "pulsefeed=info");
        assert_eq!(log_filter(None, true).to_string(), "pulsefeed=debug");
        assert_eq!(log_filter(Some("  "), false).to_string(), "pulsefeed=info");
    }

    #[test]
    fn test_unparsable_env_falls_back() {
        assert_eq!(
            log_filter(Some("pulsefeed=notalevel"), false).to_string(),
            "pulsefeed=info"
        );
    }
}
