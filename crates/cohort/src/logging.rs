use tracing_subscriber::EnvFilter;

use cohort_core::config::LoggingConfig;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `--log-level`, which wins over the config file.
/// Logs go to stderr so command output on stdout stays clean.
pub fn init(cli_level: Option<&str>, config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(effective_level(cli_level, config)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Filter directive used when `RUST_LOG` is unset.
fn effective_level<'a>(cli_level: Option<&'a str>, config: &'a LoggingConfig) -> &'a str {
    cli_level.unwrap_or(&config.level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_level_overrides_config() {
        let config = LoggingConfig {
            level: "warn".to_string(),
            json_format: false,
        };
        assert_eq!(effective_level(Some("debug"), &config), "debug");
        assert_eq!(effective_level(None, &config), "warn");
    }

    #[test]
    fn test_init_twice_is_harmless() {
        let config = LoggingConfig::default();
        init(Some("off"), &config);
        init(Some("off"), &config);
    }
}
