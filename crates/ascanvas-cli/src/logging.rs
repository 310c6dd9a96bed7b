use ascanvas_core::config::LoggingConfig;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter directive used when `RUST_LOG` is unset.
fn filter_directive(logging: Option<&LoggingConfig>, verbose: bool) -> String {
    let level = if verbose {
        "debug"
    } else {
        logging
            .and_then(|l| l.level.as_deref())
            .unwrap_or("info")
    };

    let mut directives = vec![level.to_string()];
    if let Some(logging) = logging {
        directives.extend(logging.filters.iter().cloned());
    }
    directives.join(",")
}

pub fn init(logging: Option<&LoggingConfig>, verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(logging, verbose)));

    let to_stdout = logging.is_some_and(|l| l.output == "stdout");
    let writer = if to_stdout {
        BoxMakeWriter::new(std::io::stdout)
    } else {
        BoxMakeWriter::new(std::io::stderr)
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer);

    if logging.is_some_and(|l| l.format == "json") {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: Option<&str>, filters: &[&str]) -> LoggingConfig {
        LoggingConfig {
            format: "plain".into(),
            level: level.map(String::from),
            filters: filters.iter().map(|f| f.to_string()).collect(),
            output: "stderr".into(),
        }
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(filter_directive(None, false), "info");
        assert_eq!(filter_directive(None, true), "debug");
    }

    #[test]
    fn test_config_level_and_filters() {
        let cfg = logging(Some("warn"), &["ascanvas_gateway=debug", "tower_http=trace"]);
        assert_eq!(
            filter_directive(Some(&cfg), false),
            "warn,ascanvas_gateway=debug,tower_http=trace"
        );
    }

    #[test]
    fn test_verbose_beats_config_level() {
        let cfg = logging(Some("error"), &[]);
        assert_eq!(filter_directive(Some(&cfg), true), "debug");
    }
}
