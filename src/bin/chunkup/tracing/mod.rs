use std::env;

use rusty_fork::rusty_fork_test;
use tracing_subscriber::fmt::format::FmtSpan;

use chunkup::config::TracingConfig;

const EVENT_FILTER_ENV_VAR: &str = "RUST_LOG";
const HTTP_CLIENT_TARGETS: [&str; 3] = ["reqwest", "hyper_util", "rustls"];

/// Event filter and whether event targets are worth printing.
///
/// HTTP client tracing wins over `RUST_LOG`. Without either, only chunkup's own events pass
/// and the target is always `chunkup`, so it is hidden.
fn event_filter(config: &TracingConfig, env_filter: Option<String>) -> (String, bool) {
    let tracing_level = config.tracing_level;

    if config.http_client_tracing {
        let filter = std::iter::once("chunkup")
            .chain(HTTP_CLIENT_TARGETS)
            .map(|target| format!("{target}={tracing_level}"))
            .collect::<Vec<_>>()
            .join(",");
        return (filter, true);
    }

    match env_filter {
        Some(filter) => (filter, true),
        None => (format!("chunkup={tracing_level}"), false),
    }
}

pub fn init_tracing(config: &TracingConfig) {
    let fmt_span = if config.span_events_tracing {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let (filter, show_target) = event_filter(config, env::var(EVENT_FILTER_ENV_VAR).ok());
    let subscriber_builder = tracing_subscriber::fmt()
        .compact()
        .with_ansi(!config.disable_color_tracing)
        .with_span_events(fmt_span)
        .with_env_filter(filter)
        .with_target(show_target);

    if config.json_tracing {
        subscriber_builder.json().init();
    } else {
        subscriber_builder.init();
    }
}


rusty_fork_test! {
    #[test]
    fn init_json_tracing() {
        init_tracing(&TracingConfig {
            tracing_level: log::Level::Info,
            json_tracing: true,
            http_client_tracing: false,
            span_events_tracing: false,
            disable_color_tracing: false});
    }

    #[test]
    fn init_span_events_tracing_without_color() {
        // This code is used to test purpose only and run separated processes.
        unsafe { env::remove_var(EVENT_FILTER_ENV_VAR) };

        init_tracing(&TracingConfig {
            tracing_level: log::Level::Trace,
            json_tracing: false,
            http_client_tracing: true,
            span_events_tracing: true,
            disable_color_tracing: true,
        });
    }
}
