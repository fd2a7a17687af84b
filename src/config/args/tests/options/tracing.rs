#[cfg(test)]
mod tests {
    use crate::config::args::*;

    #[test]
    fn with_default_value() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "./lecture.mp4"];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(
            config.tracing_config.as_ref().unwrap().tracing_level,
            log::Level::Warn
        );
        assert!(!config.tracing_config.as_ref().unwrap().json_tracing);
        assert!(!config.tracing_config.as_ref().unwrap().http_client_tracing);
        assert!(!config.tracing_config.as_ref().unwrap().span_events_tracing);
        assert!(
            !config
                .tracing_config
                .as_ref()
                .unwrap()
                .disable_color_tracing
        );
    }

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "-vvv",
            "--json-tracing",
            "--http-client-tracing",
            "--span-events-tracing",
            "--disable-color-tracing",
            "./lecture.mp4",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(
            config.tracing_config.as_ref().unwrap().tracing_level,
            log::Level::Trace
        );
        assert!(config.tracing_config.as_ref().unwrap().json_tracing);
        assert!(config.tracing_config.as_ref().unwrap().http_client_tracing);
        assert!(config.tracing_config.as_ref().unwrap().span_events_tracing);
        assert!(
            config
                .tracing_config
                .as_ref()
                .unwrap()
                .disable_color_tracing
        );
    }

    #[test]
    fn quiet() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "-qq", "./lecture.mp4"];

        let config = build_config_from_args(args).unwrap();

        assert!(config.tracing_config.is_none());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
