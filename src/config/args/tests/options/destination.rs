#[cfg(test)]
mod tests {
    use crate::config::args::*;

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--endpoint-url",
            "https://api.example.local/api/uploads",
            "--bearer-token",
            "my-token",
            "--folder",
            "lectures/2024",
            "--operation-timeout-milliseconds",
            "30000",
            "--connect-timeout-milliseconds",
            "3000",
            "./lecture.mp4",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(
            config.destination_config.endpoint_url,
            "https://api.example.local/api/uploads"
        );
        assert_eq!(
            config.destination_config.bearer_token.token.as_deref(),
            Some("my-token")
        );
        assert_eq!(
            config.destination_config.folder.as_deref(),
            Some("lectures/2024")
        );
        assert_eq!(
            config
                .destination_config
                .timeout_config
                .operation_timeout_milliseconds,
            Some(30000)
        );
        assert_eq!(
            config
                .destination_config
                .timeout_config
                .connect_timeout_milliseconds,
            Some(3000)
        );
    }

    #[test]
    fn bearer_token_is_redacted() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--bearer-token",
            "my-secret-token",
            "./lecture.mp4",
        ];

        let config = build_config_from_args(args).unwrap();

        assert!(!format!("{config:?}").contains("my-secret-token"));
    }

    #[test]
    fn with_invalid_endpoint_url() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--endpoint-url",
            "ftp://api.example.local",
            "./lecture.mp4",
        ];

        assert!(build_config_from_args(args).is_err());
    }

    #[test]
    fn with_empty_folder() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--folder", "", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
