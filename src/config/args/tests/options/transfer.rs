#[cfg(test)]
mod tests {
    use crate::config::args::*;

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--chunk-size",
            "8MiB",
            "--batch-width",
            "5",
            "--max-attempts",
            "4",
            "--backoff-milliseconds",
            "250",
            "--poll-interval-milliseconds",
            "1000",
            "--poll-timeout-seconds",
            "60",
            "./lecture.mp4",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.transfer_config.chunk_size, 8 * 1024 * 1024);
        assert_eq!(config.transfer_config.batch_width, 5);
        assert_eq!(config.transfer_config.max_attempts, 4);
        assert_eq!(config.transfer_config.backoff_milliseconds, 250);
        assert_eq!(
            config.transfer_config.backoff_after_attempt(2),
            std::time::Duration::from_millis(500)
        );
        assert_eq!(config.poll_config.interval_milliseconds, 1000);
        assert_eq!(config.poll_config.timeout_seconds, 60);
    }

    #[test]
    fn with_too_small_chunk_size() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--chunk-size", "1MiB", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_err());
    }

    #[test]
    fn with_zero_batch_width() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--batch-width", "0", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_err());
    }

    #[test]
    fn with_zero_max_attempts() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--max-attempts", "0", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_err());
    }

    #[test]
    fn with_zero_poll_interval() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--poll-interval-milliseconds",
            "0",
            "./lecture.mp4",
        ];

        assert!(build_config_from_args(args).is_err());
    }

    #[test]
    fn with_chunk_size_larger_than_max_file_size() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--chunk-size",
            "64MiB",
            "--max-file-size",
            "32MiB",
            "./lecture.mp4",
        ];

        let result = build_config_from_args(args);

        assert_eq!(result.unwrap_err(), CHUNK_SIZE_LARGER_THAN_MAX_FILE_SIZE);
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
