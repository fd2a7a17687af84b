#[cfg(test)]
mod tests {
    use crate::config::args::*;

    #[test]
    fn with_custom_value() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--max-file-size",
            "512MiB",
            "--accepted-mime-prefix",
            "audio/",
            "--mime-type",
            "audio/mpeg",
            "./lecture.mp3",
        ];

        let config = build_config_from_args(args).unwrap();

        assert_eq!(config.validation_config.max_file_size, 512 * 1024 * 1024);
        assert_eq!(
            config.validation_config.accepted_mime_prefix.as_deref(),
            Some("audio/")
        );
        assert_eq!(config.mime_type.as_deref(), Some("audio/mpeg"));
        assert!(config.validation_config.is_mime_type_accepted("audio/mpeg"));
        assert!(!config.validation_config.is_mime_type_accepted("video/mp4"));
    }

    #[test]
    fn with_accept_any_mime_type() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--accept-any-mime-type",
            "--mime-type",
            "application/pdf",
            "./slides.pdf",
        ];

        let config = build_config_from_args(args).unwrap();

        assert!(config.validation_config.accepted_mime_prefix.is_none());
        assert!(
            config
                .validation_config
                .is_mime_type_accepted("application/pdf")
        );
    }

    #[test]
    fn with_mime_type_not_accepted() {
        init_dummy_tracing_subscriber();

        let args = vec![
            "chunkup",
            "--mime-type",
            "application/pdf",
            "./slides.pdf",
        ];

        let result = build_config_from_args(args);

        assert_eq!(result.unwrap_err(), MIME_TYPE_NOT_ACCEPTED);
    }

    #[test]
    fn mime_type_prefix_is_case_insensitive() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--mime-type", "Video/MP4", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_ok());
    }

    #[test]
    fn with_invalid_max_file_size() {
        init_dummy_tracing_subscriber();

        let args = vec!["chunkup", "--max-file-size", "2GiBs", "./lecture.mp4"];

        assert!(build_config_from_args(args).is_err());
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
