use chunkup::Config;

/// What the terminal shows while a session runs.
///
/// The live progress line only makes sense when nothing else writes to the terminal,
/// so it is hidden as soon as logs above `warn` or JSON logs are enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UiConfig {
    pub show_progress: bool,
    pub show_result: bool,
    pub log_upload_summary: bool,
}

impl UiConfig {
    pub fn from_config(config: &Config) -> Self {
        let Some(tracing_config) = config.tracing_config.as_ref() else {
            return UiConfig {
                show_progress: true,
                show_result: true,
                log_upload_summary: false,
            };
        };

        let verbose = log::Level::Warn < tracing_config.tracing_level;
        UiConfig {
            show_progress: !verbose && !tracing_config.json_tracing,
            show_result: !tracing_config.json_tracing,
            log_upload_summary: true,
        }
    }
}
