use crate::Config;
use crate::config::args::value_parser::{human_bytes, url};
use crate::config::{
    DestinationConfig, PollConfig, TimeoutConfig, TracingConfig, TransferConfig,
    ValidationConfig,
};
use crate::types::BearerToken;
use crate::types::event_manager::EventManager;
use clap::Parser;
use clap::builder::{ArgPredicate, NonEmptyStringValueParser};
use clap_verbosity_flag::{Verbosity, WarnLevel};
#[cfg(feature = "version")]
use shadow_rs::shadow;
use std::ffi::OsString;
use std::path::PathBuf;
use std::str::FromStr;

mod tests;
mod value_parser;

const DEFAULT_ENDPOINT_URL: &str = "http://localhost:8080/api/uploads";
const DEFAULT_CHUNK_SIZE: &str = "10MiB";
const DEFAULT_MAX_FILE_SIZE: &str = "2GiB";
const DEFAULT_ACCEPTED_MIME_PREFIX: &str = "video/";
const DEFAULT_ACCEPT_ANY_MIME_TYPE: bool = false;
const DEFAULT_BATCH_WIDTH: u16 = super::DEFAULT_BATCH_WIDTH;
const DEFAULT_MAX_ATTEMPTS: u32 = super::DEFAULT_MAX_ATTEMPTS;
const DEFAULT_BACKOFF_MILLISECONDS: u64 = super::DEFAULT_BACKOFF_MILLISECONDS;
const DEFAULT_POLL_INTERVAL_MILLISECONDS: u64 = super::DEFAULT_POLL_INTERVAL_MILLISECONDS;
const DEFAULT_POLL_TIMEOUT_SECONDS: u64 = super::DEFAULT_POLL_TIMEOUT_SECONDS;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_CLIENT_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

const CHUNK_SIZE_LARGER_THAN_MAX_FILE_SIZE: &str =
    "--chunk-size must be smaller than or equal to --max-file-size\n";
const MIME_TYPE_NOT_ACCEPTED: &str =
    "--mime-type does not start with --accepted-mime-prefix. use --accept-any-mime-type to upload it anyway\n";
const RESUME_FILE_IS_SOURCE_FILE: &str = "--resume-file must not be the file to upload\n";
const SOURCE_IS_DIRECTORY: &str = "the file to upload must not be a directory\n";

#[cfg(feature = "version")]
shadow!(build);

#[derive(Parser, Clone, Debug)]
#[cfg_attr(feature = "version", command(version=format!("{} ({} {}), {}", build::PKG_VERSION, build::SHORT_COMMIT, build::BUILD_TARGET, build::RUST_VERSION)))]
pub struct CLIArgs {
    #[arg(env = "CHUNKUP_FILE", help = "path of the media file to upload", value_parser = NonEmptyStringValueParser::new(), default_value_if("auto_complete_shell", ArgPredicate::IsPresent, "ignored"), required = false)]
    file: String,

    /// base url of the upload session API
    #[arg(long, env, default_value = DEFAULT_ENDPOINT_URL, value_parser = url::check_scheme, help_heading = "Destination Options")]
    endpoint_url: String,

    /// bearer token sent with every session API request. never sent to the pre-signed part urls
    #[arg(long, env, hide_env_values = true, value_parser = NonEmptyStringValueParser::new(), help_heading = "Destination Options")]
    bearer_token: Option<String>,

    /// destination folder passed to the session API
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Destination Options")]
    folder: Option<String>,

    /// mime type of the file. the default is guessed from the file extension
    #[arg(long, env, value_parser = NonEmptyStringValueParser::new(), help_heading = "Validation Options")]
    mime_type: Option<String>,

    /// largest accepted file size. allow suffixes: KB, KiB, MB, MiB, GB, GiB, TB, TiB
    #[arg(long, env, default_value = DEFAULT_MAX_FILE_SIZE, value_parser = human_bytes::check_file_size_limit, help_heading = "Validation Options")]
    max_file_size: String,

    /// accepted mime type prefix
    #[arg(long, env, default_value = DEFAULT_ACCEPTED_MIME_PREFIX, value_parser = NonEmptyStringValueParser::new(), help_heading = "Validation Options")]
    accepted_mime_prefix: String,

    /// accept any mime type
    #[arg(long, env, default_value_t = DEFAULT_ACCEPT_ANY_MIME_TYPE, help_heading = "Validation Options")]
    accept_any_mime_type: bool,

    /// size of each part. allow suffixes: KB, KiB, MB, MiB, GB, GiB
    #[arg(long, env, default_value = DEFAULT_CHUNK_SIZE, value_parser = human_bytes::check_chunk_size, help_heading = "Transfer Options")]
    chunk_size: String,

    /// number of parts uploaded in parallel. the next batch starts after the previous one is resolved
    #[arg(long, env, default_value_t = DEFAULT_BATCH_WIDTH, value_parser = clap::value_parser!(u16).range(1..=64), help_heading = "Transfer Options")]
    batch_width: u16,

    /// maximum attempts for each part, including the first one
    #[arg(long, env, default_value_t = DEFAULT_MAX_ATTEMPTS, value_parser = clap::value_parser!(u32).range(1..=100), help_heading = "Retry Options")]
    max_attempts: u32,

    /// base of the linear backoff between part attempts. the n-th retry waits n times this value
    #[arg(long, env, default_value_t = DEFAULT_BACKOFF_MILLISECONDS, value_name = "backoff", help_heading = "Retry Options")]
    backoff_milliseconds: u64,

    /// interval between processing status polls
    #[arg(long, env, default_value_t = DEFAULT_POLL_INTERVAL_MILLISECONDS, value_parser = clap::value_parser!(u64).range(1..), value_name = "poll_interval", help_heading = "Processing Options")]
    poll_interval_milliseconds: u64,

    /// give up waiting for processing after this many seconds
    #[arg(long, env, default_value_t = DEFAULT_POLL_TIMEOUT_SECONDS, value_parser = clap::value_parser!(u64).range(1..), value_name = "poll_timeout", help_heading = "Processing Options")]
    poll_timeout_seconds: u64,

    /// operation timeout (milliseconds) of each http request.
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "operation_timeout",
        help_heading = "Timeout Options"
    )]
    operation_timeout_milliseconds: Option<u64>,

    /// connect timeout (milliseconds).
    /// The default has no timeout.
    #[arg(
        long,
        env,
        value_name = "connect_timeout",
        help_heading = "Timeout Options"
    )]
    connect_timeout_milliseconds: Option<u64>,

    /// save the session to this file after every acknowledged part, and resume from it if it exists
    #[arg(long, env, value_name = "FILE", help_heading = "Resume Options")]
    resume_file: Option<PathBuf>,

    /// trace verbosity(-v: show info, -vv: show debug, -vvv show trace)
    #[clap(flatten)]
    verbosity: Verbosity<WarnLevel>,

    /// show trace as json format
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Tracing/Logging")]
    json_tracing: bool,

    /// enable http client(reqwest/hyper) tracing
    #[arg(long, env, default_value_t = DEFAULT_HTTP_CLIENT_TRACING, help_heading = "Tracing/Logging")]
    http_client_tracing: bool,

    /// show span event tracing
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Tracing/Logging")]
    span_events_tracing: bool,

    /// disable ANSI terminal colors
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Tracing/Logging")]
    disable_color_tracing: bool,

    /// generate a auto completions script. Valid values: bash, fish, zsh, powershell, elvish.
    #[arg(long, env, value_name = "SHELL", value_parser = clap_complete::shells::Shell::from_str, help_heading = "Advanced")]
    auto_complete_shell: Option<clap_complete::shells::Shell>,
}

pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let config_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    crate::Config::try_from(config_args)
}

impl CLIArgs {
    fn validate_upload_config(&self) -> Result<(), String> {
        self.check_source_file()?;
        self.check_chunk_size_conflict()?;
        self.check_mime_type_conflict()?;
        self.check_resume_file_conflict()?;

        Ok(())
    }

    // A missing file is reported when the upload starts, with the session API untouched.
    fn check_source_file(&self) -> Result<(), String> {
        if self.auto_complete_shell.is_some() {
            return Ok(());
        }

        if PathBuf::from(&self.file).is_dir() {
            return Err(SOURCE_IS_DIRECTORY.to_string());
        }

        Ok(())
    }

    fn check_chunk_size_conflict(&self) -> Result<(), String> {
        let chunk_size = human_bytes::parse_chunk_size(&self.chunk_size)?;
        let max_file_size = human_bytes::parse_file_size_limit(&self.max_file_size)?;

        if max_file_size < chunk_size {
            return Err(CHUNK_SIZE_LARGER_THAN_MAX_FILE_SIZE.to_string());
        }

        Ok(())
    }

    fn check_mime_type_conflict(&self) -> Result<(), String> {
        if self.accept_any_mime_type {
            return Ok(());
        }

        if let Some(mime_type) = &self.mime_type {
            if !mime_type
                .to_ascii_lowercase()
                .starts_with(&self.accepted_mime_prefix.to_ascii_lowercase())
            {
                return Err(MIME_TYPE_NOT_ACCEPTED.to_string());
            }
        }

        Ok(())
    }

    fn check_resume_file_conflict(&self) -> Result<(), String> {
        if let Some(resume_file) = &self.resume_file {
            if *resume_file == PathBuf::from(&self.file) {
                return Err(RESUME_FILE_IS_SOURCE_FILE.to_string());
            }
        }

        Ok(())
    }

    fn build_destination_config(&self) -> DestinationConfig {
        DestinationConfig {
            endpoint_url: self.endpoint_url.clone(),
            bearer_token: BearerToken {
                token: self.bearer_token.clone(),
            },
            folder: self.folder.clone(),
            timeout_config: TimeoutConfig {
                operation_timeout_milliseconds: self.operation_timeout_milliseconds,
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
            },
        }
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(value: CLIArgs) -> Result<Self, Self::Error> {
        value.validate_upload_config()?;

        let tracing_config = value.verbosity.log_level().map(|log_level| TracingConfig {
            tracing_level: log_level,
            json_tracing: value.json_tracing,
            http_client_tracing: value.http_client_tracing,
            span_events_tracing: value.span_events_tracing,
            disable_color_tracing: value.disable_color_tracing,
        });

        let chunk_size = human_bytes::parse_chunk_size(&value.chunk_size)?;
        let max_file_size = human_bytes::parse_file_size_limit(&value.max_file_size)?;

        let accepted_mime_prefix = if value.accept_any_mime_type {
            None
        } else {
            Some(value.accepted_mime_prefix.clone())
        };

        Ok(Config {
            source: PathBuf::from(&value.file),
            destination_config: value.build_destination_config(),
            transfer_config: TransferConfig {
                chunk_size,
                batch_width: value.batch_width,
                max_attempts: value.max_attempts,
                backoff_milliseconds: value.backoff_milliseconds,
            },
            poll_config: PollConfig {
                interval_milliseconds: value.poll_interval_milliseconds,
                timeout_seconds: value.poll_timeout_seconds,
            },
            validation_config: ValidationConfig {
                max_file_size,
                accepted_mime_prefix,
            },
            tracing_config,
            mime_type: value.mime_type,
            resume_file: value.resume_file,
            auto_complete_shell: value.auto_complete_shell,
            event_manager: EventManager::new(),
        })
    }
}
