use anyhow::{Result, anyhow};
use tokio::time::Instant;
use tracing::{error, info, trace};

use chunkup::Config;
use chunkup::destination::http::HttpDestination;
use chunkup::types::error::{error_detail, is_cancelled_error};
use chunkup::types::token::create_upload_cancellation_token;
use chunkup::upload::UploadSessionController;
use chunkup::upload::resume_record::ResumeRecord;
use chunkup::upload::source::UploadSource;

mod ctrl_c_handler;
mod indicator;
mod ui_config;

use ui_config::UiConfig;

const EXIT_CODE_CANCELLED: i32 = 3;

pub async fn run(config: Config) -> Result<()> {
    let cancelled = {
        let cancellation_token = create_upload_cancellation_token();

        ctrl_c_handler::spawn_ctrl_c_handler(cancellation_token.clone());

        let start_time = Instant::now();
        trace!("upload start.");

        let source = UploadSource::from_path(&config.source).await?;
        let destination = HttpDestination::boxed_new(&config.destination_config)?;

        let mut controller = match load_resume_record(&config).await? {
            Some(record) => {
                record.check_same_file(source.file_name(), source.size())?;
                UploadSessionController::resume(
                    config.clone(),
                    destination,
                    cancellation_token,
                    record,
                )?
            }
            None => UploadSessionController::new(config.clone(), destination, cancellation_token),
        };

        let ui_config = UiConfig::from_config(&config);
        let indicator_join_handle = indicator::show_indicator(
            controller.get_event_receiver(),
            ui_config.show_progress,
            ui_config.show_result,
            ui_config.log_upload_summary,
        );

        let result = controller.start_upload(&source).await;
        controller.close_event_sender();
        indicator_join_handle.await?;

        let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());
        match result {
            Ok(outcome) => {
                info!(
                    duration_sec = duration_sec,
                    session_id = outcome.session_id,
                    master = outcome.outputs.master.as_deref(),
                    "chunkup has been completed."
                );
                false
            }
            Err(e) if is_cancelled_error(&e) => {
                info!(duration_sec = duration_sec, "chunkup has been cancelled.");
                true
            }
            Err(e) => {
                let detail = error_detail(&e);
                error!(duration_sec = duration_sec, error = detail, "chunkup failed.");

                return Err(anyhow!("chunkup failed: {detail}"));
            }
        }
    };

    if cancelled {
        std::process::exit(EXIT_CODE_CANCELLED);
    }

    Ok(())
}

async fn load_resume_record(config: &Config) -> Result<Option<ResumeRecord>> {
    let Some(resume_file) = config.resume_file.as_ref() else {
        return Ok(None);
    };

    if !tokio::fs::try_exists(resume_file).await? {
        return Ok(None);
    }

    let record = ResumeRecord::load(resume_file).await?;
    info!(
        session_id = record.session_id,
        resume_file = %resume_file.display(),
        uploaded_parts = record.parts.len(),
        "resume record has been loaded."
    );

    Ok(Some(record))
}
