use std::io;
use std::io::Write;

use async_channel::Receiver;
use indicatif::{HumanBytes, HumanDuration, ProgressBar, ProgressStyle};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

use chunkup::types::{SessionSnapshot, UploadEvent, UploadStatus};
use chunkup::upload::progress::{ProgressProjector, ThroughputWindow};

const PROGRESS_TEMPLATE: &str = "{wide_msg}";
const RESULT_TEMPLATE: &str = "{msg}";

#[derive(Debug, Default)]
struct UploadSummary {
    status: UploadStatus,
    uploaded_parts: u64,
    uploaded_bytes: u64,
    retries: u64,
    master: Option<String>,
    error_detail: Option<String>,
}

/// Renders upload events as a single progress line until the event channel is closed.
pub fn show_indicator(
    event_receiver: Receiver<UploadEvent>,
    show_progress: bool,
    show_result: bool,
    log_upload_summary: bool,
) -> JoinHandle<()> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template(PROGRESS_TEMPLATE) {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();
        let mut window = ThroughputWindow::default();
        let mut last_snapshot: Option<SessionSnapshot> = None;
        let mut summary = UploadSummary::default();

        while let Ok(event) = event_receiver.recv().await {
            match event {
                UploadEvent::StatusChanged { to, .. } => {
                    summary.status = to;
                    if to == UploadStatus::Processing {
                        // no more bytes flow after finalize.
                        window.clear();
                    }
                }
                UploadEvent::PartUploaded { bytes, .. } => {
                    summary.uploaded_parts += 1;
                    summary.uploaded_bytes += bytes;
                }
                UploadEvent::PartRetry { .. } => {
                    summary.retries += 1;
                }
                UploadEvent::Progress(snapshot) => {
                    if snapshot.status == UploadStatus::Uploading {
                        window.push(Instant::now(), snapshot.uploaded_bytes);
                    }
                    if show_progress {
                        let view = ProgressProjector::project(&snapshot, &window);
                        progress_text.set_message(format!("{} | {}", snapshot.status, view));
                    }
                    last_snapshot = Some(snapshot);
                }
                UploadEvent::Completed(outputs) => {
                    summary.master = outputs.master;
                }
                UploadEvent::Failed { error_detail } => {
                    summary.error_detail = Some(error_detail);
                }
                UploadEvent::Cancelled => {}
            }
        }

        let elapsed = start_time.elapsed();
        let elapsed_secs_f64 = elapsed.as_secs_f64();
        let bytes_per_sec = if 0.0 < elapsed_secs_f64 {
            (summary.uploaded_bytes as f64 / elapsed_secs_f64) as u64
        } else {
            summary.uploaded_bytes
        };
        let total_parts = last_snapshot
            .as_ref()
            .map_or(0, |snapshot| snapshot.total_parts);

        if log_upload_summary {
            info!(
                message = "upload summary",
                status = summary.status.as_str(),
                transferred_byte = summary.uploaded_bytes,
                transferred_byte_per_sec = bytes_per_sec,
                uploaded_parts = summary.uploaded_parts,
                total_parts = total_parts,
                retries = summary.retries,
                master = summary.master.as_deref(),
                error = summary.error_detail.as_deref(),
                duration_sec = elapsed_secs_f64,
            );
        }

        if show_result {
            if let Ok(result_style) = ProgressStyle::with_template(RESULT_TEMPLATE) {
                progress_text.set_style(result_style);
            }

            let mut message = format!(
                "{} | {:>3} | {:>3}/sec,  uploaded {} parts of {},  retried {} times,  duration {}",
                summary.status,
                HumanBytes(summary.uploaded_bytes),
                HumanBytes(bytes_per_sec),
                summary.uploaded_parts,
                total_parts,
                summary.retries,
                HumanDuration(elapsed),
            );
            if let Some(master) = &summary.master {
                message.push_str(&format!(",  master {master}"));
            }
            if let Some(error_detail) = &summary.error_detail {
                message.push_str(&format!(",  error: {error_detail}"));
            }
            progress_text.finish_with_message(message);

            println!();
            let _ = io::stdout().flush();
        }
    })
}
