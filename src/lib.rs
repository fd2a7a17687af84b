/*!
# Overview
chunkup is a resumable, chunked, multi-part media uploader.
It moves large video files into an S3-compatible multipart object store behind a pre-signed-URL API,
then waits for the downstream processing pipeline (transcoding) to finish.

## Features
- Chunked: a file is split into fixed-size parts (10 MiB by default).
  Each part is uploaded to its own pre-signed URL, and the storage layer returns a completion token(ETag) per part.

- Bounded parallelism
  Parts are uploaded in batches of 3 (configurable). The next batch starts only after the previous one is resolved,
  so at most 3 transfers are in flight at any time. Destination URLs are fetched per batch, so they never expire while waiting.

- Retry
  A failed part is retried up to 3 times with linear backoff (1s, 2s). A part that exhausts its retries fails the session.

- Resumable
  Uploaded parts and their tokens are durable session state. A session can be saved as a resume record and continued
  in another process; already uploaded parts are skipped.

- Cancellable
  One cancellation token is threaded through every outstanding call. Cancelling aborts in-flight transfers
  and sends a best-effort cancel request to the destination service.

- Observable
  Every state change is published as an `UploadEvent`, in order, on a channel and optionally to an `EventCallback`.
  `ProgressProjector` turns a session snapshot into percent, throughput and ETA.

## As a library
chunkup CLI is a very thin wrapper of the chunkup library.

Example usage
=============

```Toml
[dependencies]
chunkup = "0.4"
tokio = { version = "1", features = ["full"] }

# If you want to use EventCallback, you need to add async-trait crate.
async-trait = "0.1"
```

```no_run
use std::path::Path;

use async_trait::async_trait;

use chunkup::config::Config;
use chunkup::config::args::parse_from_args;
use chunkup::destination::http::HttpDestination;
use chunkup::types::UploadEvent;
use chunkup::types::event_callback::{EventCallback, EventData, EventType};
use chunkup::types::token::create_upload_cancellation_token;
use chunkup::upload::UploadSessionController;
use chunkup::upload::source::UploadSource;

// This struct represents a user-defined event callback.
pub struct DebugEventCallback;

#[async_trait]
impl EventCallback for DebugEventCallback {
    // The callbacks are called serially, and the callback function MUST return immediately.
    // If a callback function takes a long time to execute, it blocks the session.
    async fn on_event(&mut self, event_data: EventData) {
        println!("{event_data:?}");
    }
}

#[tokio::main]
async fn main() {
    // You can use all the arguments for chunkup CLI.
    let args = vec![
        "program_name",
        "--endpoint-url",
        "https://api.example.com/uploads",
        "--bearer-token",
        "my-token",
        "./lecture.mp4",
    ];

    let mut config = Config::try_from(parse_from_args(args).unwrap()).unwrap();
    config.event_manager.register_callback(
        EventType::SESSION_COMPLETE | EventType::SESSION_FAILED | EventType::SESSION_CANCEL,
        DebugEventCallback {},
    );

    let destination = HttpDestination::boxed_new(&config.destination_config).unwrap();
    let source = UploadSource::from_path(Path::new("./lecture.mp4")).await.unwrap();

    // You can use this token to cancel the upload from another task.
    let cancellation_token = create_upload_cancellation_token();
    let mut controller = UploadSessionController::new(config, destination, cancellation_token);
    let event_receiver = controller.get_event_receiver();

    let result = controller.start_upload(&source).await;
    controller.close_event_sender();

    while let Ok(event) = event_receiver.try_recv() {
        if let UploadEvent::Progress(snapshot) = event {
            println!("{:.0}%", snapshot.progress_percent);
        }
    }

    match result {
        Ok(outcome) => println!("master: {:?}", outcome.outputs.master),
        Err(e) => println!("upload failed: {e}"),
    }
}
```

For more examples,
=============
see the chunkup binary source code(`src/bin/chunkup`) and the integration tests(`tests`).
*/

pub use config::Config;
pub use config::args::CLIArgs;

pub mod config;
pub mod destination;
pub mod types;
pub mod upload;
