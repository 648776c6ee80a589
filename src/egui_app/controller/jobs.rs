//! Background workers for upload, stream reading, and artwork fetches.
//!
//! Each run gets a worker thread that reports back over an mpsc channel
//! polled from the frame loop. Messages carry the run id they belong to;
//! the controller drops anything from a superseded run.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

use crate::api;
use crate::egui_app::state::SelectedFile;
use crate::protocol::StreamEvent;
use crate::stream::{self, StreamOutcome};

/// Progress report from a worker thread.
#[derive(Debug)]
pub enum RunMessage {
    /// Upload finished; carries the file bytes for local playback.
    Uploaded { run_id: u64, audio_bytes: Vec<u8> },
    /// One decoded stream event, in arrival order.
    Event { run_id: u64, event: StreamEvent },
    /// The stream ended normally.
    Finished { run_id: u64 },
    /// The cancel flag stopped the run; no user-visible failure.
    Cancelled { run_id: u64 },
    /// The run failed; `message` is what the status bar shows.
    Failed { run_id: u64, message: String },
    /// Artwork fetch result; `image` is `None` when the fetch failed.
    ArtworkLoaded {
        run_id: u64,
        chunk_number: u32,
        image: Option<egui::ColorImage>,
    },
}

impl RunMessage {
    pub fn run_id(&self) -> u64 {
        match self {
            Self::Uploaded { run_id, .. }
            | Self::Event { run_id, .. }
            | Self::Finished { run_id }
            | Self::Cancelled { run_id }
            | Self::Failed { run_id, .. }
            | Self::ArtworkLoaded { run_id, .. } => *run_id,
        }
    }
}

struct ActiveRun {
    run_id: u64,
    cancel: Arc<AtomicBool>,
}

/// Owns the message channel and the run bookkeeping.
pub struct RunJobs {
    message_tx: Sender<RunMessage>,
    message_rx: Receiver<RunMessage>,
    next_run_id: u64,
    active: Option<ActiveRun>,
}

impl Default for RunJobs {
    fn default() -> Self {
        Self::new()
    }
}

impl RunJobs {
    pub fn new() -> Self {
        let (message_tx, message_rx) = channel();
        Self {
            message_tx,
            message_rx,
            next_run_id: 0,
            active: None,
        }
    }

    /// Id of the run whose messages are still welcome.
    pub fn active_run_id(&self) -> Option<u64> {
        self.active.as_ref().map(|run| run.run_id)
    }

    /// Raise the cancel flag on the active run, if any.
    ///
    /// The worker notices between reads and winds down on its own; nothing
    /// is joined here so the UI never blocks on a stalled socket.
    pub fn cancel_active(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.store(true, Ordering::Relaxed);
        }
    }

    /// Drain all pending worker messages in arrival order.
    pub fn poll_messages(&mut self) -> Vec<RunMessage> {
        self.message_rx.try_iter().collect()
    }

    /// Mark the active run as over so late messages are discarded.
    pub fn finish_active(&mut self) {
        self.active = None;
    }

    /// Start a worker for `file`: read, upload, then drain the event stream.
    ///
    /// A still-active previous run is cancelled first.
    pub fn begin_run(&mut self, file: SelectedFile, upload_url: String, process_url: String) -> u64 {
        self.cancel_active();
        self.next_run_id += 1;
        let run_id = self.next_run_id;
        let cancel = Arc::new(AtomicBool::new(false));
        self.active = Some(ActiveRun {
            run_id,
            cancel: Arc::clone(&cancel),
        });

        let tx = self.message_tx.clone();
        thread::spawn(move || {
            run_worker(run_id, file, upload_url, process_url, cancel, tx);
        });
        run_id
    }

    /// Fetch segment artwork off-thread; reports [`RunMessage::ArtworkLoaded`].
    pub fn begin_artwork_fetch(&self, run_id: u64, chunk_number: u32, url: String) {
        let tx = self.message_tx.clone();
        thread::spawn(move || {
            let image = match api::fetch_artwork(&url) {
                Ok(image) => Some(image),
                Err(err) => {
                    tracing::warn!("Artwork fetch failed for segment {chunk_number}: {err}");
                    None
                }
            };
            let _ = tx.send(RunMessage::ArtworkLoaded {
                run_id,
                chunk_number,
                image,
            });
        });
    }
}

fn run_worker(
    run_id: u64,
    file: SelectedFile,
    upload_url: String,
    process_url: String,
    cancel: Arc<AtomicBool>,
    tx: Sender<RunMessage>,
) {
    let cancelled = || cancel.load(Ordering::Relaxed);
    let bytes = match std::fs::read(&file.path) {
        Ok(bytes) => bytes,
        Err(err) => {
            let _ = tx.send(RunMessage::Failed {
                run_id,
                message: format!("Could not read {}: {err}", file.path.display()),
            });
            return;
        }
    };
    if cancelled() {
        let _ = tx.send(RunMessage::Cancelled { run_id });
        return;
    }

    tracing::info!(
        "Uploading {} ({} bytes) for run {run_id}",
        file.name,
        bytes.len()
    );
    let audio_url = match api::upload_audio(&upload_url, &file.name, &bytes) {
        Ok(url) => url,
        Err(err) => {
            if cancelled() {
                let _ = tx.send(RunMessage::Cancelled { run_id });
            } else {
                let _ = tx.send(RunMessage::Failed {
                    run_id,
                    message: format!("Upload failed: {err}"),
                });
            }
            return;
        }
    };
    let _ = tx.send(RunMessage::Uploaded {
        run_id,
        audio_bytes: bytes,
    });
    if cancelled() {
        let _ = tx.send(RunMessage::Cancelled { run_id });
        return;
    }

    tracing::info!("Starting analysis stream for run {run_id}");
    let body = match api::process_audio(&process_url, &audio_url) {
        Ok(body) => body,
        Err(err) => {
            if cancelled() {
                let _ = tx.send(RunMessage::Cancelled { run_id });
            } else {
                let _ = tx.send(RunMessage::Failed {
                    run_id,
                    message: format!("Processing request failed: {err}"),
                });
            }
            return;
        }
    };

    let outcome = stream::read_events(body, &cancel, |event| {
        let _ = tx.send(RunMessage::Event { run_id, event });
    });
    let message = match outcome {
        Ok(StreamOutcome::Finished) => RunMessage::Finished { run_id },
        Ok(StreamOutcome::Cancelled) => RunMessage::Cancelled { run_id },
        Err(err) => {
            if cancelled() {
                RunMessage::Cancelled { run_id }
            } else {
                RunMessage::Failed {
                    run_id,
                    message: format!("Stream interrupted: {err}"),
                }
            }
        }
    };
    let _ = tx.send(message);
}
