//! Run lifecycle for a single upload-and-analyze session.
//!
//! The state machine is pure: it consumes stream events and returns the
//! side effects the controller must perform. That keeps the promotion rules
//! (artwork preload, two-slot chunk buffer) unit testable without threads.

use crate::protocol::{ChunkData, StreamEvent, WaveformFrame};

/// Where the current run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunPhase {
    #[default]
    Idle,
    Uploading,
    Processing,
    Complete,
    Failed,
}

impl RunPhase {
    /// Terminal phases accept no further stream events.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// Audio file chosen in the picker, before and during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub path: std::path::PathBuf,
    pub name: String,
    pub size_bytes: u64,
}

impl SelectedFile {
    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

/// Segment metrics promoted to the display slot.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayChunk {
    pub chunk_number: u32,
    pub total_chunks: u32,
    pub data: ChunkData,
}

/// Segment parked until its artwork finishes loading.
#[derive(Debug, Clone, PartialEq)]
struct PendingChunk {
    chunk_number: u32,
    total_chunks: u32,
    data: ChunkData,
}

/// Side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum StateAction {
    /// Fetch segment artwork in the background; report back with
    /// [`RunState::artwork_loaded`] carrying the same chunk number.
    FetchArtwork { url: String, chunk_number: u32 },
    /// The displayed segment changed and any shown artwork is stale.
    ClearArtwork,
}

/// Full state of one processing run.
#[derive(Debug, Default)]
pub struct RunState {
    pub phase: RunPhase,
    pub selected: Option<SelectedFile>,
    /// Service-reported progress percentage, 0-100.
    pub progress: f32,
    pub stage_label: &'static str,
    pub frames: Vec<WaveformFrame>,
    pub display_chunk: Option<DisplayChunk>,
    pub error: Option<String>,
    pending_chunk: Option<PendingChunk>,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the picked file without starting anything.
    pub fn select_file(&mut self, file: SelectedFile) {
        self.selected = Some(file);
    }

    /// Start a run for the selected file: clears all prior run output.
    pub fn begin(&mut self) {
        let selected = self.selected.take();
        *self = Self {
            selected,
            phase: RunPhase::Uploading,
            stage_label: "Uploading…",
            ..Self::default()
        };
    }

    /// Upload finished; the stream is about to start.
    pub fn upload_complete(&mut self) {
        if self.phase == RunPhase::Uploading {
            self.phase = RunPhase::Processing;
            self.stage_label = "Starting…";
        }
    }

    /// Abandon the run quietly: cancellation is not an error.
    pub fn reset(&mut self) {
        let selected = self.selected.take();
        *self = Self {
            selected,
            ..Self::default()
        };
    }

    /// Record a stream failure verbatim; the run is over.
    pub fn fail(&mut self, message: String) {
        if self.phase.is_terminal() {
            return;
        }
        self.phase = RunPhase::Failed;
        self.stage_label = "Failed";
        self.error = Some(message);
        self.pending_chunk = None;
    }

    /// Apply one decoded stream event, returning requested side effects.
    ///
    /// Events after a terminal phase are dropped; a stream that keeps
    /// talking after `complete` or `error` cannot corrupt the final view.
    pub fn apply_event(&mut self, event: StreamEvent) -> Vec<StateAction> {
        if self.phase.is_terminal() {
            return Vec::new();
        }
        self.phase = RunPhase::Processing;
        if let Some(progress) = event.progress() {
            self.progress = progress.clamp(0.0, 100.0);
        }
        match event {
            StreamEvent::Starting { .. } => {
                self.stage_label = "Starting…";
                Vec::new()
            }
            StreamEvent::LoadingAudio { .. } => {
                self.stage_label = "Loading audio…";
                Vec::new()
            }
            StreamEvent::WaveformReady { waveform, .. } => {
                // Contributes samples only; the stage label is untouched.
                self.extend_frames(waveform);
                Vec::new()
            }
            StreamEvent::ProcessingChunk {
                chunk_number,
                total_chunks,
                data,
                ..
            } => {
                self.stage_label = "Processing…";
                self.accept_chunk(chunk_number, total_chunks, data)
            }
            StreamEvent::Complete { .. } => {
                self.phase = RunPhase::Complete;
                self.stage_label = "Complete!";
                self.progress = 100.0;
                // A segment still waiting on artwork is shown as-is.
                self.promote_pending();
                Vec::new()
            }
            StreamEvent::Error { message } => {
                self.fail(message);
                Vec::new()
            }
        }
    }

    /// Artwork fetch finished (or failed) for `chunk_number`.
    ///
    /// Promotes the parked segment if it is still the one waiting; results
    /// for superseded segments are ignored. A failed fetch still promotes,
    /// a segment is never held back by missing artwork.
    pub fn artwork_loaded(&mut self, chunk_number: u32) {
        if self
            .pending_chunk
            .as_ref()
            .is_some_and(|pending| pending.chunk_number == chunk_number)
        {
            self.promote_pending();
        }
    }

    /// Latest chunk counter to show, from whichever slot is freshest.
    pub fn chunk_counter(&self) -> Option<(u32, u32)> {
        self.pending_chunk
            .as_ref()
            .map(|p| (p.chunk_number, p.total_chunks))
            .or_else(|| {
                self.display_chunk
                    .as_ref()
                    .map(|c| (c.chunk_number, c.total_chunks))
            })
    }

    fn accept_chunk(
        &mut self,
        chunk_number: u32,
        total_chunks: u32,
        data: ChunkData,
    ) -> Vec<StateAction> {
        match data.image_url.clone() {
            Some(url) if !url.is_empty() => {
                // Park the segment until its artwork arrives. A newer
                // segment replaces a parked one; latest wins.
                self.pending_chunk = Some(PendingChunk {
                    chunk_number,
                    total_chunks,
                    data,
                });
                vec![StateAction::FetchArtwork { url, chunk_number }]
            }
            _ => {
                self.pending_chunk = None;
                self.display_chunk = Some(DisplayChunk {
                    chunk_number,
                    total_chunks,
                    data,
                });
                vec![StateAction::ClearArtwork]
            }
        }
    }

    fn promote_pending(&mut self) {
        if let Some(pending) = self.pending_chunk.take() {
            self.display_chunk = Some(DisplayChunk {
                chunk_number: pending.chunk_number,
                total_chunks: pending.total_chunks,
                data: pending.data,
            });
        }
    }

    /// Append frames not already present, keyed by timestamp.
    ///
    /// The batch arrives time-ordered; repeat deliveries of the same batch
    /// are deduplicated instead of doubling the curve.
    fn extend_frames(&mut self, incoming: Vec<WaveformFrame>) {
        for frame in incoming {
            match self.frames.last() {
                Some(last) if frame.time <= last.time => {}
                _ => self.frames.push(frame),
            }
        }
    }
}

/// Tone of the status bar message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusTone {
    #[default]
    Info,
    Success,
    Error,
}

/// Transient message shown in the bottom status bar.
#[derive(Debug, Default)]
pub struct StatusState {
    pub message: String,
    pub tone: StatusTone,
}

impl StatusState {
    pub fn set(&mut self, message: impl Into<String>, tone: StatusTone) {
        self.message = message.into();
        self.tone = tone;
    }

    pub fn clear(&mut self) {
        self.message.clear();
        self.tone = StatusTone::Info;
    }
}
