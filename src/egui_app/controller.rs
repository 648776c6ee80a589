//! Glue between the UI, the state machine, and the background workers.

pub mod jobs;

use crate::audio::AudioPlayer;
use crate::config::AppConfig;
use crate::egui_app::state::{
    RunPhase, RunState, SelectedFile, StateAction, StatusState, StatusTone,
};
use crate::waveform::SmoothedClock;
use jobs::{RunJobs, RunMessage};

/// Owns everything the frame loop touches.
pub struct EguiController {
    pub run: RunState,
    pub status: StatusState,
    pub config: AppConfig,
    jobs: RunJobs,
    /// Run whose messages are still applied. Survives stream completion so
    /// a slow artwork fetch for the final segment is not discarded.
    current_run_id: Option<u64>,
    player: Option<AudioPlayer>,
    clock: SmoothedClock,
    artwork: Option<egui::ColorImage>,
    artwork_revision: u64,
}

impl EguiController {
    pub fn new(config: AppConfig) -> Self {
        let player = match AudioPlayer::new() {
            Ok(mut player) => {
                player.set_volume(config.volume);
                Some(player)
            }
            Err(err) => {
                // No output device is not fatal; analysis still works.
                tracing::warn!("Audio output unavailable: {err}");
                None
            }
        };
        Self {
            run: RunState::new(),
            status: StatusState::default(),
            config,
            jobs: RunJobs::new(),
            current_run_id: None,
            player,
            clock: SmoothedClock::new(),
            artwork: None,
            artwork_revision: 0,
        }
    }

    /// Open the native picker and remember the chosen audio file.
    pub fn pick_file(&mut self) {
        let Some(path) = rfd::FileDialog::new()
            .add_filter("Audio", &["mp3", "wav", "flac", "ogg", "m4a", "aac"])
            .pick_file()
        else {
            return;
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        tracing::info!("Selected {name} ({size_bytes} bytes)");
        self.run.select_file(SelectedFile {
            path,
            name,
            size_bytes,
        });
        self.status.clear();
    }

    /// Kick off upload and analysis for the selected file.
    pub fn submit(&mut self) {
        let Some(file) = self.run.selected.clone() else {
            self.status.set("Choose an audio file first", StatusTone::Error);
            return;
        };
        self.run.begin();
        self.clock.reset();
        self.set_artwork(None);
        if let Some(player) = &mut self.player {
            player.stop();
            player.clear();
        }
        let run_id = self.jobs.begin_run(
            file,
            self.config.upload_url.clone(),
            self.config.process_url.clone(),
        );
        self.current_run_id = Some(run_id);
        self.status.set("Uploading…", StatusTone::Info);
    }

    /// Abort the active run. Cancellation is silent: no error state, no
    /// status message, just back to idle with the file still selected.
    pub fn cancel_run(&mut self) {
        self.jobs.cancel_active();
        self.current_run_id = None;
        self.run.reset();
        self.clock.reset();
        self.set_artwork(None);
        if let Some(player) = &mut self.player {
            player.stop();
        }
        self.status.clear();
    }

    /// True while a run is in a cancellable phase.
    pub fn run_in_flight(&self) -> bool {
        matches!(self.run.phase, RunPhase::Uploading | RunPhase::Processing)
    }

    /// Drain worker messages; called once per frame before drawing.
    pub fn poll_jobs(&mut self) {
        for message in self.jobs.poll_messages() {
            if Some(message.run_id()) != self.current_run_id {
                // Superseded or cancelled run still winding down.
                continue;
            }
            self.handle_message(message);
        }
    }

    fn handle_message(&mut self, message: RunMessage) {
        match message {
            RunMessage::Uploaded { audio_bytes, .. } => {
                self.run.upload_complete();
                if let Some(player) = &mut self.player {
                    player.set_audio(audio_bytes);
                }
                self.status.set("Processing…", StatusTone::Info);
            }
            RunMessage::Event { event, .. } => {
                let actions = self.run.apply_event(event);
                self.perform_actions(actions);
                match self.run.phase {
                    RunPhase::Complete => {
                        self.status.set("Analysis complete", StatusTone::Success);
                    }
                    RunPhase::Failed => {
                        let message = self
                            .run
                            .error
                            .clone()
                            .unwrap_or_else(|| "Processing failed".to_string());
                        self.status.set(message, StatusTone::Error);
                    }
                    _ => {}
                }
            }
            RunMessage::Finished { .. } => {
                if !self.run.phase.is_terminal() {
                    // EOF without a complete or error record.
                    self.run.fail("Stream ended before completion".to_string());
                    self.status
                        .set("Stream ended before completion", StatusTone::Error);
                }
                self.jobs.finish_active();
            }
            RunMessage::Cancelled { .. } => {
                self.jobs.finish_active();
            }
            RunMessage::Failed { message, .. } => {
                tracing::error!("Run failed: {message}");
                self.run.fail(message.clone());
                self.status.set(message, StatusTone::Error);
                self.jobs.finish_active();
            }
            RunMessage::ArtworkLoaded {
                chunk_number, image, ..
            } => {
                self.run.artwork_loaded(chunk_number);
                if self.run.display_chunk.as_ref().map(|c| c.chunk_number) == Some(chunk_number) {
                    self.set_artwork(image);
                }
            }
        }
    }

    fn perform_actions(&mut self, actions: Vec<StateAction>) {
        for action in actions {
            match action {
                StateAction::FetchArtwork { url, chunk_number } => {
                    if let Some(run_id) = self.current_run_id {
                        self.jobs.begin_artwork_fetch(run_id, chunk_number, url);
                    }
                }
                StateAction::ClearArtwork => self.set_artwork(None),
            }
        }
    }

    fn set_artwork(&mut self, image: Option<egui::ColorImage>) {
        self.artwork = image;
        self.artwork_revision += 1;
    }

    /// Current artwork pixels with a revision counter for texture caching.
    pub fn artwork(&self) -> (u64, Option<&egui::ColorImage>) {
        (self.artwork_revision, self.artwork.as_ref())
    }

    /// Advance the playhead clock by one frame's wall time.
    pub fn tick_playhead(&mut self, dt: f32) {
        let Some(player) = &self.player else { return };
        if player.is_playing() {
            if let Some(position) = player.position() {
                self.clock.tick(position, dt);
            }
        }
    }

    /// Smoothed playback position driving the waveform window.
    pub fn playhead(&self) -> f32 {
        self.clock.current()
    }

    pub fn playback_available(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.duration().is_some())
    }

    pub fn is_playing(&self) -> bool {
        self.player.as_ref().is_some_and(|p| p.is_playing())
    }

    pub fn play(&mut self) {
        let Some(player) = &mut self.player else { return };
        self.clock.reset();
        if let Err(err) = player.play() {
            tracing::warn!("Playback failed: {err}");
            self.status.set("Playback failed", StatusTone::Error);
        }
    }

    pub fn stop_playback(&mut self) {
        if let Some(player) = &mut self.player {
            player.stop();
        }
    }
}
