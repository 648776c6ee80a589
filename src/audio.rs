use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use rodio::{Decoder, OutputStream, OutputStreamBuilder, Sink, Source};

/// Granularity of the reported playback position.
///
/// Positions are quantized to this step so the value behaves like the coarse
/// progress ticks a media element emits; the waveform view's smoothed clock
/// interpolates between them.
pub const POSITION_TICK_SECONDS: f32 = 0.25;

/// Plays the selected file's bytes and reports coarse playback progress.
pub struct AudioPlayer {
    stream: OutputStream,
    sink: Option<Sink>,
    current_audio: Option<Arc<[u8]>>,
    track_duration: Option<f32>,
    started_at: Option<Instant>,
    volume: f32,
}

impl AudioPlayer {
    /// Create a new audio player using the default output device.
    pub fn new() -> Result<Self, String> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|error| format!("Audio init failed: {error}"))?;
        Ok(Self {
            stream,
            sink: None,
            current_audio: None,
            track_duration: None,
            started_at: None,
            volume: 1.0,
        })
    }

    /// Store audio bytes for later playback, replacing any previous track.
    pub fn set_audio(&mut self, data: Vec<u8>) {
        self.stop();
        let audio: Arc<[u8]> = Arc::from(data);
        self.track_duration = decoded_duration(&audio);
        self.current_audio = Some(audio);
    }

    /// Drop the loaded track and stop playback.
    pub fn clear(&mut self) {
        self.stop();
        self.current_audio = None;
        self.track_duration = None;
    }

    /// Adjust master output volume for current and future playback.
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = self.sink.as_ref() {
            sink.set_volume(self.volume);
        }
    }

    /// Stop any active playback.
    pub fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.started_at = None;
    }

    /// Begin playback of the stored track from the start.
    pub fn play(&mut self) -> Result<(), String> {
        let bytes = self
            .current_audio
            .clone()
            .ok_or_else(|| "Select an audio file first".to_string())?;
        self.stop();
        let source = Decoder::new(Cursor::new(bytes))
            .map_err(|error| format!("Audio decode failed: {error}"))?;
        let sink = Sink::connect_new(self.stream.mixer());
        sink.set_volume(self.volume);
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        self.started_at = Some(Instant::now());
        Ok(())
    }

    /// True while the sink is still playing the queued audio.
    pub fn is_playing(&self) -> bool {
        self.sink
            .as_ref()
            .map(|sink| !sink.empty())
            .unwrap_or(false)
            && self.started_at.is_some()
    }

    /// Track duration in seconds, when the decoder could report one.
    pub fn duration(&self) -> Option<f32> {
        self.track_duration
    }

    /// Coarse playback position in seconds since playback began.
    pub fn position(&self) -> Option<f32> {
        let started_at = self.started_at?;
        let elapsed = started_at.elapsed().as_secs_f32();
        let quantized = quantize_position(elapsed, POSITION_TICK_SECONDS);
        Some(match self.track_duration {
            Some(duration) => quantized.min(duration),
            None => quantized,
        })
    }
}

fn decoded_duration(bytes: &Arc<[u8]>) -> Option<f32> {
    Decoder::new(Cursor::new(bytes.clone()))
        .ok()
        .and_then(|decoder| decoder.total_duration())
        .map(|duration| duration.as_secs_f32())
}

fn quantize_position(elapsed: f32, tick: f32) -> f32 {
    if tick <= 0.0 {
        return elapsed.max(0.0);
    }
    (elapsed.max(0.0) / tick).floor() * tick
}
