//! Wire types for the analysis service's newline-delimited JSON stream.
//!
//! The schema is owned by the external service; these types mirror it.
//! Unknown fields are tolerated so schema additions do not break old builds,
//! but an unknown `status` tag fails the line (the reader skips it).

use serde::Deserialize;

/// One amplitude sample of the full-track waveform.
///
/// Delivered once per run in a `waveform_ready` batch and immutable after
/// that. `time` is non-decreasing across the batch; `color` is a display
/// color token (e.g. `#rrggbb`) chosen by the service per sample.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WaveformFrame {
    pub time: f32,
    pub amplitude: f32,
    pub color: String,
}

/// Fixed emotion category percentages plus the model's free-text reasoning.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmotionScores {
    pub happy: f64,
    pub sad: f64,
    pub calm: f64,
    pub energetic: f64,
    pub excited: f64,
    pub relaxed: f64,
    pub angry: f64,
    pub romantic: f64,
    pub other: f64,
    pub reasoning: String,
}

impl EmotionScores {
    /// Category name/value pairs in display order, reasoning excluded.
    pub fn categories(&self) -> [(&'static str, f64); 9] {
        [
            ("happy", self.happy),
            ("sad", self.sad),
            ("calm", self.calm),
            ("energetic", self.energetic),
            ("excited", self.excited),
            ("relaxed", self.relaxed),
            ("angry", self.angry),
            ("romantic", self.romantic),
            ("other", self.other),
        ]
    }
}

/// Metrics for one analyzed audio segment.
///
/// Superseded by the next segment's instance; the client keeps at most the
/// current one plus the previously displayed one while artwork preloads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChunkData {
    pub energy: f64,
    pub tempo: f64,
    pub key: String,
    #[serde(default)]
    pub emotion: EmotionScores,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub audio_url: Option<String>,
}

/// One decoded line of the processing stream, tagged by its `status` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StreamEvent {
    Starting {
        #[serde(default)]
        progress: f32,
    },
    LoadingAudio {
        #[serde(default)]
        progress: f32,
    },
    WaveformReady {
        #[serde(default)]
        progress: f32,
        waveform: Vec<WaveformFrame>,
    },
    ProcessingChunk {
        #[serde(default)]
        progress: f32,
        chunk_number: u32,
        total_chunks: u32,
        data: ChunkData,
    },
    Complete {
        #[serde(default)]
        progress: f32,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// Progress percentage carried by the event, when it has one.
    pub fn progress(&self) -> Option<f32> {
        match self {
            Self::Starting { progress }
            | Self::LoadingAudio { progress }
            | Self::WaveformReady { progress, .. }
            | Self::ProcessingChunk { progress, .. }
            | Self::Complete { progress } => Some(*progress),
            Self::Error { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_processing_chunk_with_full_payload() {
        let line = r#"{
            "status": "processing_chunk",
            "progress": 42.5,
            "chunk_number": 3,
            "total_chunks": 12,
            "data": {
                "energy": 0.0213,
                "tempo": 128.0,
                "key": "A minor",
                "emotion": {"happy": 60.0, "sad": 5.0, "other": 35.0, "reasoning": "fast and bright"},
                "image_url": "http://img.example/3.png"
            }
        }"#;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::ProcessingChunk {
            progress,
            chunk_number,
            total_chunks,
            data,
        } = event
        else {
            panic!("wrong variant");
        };
        assert_eq!(progress, 42.5);
        assert_eq!(chunk_number, 3);
        assert_eq!(total_chunks, 12);
        assert_eq!(data.key, "A minor");
        assert_eq!(data.emotion.happy, 60.0);
        assert_eq!(data.emotion.reasoning, "fast and bright");
        assert_eq!(data.image_url.as_deref(), Some("http://img.example/3.png"));
        assert_eq!(data.audio_url, None);
    }

    #[test]
    fn parses_waveform_ready_batch() {
        let line = r##"{"status": "waveform_ready", "progress": 10,
            "waveform": [{"time": 0.0, "amplitude": 0.5, "color": "#ff8800"}]}"##;
        let event: StreamEvent = serde_json::from_str(line).unwrap();
        let StreamEvent::WaveformReady { waveform, .. } = event else {
            panic!("wrong variant");
        };
        assert_eq!(waveform.len(), 1);
        assert_eq!(waveform[0].color, "#ff8800");
    }

    #[test]
    fn error_event_carries_message_verbatim() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"status": "error", "message": "bad file"}"#).unwrap();
        assert_eq!(
            event,
            StreamEvent::Error {
                message: "bad file".into()
            }
        );
    }

    #[test]
    fn unknown_status_tag_is_rejected() {
        let result = serde_json::from_str::<StreamEvent>(r#"{"status": "warming_up"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn tolerates_extra_fields() {
        let event: StreamEvent =
            serde_json::from_str(r#"{"status": "starting", "progress": 0, "eta": 12}"#).unwrap();
        assert_eq!(event, StreamEvent::Starting { progress: 0.0 });
    }

    #[test]
    fn emotion_categories_keep_display_order() {
        let scores = EmotionScores {
            happy: 1.0,
            ..Default::default()
        };
        let categories = scores.categories();
        assert_eq!(categories[0], ("happy", 1.0));
        assert_eq!(categories[8].0, "other");
    }
}
