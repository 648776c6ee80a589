//! Moodwave: upload a track, stream its analysis, watch the mood unfold.
//!
//! The crate splits into a service client (`api`, `stream`, `protocol`),
//! playback (`audio`), waveform geometry (`waveform`), and the egui shell
//! (`egui_app`). Ambient pieces live in `app_dirs`, `config`, `logging`,
//! and `http_client`.

pub mod api;
pub mod app_dirs;
pub mod audio;
pub mod config;
pub mod egui_app;
pub mod http_client;
pub mod logging;
pub mod protocol;
pub mod stream;
pub mod waveform;
