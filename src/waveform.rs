//! Geometry for the scrolling waveform view.
//!
//! Pure math, kept free of egui layout so it can be unit tested: window
//! selection against the playhead, per-window amplitude normalization, the
//! smoothed playback clock, and the midpoint-quadratic curve tessellation
//! the painter fills.

use egui::Color32;

use crate::protocol::WaveformFrame;

/// Seconds of audio visible in the scrolling window.
pub const WINDOW_SECONDS: f32 = 15.0;

/// Divergence between the smoothed clock and the authoritative playback
/// position beyond which the clock snaps instead of drifting (covers seeks
/// and restarts).
pub const SNAP_THRESHOLD_SECONDS: f32 = 0.5;

/// Tessellation steps per quadratic curve segment.
const CURVE_STEPS: usize = 8;

/// Locally interpolated playback time between sparse ground-truth updates.
///
/// The authoritative position only changes a few times per second; each
/// frame the clock advances by the measured wall-clock delta so the window
/// scrolls continuously, and snaps whenever ground truth disagrees by more
/// than [`SNAP_THRESHOLD_SECONDS`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothedClock {
    smoothed: f32,
}

impl SmoothedClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `dt` seconds and reconcile against the authoritative time.
    pub fn tick(&mut self, authoritative: f32, dt: f32) -> f32 {
        self.smoothed += dt.max(0.0);
        if (authoritative - self.smoothed).abs() > SNAP_THRESHOLD_SECONDS {
            self.smoothed = authoritative;
        }
        self.smoothed
    }

    /// Current smoothed time without advancing.
    pub fn current(&self) -> f32 {
        self.smoothed
    }

    /// Reset to zero for a fresh run.
    pub fn reset(&mut self) {
        self.smoothed = 0.0;
    }
}

/// Visible time window ending at the playhead.
///
/// The window never starts before zero: until the playhead passes the
/// window length, the full first [`WINDOW_SECONDS`] are shown.
pub fn visible_window(now: f32) -> (f32, f32) {
    let end = now.max(WINDOW_SECONDS);
    (end - WINDOW_SECONDS, end)
}

/// Slice of `frames` whose time lies in `[start, end]`, inclusive both ends.
///
/// Frames are time-ordered, so the bounds are found by binary search.
pub fn visible_frames(frames: &[WaveformFrame], start: f32, end: f32) -> &[WaveformFrame] {
    let first = frames.partition_point(|frame| frame.time < start);
    let last = frames.partition_point(|frame| frame.time <= end);
    &frames[first..last]
}

/// Largest amplitude among the visible frames, used to rescale each window.
pub fn max_amplitude(frames: &[WaveformFrame]) -> Option<f32> {
    frames
        .iter()
        .map(|frame| frame.amplitude)
        .fold(None, |acc, amplitude| match acc {
            Some(max) if max >= amplitude => Some(max),
            _ => Some(amplitude),
        })
}

/// Parse a service color token (`#rgb` or `#rrggbb`) into a color.
pub fn parse_color_token(token: &str) -> Option<Color32> {
    let hex = token.trim().strip_prefix('#')?;
    match hex.len() {
        3 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            let r = ((value >> 8) & 0xf) as u8;
            let g = ((value >> 4) & 0xf) as u8;
            let b = (value & 0xf) as u8;
            Some(Color32::from_rgb(r * 17, g * 17, b * 17))
        }
        6 => {
            let value = u32::from_str_radix(hex, 16).ok()?;
            Some(Color32::from_rgb(
                ((value >> 16) & 0xff) as u8,
                ((value >> 8) & 0xff) as u8,
                (value & 0xff) as u8,
            ))
        }
        _ => None,
    }
}

/// One tessellated point of the display curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurvePoint {
    /// Horizontal position across the window, 0.0 at `start`, 1.0 at `end`.
    pub x: f32,
    /// Amplitude normalized by the visible maximum, 0.0-1.0.
    pub level: f32,
    /// Gradient color interpolated between neighboring frame tokens.
    pub color: Color32,
}

/// Tessellate the visible frames into a smooth curve.
///
/// Midpoint-quadratic interpolation: consecutive frame midpoints are the
/// on-curve knots and each frame is the control point between them, which
/// keeps the curve inside the amplitude envelope. Returns an empty vec for
/// fewer than two frames — a lone sample draws nothing but the playhead.
pub fn curve_points(
    frames: &[WaveformFrame],
    start: f32,
    end: f32,
    fallback: Color32,
) -> Vec<CurvePoint> {
    if frames.len() < 2 || end <= start {
        return Vec::new();
    }
    let span = end - start;
    let max = max_amplitude(frames).filter(|max| *max > 0.0).unwrap_or(1.0);
    let knots: Vec<(f32, f32, Color32)> = frames
        .iter()
        .map(|frame| {
            (
                ((frame.time - start) / span).clamp(0.0, 1.0),
                (frame.amplitude / max).clamp(0.0, 1.0),
                parse_color_token(&frame.color).unwrap_or(fallback),
            )
        })
        .collect();

    let mut points = Vec::with_capacity(knots.len() * CURVE_STEPS);
    points.push(CurvePoint {
        x: knots[0].0,
        level: knots[0].1,
        color: knots[0].2,
    });
    for i in 1..knots.len() {
        let (from_x, from_level) = match points.last() {
            Some(last) => (last.x, last.level),
            None => (knots[i - 1].0, knots[i - 1].1),
        };
        let control = knots[i];
        let target = if i + 1 < knots.len() {
            let next = knots[i + 1];
            (
                (control.0 + next.0) * 0.5,
                (control.1 + next.1) * 0.5,
            )
        } else {
            (control.0, control.1)
        };
        for step in 1..=CURVE_STEPS {
            let t = step as f32 / CURVE_STEPS as f32;
            let inv = 1.0 - t;
            let x = inv * inv * from_x + 2.0 * inv * t * control.0 + t * t * target.0;
            let level = inv * inv * from_level + 2.0 * inv * t * control.1 + t * t * target.1;
            points.push(CurvePoint {
                x,
                level,
                color: gradient_color(&knots, x, fallback),
            });
        }
    }
    points
}

/// Left-to-right gradient sourced from the frame color tokens.
fn gradient_color(knots: &[(f32, f32, Color32)], x: f32, fallback: Color32) -> Color32 {
    match knots {
        [] => fallback,
        [only] => only.2,
        _ => {
            let upper = knots.partition_point(|knot| knot.0 <= x);
            if upper == 0 {
                return knots[0].2;
            }
            if upper >= knots.len() {
                return knots[knots.len() - 1].2;
            }
            let left = knots[upper - 1];
            let right = knots[upper];
            let width = right.0 - left.0;
            let t = if width > f32::EPSILON {
                ((x - left.0) / width).clamp(0.0, 1.0)
            } else {
                0.0
            };
            lerp_color(left.2, right.2, t)
        }
    }
}

fn lerp_color(from: Color32, to: Color32, t: f32) -> Color32 {
    let lerp = |a: u8, b: u8| -> u8 {
        (a as f32 + (b as f32 - a as f32) * t).round().clamp(0.0, 255.0) as u8
    };
    Color32::from_rgb(
        lerp(from.r(), to.r()),
        lerp(from.g(), to.g()),
        lerp(from.b(), to.b()),
    )
}
