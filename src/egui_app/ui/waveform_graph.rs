//! Painter for the scrolling waveform and its playhead.

use eframe::egui::{self, Color32, Stroke};

use super::style;
use crate::protocol::WaveformFrame;
use crate::waveform::{self, CurvePoint};

const GRAPH_HEIGHT: f32 = 160.0;
const PLAYHEAD_WIDTH: f32 = 2.0;

pub fn draw(ui: &mut egui::Ui, frames: &[WaveformFrame], playhead: f32) {
    let palette = style::palette();
    let width = ui.available_width();
    let (rect, _response) = ui.allocate_exact_size(
        egui::vec2(width, GRAPH_HEIGHT),
        egui::Sense::hover(),
    );
    if !ui.is_rect_visible(rect) {
        return;
    }
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 4.0, palette.bg_primary);

    let (start, end) = waveform::visible_window(playhead);
    let visible = waveform::visible_frames(frames, start, end);
    let curve = waveform::curve_points(visible, start, end, palette.accent);
    if !curve.is_empty() {
        if let Some(mesh) = fill_mesh(rect, &curve) {
            painter.add(egui::Shape::mesh(mesh));
        }
    }

    // Playhead is drawn even when too few samples are visible for a curve.
    let span = end - start;
    let playhead_frac = ((playhead - start) / span).clamp(0.0, 1.0);
    let x = rect.left() + rect.width() * playhead_frac;
    painter.line_segment(
        [egui::pos2(x, rect.top()), egui::pos2(x, rect.bottom())],
        Stroke::new(PLAYHEAD_WIDTH, palette.text_primary),
    );
}

/// Gradient fill under the curve: one opaque vertex on the curve, one faded
/// vertex on the baseline, quads between consecutive points.
fn fill_mesh(rect: egui::Rect, curve: &[CurvePoint]) -> Option<egui::epaint::Mesh> {
    if curve.len() < 2 {
        return None;
    }
    let uv = egui::pos2(0.0, 0.0);
    let mut mesh = egui::epaint::Mesh::default();
    for point in curve {
        let x = rect.left() + rect.width() * point.x;
        let top = rect.bottom() - rect.height() * point.level;
        mesh.vertices.push(egui::epaint::Vertex {
            pos: egui::pos2(x, top),
            uv,
            color: point.color,
        });
        mesh.vertices.push(egui::epaint::Vertex {
            pos: egui::pos2(x, rect.bottom()),
            uv,
            color: baseline_color(point.color),
        });
    }
    for i in 0..curve.len().saturating_sub(1) {
        let idx = (i * 2) as u32;
        mesh.indices
            .extend_from_slice(&[idx, idx + 2, idx + 3, idx, idx + 3, idx + 1]);
    }
    Some(mesh)
}

fn baseline_color(color: Color32) -> Color32 {
    style::with_alpha(color, 28)
}
