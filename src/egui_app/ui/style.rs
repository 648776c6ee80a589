use eframe::egui::{Color32, Stroke, Visuals, style::WidgetVisuals};

#[derive(Clone, Copy)]
pub struct Palette {
    pub bg_primary: Color32,
    pub bg_secondary: Color32,
    pub bg_tertiary: Color32,
    pub panel_outline: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub accent: Color32,
    pub accent_soft: Color32,
    pub warning: Color32,
    pub success: Color32,
}

pub fn palette() -> Palette {
    Palette {
        bg_primary: Color32::from_rgb(12, 10, 16),
        bg_secondary: Color32::from_rgb(24, 22, 32),
        bg_tertiary: Color32::from_rgb(38, 34, 50),
        panel_outline: Color32::from_rgb(52, 46, 68),
        text_primary: Color32::from_rgb(210, 205, 222),
        text_muted: Color32::from_rgb(145, 140, 160),
        accent: Color32::from_rgb(168, 130, 255),
        accent_soft: Color32::from_rgb(120, 100, 190),
        warning: Color32::from_rgb(220, 120, 110),
        success: Color32::from_rgb(110, 190, 140),
    }
}

pub fn apply_visuals(visuals: &mut Visuals) {
    let palette = palette();
    visuals.window_fill = palette.bg_primary;
    visuals.panel_fill = palette.bg_secondary;
    visuals.override_text_color = Some(palette.text_primary);
    visuals.extreme_bg_color = palette.bg_primary;
    visuals.faint_bg_color = palette.bg_secondary;
    visuals.error_fg_color = palette.warning;
    visuals.warn_fg_color = palette.warning;
    visuals.selection.bg_fill = palette.bg_tertiary;
    visuals.selection.stroke = Stroke::new(1.0, palette.accent);
    visuals.widgets.noninteractive.bg_fill = palette.bg_secondary;
    visuals.widgets.noninteractive.fg_stroke = Stroke::new(1.0, palette.text_primary);
    restyle_widget(&mut visuals.widgets.inactive, palette);
    restyle_widget(&mut visuals.widgets.hovered, palette);
    restyle_widget(&mut visuals.widgets.active, palette);
    restyle_widget(&mut visuals.widgets.open, palette);
}

fn restyle_widget(widget: &mut WidgetVisuals, palette: Palette) {
    widget.bg_fill = palette.bg_tertiary;
    widget.weak_bg_fill = palette.bg_secondary;
    widget.bg_stroke = Stroke::new(1.0, palette.panel_outline);
    widget.fg_stroke = Stroke::new(1.0, palette.text_primary);
}

pub fn with_alpha(color: Color32, alpha: u8) -> Color32 {
    Color32::from_rgba_unmultiplied(color.r(), color.g(), color.b(), alpha)
}
