use gpu_eca::{FrameView, RenderStyle, Renderer};

/// Draws the automaton onto an egui layer, one filled rect per live cell
pub struct PainterRenderer<'p> {
    painter: &'p egui::Painter,
    origin: egui::Pos2,
}

impl<'p> PainterRenderer<'p> {
    pub fn new(painter: &'p egui::Painter, origin: egui::Pos2) -> Self {
        Self { painter, origin }
    }
}

impl Renderer for PainterRenderer<'_> {
    /// `cell_size` is in egui points
    fn render(&mut self, frame: &FrameView<'_>, cell_size: f32, style: &RenderStyle) {
        for (r, c) in frame.live_cells() {
            let [red, green, blue, alpha] = style.cell_rgba(r, c, frame);
            if alpha == 0 {
                continue;
            }
            let min = self.origin + egui::vec2(c as f32 * cell_size, r as f32 * cell_size);
            let rect = egui::Rect::from_min_size(min, egui::vec2(cell_size, cell_size));
            self.painter
                .rect_filled(rect, 0.0, egui::Color32::from_rgba_unmultiplied(red, green, blue, alpha));
        }
    }
}
