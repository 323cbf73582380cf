//! The renderer contract and the intensity model shared by all renderers.
//!
//! A live cell at row `r`, column `c` is drawn with opacity
//! `distance_factor * age_factor * alpha`, where the distance factor fades
//! cells away from the center column, the age factor fades older rows, and
//! `alpha` is a global multiplier from the host (the header breathes).

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::time::Duration;

use crate::generation::Row;

/// Read-only view of the sequencer's log for one draw call
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub history: &'a [Row],
    pub upto_generation: usize,
    pub cols: usize,
    pub rows: usize,
}

impl<'a> FrameView<'a> {
    /// `(row, col)` of every live cell up to `upto_generation`
    pub fn live_cells(&self) -> impl Iterator<Item = (usize, usize)> + 'a {
        let upto = self.upto_generation;
        let history = self.history;
        history
            .iter()
            .take(upto + 1)
            .enumerate()
            .flat_map(|(r, row)| {
                row.cells()
                    .iter()
                    .enumerate()
                    .filter(|(_, &cell)| cell != 0)
                    .map(move |(c, _)| (r, c))
            })
    }
}

/// Draws the generation log.
///
/// Implementations must not keep references into `frame` past the call.
pub trait Renderer {
    fn render(&mut self, frame: &FrameView<'_>, cell_size: f32, style: &RenderStyle);
}

/// Linear gradient from the center column color to the edge color
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoldenGradient {
    pub center: [u8; 3],
    pub edge: [u8; 3],
}

impl Default for GoldenGradient {
    fn default() -> Self {
        Self {
            center: [255, 215, 0],  // gold
            edge: [184, 134, 11],   // dark goldenrod
        }
    }
}

impl GoldenGradient {
    /// Color at `t` in [0, 1], 0 being the center
    pub fn color_at(&self, t: f32) -> [u8; 3] {
        let t = t.clamp(0.0, 1.0);
        let mut out = [0u8; 3];
        for (i, channel) in out.iter_mut().enumerate() {
            let a = self.center[i] as f32;
            let b = self.edge[i] as f32;
            *channel = (a + (b - a) * t).round() as u8;
        }
        out
    }
}

/// Rendering policy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// Floor of the age falloff
    pub min_age_factor: f32,
    /// Rows over which a cell fades, as a fraction of the total row count
    pub age_fade_factor: f32,
    /// Floor of the distance falloff
    pub min_distance_factor: f32,
    /// Strength of the distance falloff; 0 disables it
    pub distance_fade: f32,
    /// Global multiplier supplied by the host
    pub alpha: f32,
    pub gradient: GoldenGradient,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            min_age_factor: 0.15,
            age_fade_factor: 1.0,
            min_distance_factor: 0.25,
            distance_fade: 0.8,
            alpha: 1.0,
            gradient: GoldenGradient::default(),
        }
    }
}

impl RenderStyle {
    /// Normalized distance of `col` from the center column, 0 at the center
    pub fn distance(&self, col: usize, cols: usize) -> f32 {
        let center = (cols / 2) as f32;
        if center <= 0.0 {
            return 0.0;
        }
        ((col as f32 - center).abs() / center).min(1.0)
    }

    pub fn distance_factor(&self, col: usize, cols: usize) -> f32 {
        (1.0 - self.distance(col, cols) * self.distance_fade).max(self.min_distance_factor)
    }

    pub fn age_factor(&self, row: usize, upto_generation: usize, rows: usize) -> f32 {
        let span = rows as f32 * self.age_fade_factor;
        if span <= 0.0 {
            return 1.0;
        }
        let age = upto_generation.saturating_sub(row) as f32;
        (1.0 - age / span).max(self.min_age_factor)
    }

    /// Opacity in [0, 1] of a live cell
    pub fn cell_opacity(&self, row: usize, col: usize, frame: &FrameView<'_>) -> f32 {
        let opacity = self.distance_factor(col, frame.cols)
            * self.age_factor(row, frame.upto_generation, frame.rows)
            * self.alpha;
        opacity.clamp(0.0, 1.0)
    }

    /// RGBA of a live cell, alpha from [`cell_opacity`](Self::cell_opacity)
    pub fn cell_rgba(&self, row: usize, col: usize, frame: &FrameView<'_>) -> [u8; 4] {
        let [r, g, b] = self.gradient.color_at(self.distance(col, frame.cols));
        let a = (self.cell_opacity(row, col, frame) * 255.0).round() as u8;
        [r, g, b, a]
    }
}

/// Sinusoidal pulse for the header banner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Breathing {
    pub base: f32,
    pub amplitude: f32,
    pub period_ms: u64,
}

impl Default for Breathing {
    fn default() -> Self {
        Self {
            base: 0.75,
            amplitude: 0.25,
            period_ms: 4000,
        }
    }
}

impl Breathing {
    /// Alpha multiplier after `elapsed`, clamped to [0, 1]
    pub fn alpha_at(&self, elapsed: Duration) -> f32 {
        if self.period_ms == 0 {
            return self.base.clamp(0.0, 1.0);
        }
        let phase = (elapsed.as_millis() % self.period_ms as u128) as f32 / self.period_ms as f32;
        (self.base + self.amplitude * (TAU * phase).sin()).clamp(0.0, 1.0)
    }
}

/// Rasterizes the log into an RGBA framebuffer (row-major, straight alpha)
#[derive(Debug, Default, Clone)]
pub struct PixelRenderer {
    width: usize,
    height: usize,
    pixels: Vec<[u8; 4]>,
}

impl PixelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(y * self.width + x).copied()
    }
}

impl Renderer for PixelRenderer {
    fn render(&mut self, frame: &FrameView<'_>, cell_size: f32, style: &RenderStyle) {
        let cell = cell_size.round().max(1.0) as usize;
        self.width = frame.cols * cell;
        self.height = frame.rows * cell;
        self.pixels.clear();
        self.pixels.resize(self.width * self.height, [0; 4]);

        for (r, c) in frame.live_cells() {
            if r >= frame.rows || c >= frame.cols {
                continue;
            }
            let rgba = style.cell_rgba(r, c, frame);
            for y in r * cell..(r + 1) * cell {
                let start = y * self.width + c * cell;
                self.pixels[start..start + cell].fill(rgba);
            }
        }
    }
}

/// Renders the log as shaded text, one line per generation
#[derive(Debug, Default, Clone)]
pub struct TextRenderer {
    output: String,
}

const SHADES: [char; 4] = ['░', '▒', '▓', '█'];

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn into_output(self) -> String {
        self.output
    }
}

impl Renderer for TextRenderer {
    fn render(&mut self, frame: &FrameView<'_>, _cell_size: f32, style: &RenderStyle) {
        self.output.clear();
        for (r, row) in frame.history.iter().take(frame.upto_generation + 1).enumerate() {
            for (c, &cell) in row.cells().iter().enumerate() {
                if cell == 0 {
                    self.output.push(' ');
                    continue;
                }
                let opacity = style.cell_opacity(r, c, frame);
                let shade = ((opacity * SHADES.len() as f32).ceil() as usize).clamp(1, SHADES.len());
                self.output.push(SHADES[shade - 1]);
            }
            self.output.push('\n');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(history: &[Row], rows: usize) -> FrameView<'_> {
        FrameView {
            history,
            upto_generation: history.len() - 1,
            cols: history[0].len(),
            rows,
        }
    }

    #[test]
    fn age_falloff_has_a_floor() {
        let style = RenderStyle::default();
        // Newest row is fully bright
        assert_eq!(style.age_factor(9, 9, 10), 1.0);
        // Halfway through the fade
        assert!((style.age_factor(4, 9, 10) - 0.5).abs() < 1e-6);
        // Old rows stop at the floor
        assert_eq!(style.age_factor(0, 100, 10), style.min_age_factor);
    }

    #[test]
    fn distance_falloff_is_symmetric() {
        let style = RenderStyle::default();
        assert_eq!(style.distance_factor(5, 10), 1.0);
        assert_eq!(style.distance_factor(3, 10), style.distance_factor(7, 10));
        let edge = style.distance_factor(0, 10);
        assert!((edge - 0.25).abs() < 1e-6, "edge factor {edge}");
    }

    #[test]
    fn opacity_is_the_product_of_factors() {
        let history = vec![Row::seed_centered(10); 5];
        let style = RenderStyle { alpha: 0.5, ..RenderStyle::default() };
        let view = frame(&history, 10);
        let expected = style.distance_factor(3, 10) * style.age_factor(1, 4, 10) * 0.5;
        assert!((style.cell_opacity(1, 3, &view) - expected).abs() < 1e-6);
    }

    #[test]
    fn breathing_oscillates_around_base() {
        let breathing = Breathing::default();
        assert!((breathing.alpha_at(Duration::ZERO) - 0.75).abs() < 1e-6);
        assert!((breathing.alpha_at(Duration::from_millis(1000)) - 1.0).abs() < 1e-6);
        assert!((breathing.alpha_at(Duration::from_millis(3000)) - 0.5).abs() < 1e-6);
        assert!((breathing.alpha_at(Duration::from_millis(4000)) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn gradient_endpoints() {
        let gradient = GoldenGradient::default();
        assert_eq!(gradient.color_at(0.0), gradient.center);
        assert_eq!(gradient.color_at(1.0), gradient.edge);
        assert_eq!(gradient.color_at(7.0), gradient.edge);
    }

    #[test]
    fn pixel_renderer_fills_live_cells_only() {
        let history = vec![Row::seed_centered(5), Row::from(vec![0, 1, 1, 1, 0])];
        let view = frame(&history, 4);
        let mut renderer = PixelRenderer::new();
        renderer.render(&view, 2.0, &RenderStyle::default());

        assert_eq!((renderer.width(), renderer.height()), (10, 8));
        // Seed cell (row 0, col 2) covers pixels x 4..6, y 0..2
        assert_eq!(renderer.pixel(4, 1).map(|p| p[3] > 0), Some(true));
        assert_eq!(renderer.pixel(0, 0), Some([0, 0, 0, 0]));
        // Rows not yet generated stay clear
        assert_eq!(renderer.pixel(4, 6), Some([0, 0, 0, 0]));
        // The newest row is brighter than the seed row
        let newest = renderer.pixel(4, 2).map(|p| p[3]).unwrap_or(0);
        let seed = renderer.pixel(4, 0).map(|p| p[3]).unwrap_or(0);
        assert!(newest > seed);
    }

    #[test]
    fn renderers_can_be_called_repeatedly() {
        let history = vec![Row::seed_centered(5)];
        let view = frame(&history, 1);
        let mut text = TextRenderer::new();
        text.render(&view, 1.0, &RenderStyle::default());
        text.render(&view, 1.0, &RenderStyle::default());
        assert_eq!(text.output(), "  █  \n");
    }
}
