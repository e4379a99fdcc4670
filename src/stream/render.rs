//! Waveform rendering onto an abstract drawing surface.
//!
//! The renderer only needs three primitives: clear, fill a horizontal band and
//! draw a line segment. `DisplayList` records those calls so the terminal UI
//! can replay them onto a ratatui canvas and tests can inspect them.

use std::time::Duration;

use super::history::HistorySnapshot;

/// Vertical share of the half-height a full-scale sample reaches.
const WAVE_SCALE: f64 = 0.45;
/// Number of horizontal bands in the background wash.
const BACKGROUND_BANDS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Minimal drawing capability the renderer draws through.
pub trait Surface {
    fn size(&self) -> (f64, f64);
    fn clear(&mut self);
    fn fill_band(&mut self, y: f64, height: f64, color: Rgb);
    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DrawOp {
    Band { y: f64, height: f64, color: Rgb },
    Line { from: (f64, f64), to: (f64, f64), color: Rgb },
}

/// Recorded drawing calls for one frame, in surface coordinates (y down).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayList {
    pub width: f64,
    pub height: f64,
    pub ops: Vec<DrawOp>,
}

impl DisplayList {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            ops: Vec::new(),
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = (&(f64, f64), &(f64, f64), Rgb)> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Line { from, to, color } => Some((from, to, *color)),
            DrawOp::Band { .. } => None,
        })
    }
}

impl Surface for DisplayList {
    fn size(&self) -> (f64, f64) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.ops.clear();
    }

    fn fill_band(&mut self, y: f64, height: f64, color: Rgb) {
        self.ops.push(DrawOp::Band { y, height, color });
    }

    fn line(&mut self, from: (f64, f64), to: (f64, f64), color: Rgb) {
        self.ops.push(DrawOp::Line { from, to, color });
    }
}

/// Draws the scrolling waveform and its decorations.
#[derive(Debug, Clone)]
pub struct Renderer {
    pub waveform: Rgb,
    pub reference: Rgb,
}

impl Default for Renderer {
    fn default() -> Self {
        Self {
            waveform: Rgb(97, 218, 251),
            reference: Rgb(90, 90, 90),
        }
    }
}

impl Renderer {
    /// Draws one frame.
    ///
    /// # Arguments
    /// * `history` - Current window of chunks
    /// * `offset` - Scroll offset in pixels from the clock
    /// * `amplitude` - Vertical scale, negative values are treated as 0
    /// * `elapsed` - Session time, drives the background wash
    pub fn draw<S: Surface>(
        &self,
        surface: &mut S,
        history: &HistorySnapshot<'_>,
        offset: f64,
        amplitude: f64,
        elapsed: Duration,
    ) {
        let (w, h) = surface.size();
        surface.clear();
        if w <= 0.0 || h <= 0.0 {
            return;
        }

        draw_background(surface, h, elapsed);
        surface.line((0.0, h / 2.0), (w, h / 2.0), self.reference);

        let total = history.total_positions();
        if total == 0 {
            return;
        }

        let amplitude = amplitude.max(0.0);
        let dx = w / total as f64;
        let mut pen: Option<(f64, f64)> = None;
        for i in 0..total {
            let Some(sample) = history.sample(i) else {
                pen = None;
                continue;
            };
            let point = (
                -offset + i as f64 * dx,
                h / 2.0 + sample as f64 * h * WAVE_SCALE * amplitude,
            );
            if let Some(previous) = pen {
                surface.line(previous, point, self.waveform);
            }
            pen = Some(point);
        }
    }
}

/// Slowly cycling background: hue follows session time, each band's
/// lightness follows a sinusoid of its row index.
fn draw_background<S: Surface>(surface: &mut S, h: f64, elapsed: Duration) {
    let t = elapsed.as_secs_f64();
    let hue = (t * 12.0) % 360.0;
    let band_height = h / BACKGROUND_BANDS as f64;

    for band in 0..BACKGROUND_BANDS {
        let lightness = 0.10 + 0.05 * (t * 1.3 + band as f64 * 0.4).sin();
        let color = hsl_to_rgb(hue, 0.45, lightness);
        surface.fill_band(band as f64 * band_height, band_height, color);
    }
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgb {
    let c = (1.0 - (2.0 * lightness - 1.0).abs()) * saturation;
    let h = (hue.rem_euclid(360.0)) / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = lightness - c / 2.0;
    let channel = |v: f64| ((v + m).clamp(0.0, 1.0) * 255.0).round() as u8;
    Rgb(channel(r), channel(g), channel(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::history::HistoryBuffer;

    fn waveform_lines(list: &DisplayList, renderer: &Renderer) -> Vec<((f64, f64), (f64, f64))> {
        list.lines()
            .filter(|(_, _, color)| *color == renderer.waveform)
            .map(|(from, to, _)| (*from, *to))
            .collect()
    }

    #[test]
    fn test_empty_history_draws_reference_line_only() {
        let history = HistoryBuffer::new();
        let renderer = Renderer::default();
        let mut list = DisplayList::new(200.0, 100.0);

        renderer.draw(&mut list, &history.snapshot(), 0.0, 1.0, Duration::ZERO);

        let lines: Vec<_> = list.lines().collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(*lines[0].0, (0.0, 50.0));
        assert_eq!(*lines[0].1, (200.0, 50.0));
        assert_eq!(
            list.ops.iter().filter(|op| matches!(op, DrawOp::Band { .. })).count(),
            BACKGROUND_BANDS
        );
    }

    #[test]
    fn test_partial_history_maps_samples_to_positions() {
        let mut history = HistoryBuffer::with_capacity(4);
        history.push(vec![0.0, 1.0].into());
        history.push(vec![-1.0, 0.5].into());
        let renderer = Renderer::default();
        let mut list = DisplayList::new(80.0, 100.0);

        renderer.draw(&mut list, &history.snapshot(), 5.0, 1.0, Duration::ZERO);

        // 4 present samples -> 3 segments, the missing half of the window is skipped.
        let segments = waveform_lines(&list, &renderer);
        assert_eq!(segments.len(), 3);
        assert_eq!(segments[0].0, (-5.0, 50.0));
        assert_eq!(segments[0].1, (5.0, 50.0 + 45.0));
        assert_eq!(segments[1].1, (15.0, 50.0 - 45.0));
        assert_eq!(segments[2].1, (25.0, 50.0 + 22.5));
    }

    #[test]
    fn test_negative_amplitude_is_flat() {
        let mut history = HistoryBuffer::with_capacity(2);
        history.push(vec![1.0, -1.0, 0.7].into());
        let renderer = Renderer::default();
        let mut list = DisplayList::new(60.0, 40.0);

        renderer.draw(&mut list, &history.snapshot(), 0.0, -3.0, Duration::ZERO);

        for (from, to) in waveform_lines(&list, &renderer) {
            assert_eq!(from.1, 20.0);
            assert_eq!(to.1, 20.0);
        }
    }

    #[test]
    fn test_redraw_replaces_previous_frame() {
        let mut history = HistoryBuffer::with_capacity(2);
        history.push(vec![0.2; 16].into());
        let renderer = Renderer::default();
        let mut list = DisplayList::new(60.0, 40.0);

        renderer.draw(&mut list, &history.snapshot(), 1.0, 1.0, Duration::from_millis(20));
        let first = list.clone();
        renderer.draw(&mut list, &history.snapshot(), 1.0, 1.0, Duration::from_millis(20));
        assert_eq!(first, list);
    }

    #[test]
    fn test_hsl_primaries() {
        assert_eq!(hsl_to_rgb(0.0, 1.0, 0.5), Rgb(255, 0, 0));
        assert_eq!(hsl_to_rgb(120.0, 1.0, 0.5), Rgb(0, 255, 0));
        assert_eq!(hsl_to_rgb(240.0, 1.0, 0.5), Rgb(0, 0, 255));
    }
}
