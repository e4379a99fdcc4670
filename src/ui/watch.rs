//! Terminal user interface for the live waveform.
//!
//! Replays the session's display list onto a braille canvas, paints the
//! background wash into the cell backgrounds and shows a one-line status
//! footer with the chunk counters.

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    symbols::Marker,
    text::Span,
    widgets::{
        canvas::{Canvas, Line as CanvasLine},
        Paragraph,
    },
};
use std::io::{stdout, Stdout};
use std::time::Duration;

use crate::stream::{DrawOp, FrameView, Lifecycle, Rgb};
use crate::stream::render::DisplayList;

const FOOTER_HEIGHT: u16 = 1;
/// Braille cells hold 2x4 dots.
const DOTS_PER_COLUMN: f64 = 2.0;
const DOTS_PER_ROW: f64 = 4.0;

/// User input while watching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchCommand {
    /// No key, or a key without a binding
    Continue,
    /// Leave the viewer (Escape, 'q' or Ctrl+C)
    Quit,
    AmplitudeUp,
    AmplitudeDown,
    SpeedUp,
    SpeedDown,
}

pub struct WatchTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl WatchTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(WatchTui { terminal })
    }

    /// Drawing surface size in canvas dots for the area above the footer.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn canvas_size(&self) -> anyhow::Result<(f64, f64)> {
        let size = self.terminal.size()?;
        let rows = size.height.saturating_sub(FOOTER_HEIGHT);
        Ok((
            f64::from(size.width) * DOTS_PER_COLUMN,
            f64::from(rows) * DOTS_PER_ROW,
        ))
    }

    /// Draws the latest published frame.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn render(&mut self, view: &FrameView) -> anyhow::Result<()> {
        let display = &view.display;
        let footer = footer_line(view);

        self.terminal.draw(|frame| {
            let area = frame.area();
            let canvas_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(FOOTER_HEIGHT),
            };

            // Surface coordinates grow downwards, the canvas grows upwards.
            let height = display.height;
            let canvas = Canvas::default()
                .marker(Marker::Braille)
                .x_bounds([0.0, display.width.max(1.0)])
                .y_bounds([0.0, height.max(1.0)])
                .paint(|ctx| {
                    for (from, to, color) in display.lines() {
                        ctx.draw(&CanvasLine::new(
                            from.0,
                            height - from.1,
                            to.0,
                            height - to.1,
                            to_color(color),
                        ));
                    }
                });
            frame.render_widget(canvas, canvas_area);
            paint_background(frame.buffer_mut(), canvas_area, display);

            let footer_area = Rect {
                x: area.x,
                y: area.y + area.height.saturating_sub(FOOTER_HEIGHT),
                width: area.width,
                height: FOOTER_HEIGHT,
            };
            let footer = Paragraph::new(footer).style(
                Style::default()
                    .fg(Color::Rgb(185, 207, 212))
                    .bg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(footer, footer_area);
        })?;

        Ok(())
    }

    /// Processes user input and returns the matching command.
    ///
    /// Waits at most `timeout` for a key.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<WatchCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(command_for_key(key));
            }
        }
        Ok(WatchCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for WatchTui {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

fn command_for_key(key: KeyEvent) -> WatchCommand {
    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            tracing::debug!("Escape or 'q' pressed: leaving viewer");
            WatchCommand::Quit
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            tracing::debug!("Ctrl+C pressed: leaving viewer");
            WatchCommand::Quit
        }
        KeyCode::Char('+') | KeyCode::Char('=') => WatchCommand::AmplitudeUp,
        KeyCode::Char('-') => WatchCommand::AmplitudeDown,
        KeyCode::Char(']') => WatchCommand::SpeedUp,
        KeyCode::Char('[') => WatchCommand::SpeedDown,
        _ => WatchCommand::Continue,
    }
}

fn to_color(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}

/// Background color of the band covering the middle of terminal row `row`.
fn band_color_for_row(display: &DisplayList, row: u16, rows: u16) -> Option<Rgb> {
    if rows == 0 {
        return None;
    }
    let y = (f64::from(row) + 0.5) * display.height / f64::from(rows);
    display.ops.iter().find_map(|op| match *op {
        DrawOp::Band { y: top, height, color } if y >= top && y < top + height => Some(color),
        _ => None,
    })
}

fn paint_background(buffer: &mut Buffer, area: Rect, display: &DisplayList) {
    for row in 0..area.height {
        let Some(color) = band_color_for_row(display, row, area.height) else {
            continue;
        };
        for x in area.x..area.x + area.width {
            if let Some(cell) = buffer.cell_mut((x, area.y + row)) {
                cell.set_bg(to_color(color));
            }
        }
    }
}

fn footer_line(view: &FrameView) -> ratatui::text::Line<'static> {
    let indicator = match view.lifecycle {
        Lifecycle::Open => Span::styled("● ", Style::default().fg(Color::Red)),
        Lifecycle::Closing => Span::styled("◌ ", Style::default().fg(Color::Yellow)),
        Lifecycle::Drained | Lifecycle::Reported => {
            Span::styled("■ ", Style::default().fg(Color::Rgb(120, 120, 120)))
        }
    };

    let counters = view.counters;
    let cross_time = match view.cross_time {
        Some(d) => format!("{:.2}s", d.as_secs_f64()),
        None => "--".to_string(),
    };

    let mut spans = vec![
        indicator,
        Span::raw(format!(
            "{} / {} / {}",
            counters.fired, counters.received, counters.echoed
        )),
        Span::raw(format!(" / cross {cross_time}")),
        Span::raw(format!(" / speed {:.2}x", view.speed)),
        Span::raw(format!(" / amp {:.1}", view.amplitude)),
    ];

    if view.pending > 0 {
        spans.push(Span::raw(format!(" / {} queued", view.pending)));
    }
    if view.lost > 0 {
        spans.push(Span::raw(" / "));
        spans.push(Span::styled(
            format!("{} lost", view.lost),
            Style::default().bg(Color::Red).fg(Color::Rgb(255, 255, 255)),
        ));
    }
    if let Some(reason) = &view.closed {
        spans.push(Span::raw(format!(" / {reason}")));
    }
    if view.lifecycle == Lifecycle::Reported {
        spans.push(Span::raw(" / reported, q to exit"));
    }

    ratatui::text::Line::from(spans)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::accounting::EventCounters;
    use crate::stream::render::Surface;

    fn view() -> FrameView {
        FrameView {
            display: DisplayList::new(40.0, 40.0),
            counters: EventCounters {
                fired: 3,
                received: 3,
                echoed: 2,
            },
            lifecycle: Lifecycle::Open,
            cross_time: Some(Duration::from_millis(1200)),
            speed: 1.0,
            amplitude: 1.0,
            pending: 0,
            lost: 0,
            closed: None,
        }
    }

    fn text(line: &ratatui::text::Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn test_key_bindings() {
        let key = |code| KeyEvent::new(code, KeyModifiers::NONE);
        assert_eq!(command_for_key(key(KeyCode::Char('q'))), WatchCommand::Quit);
        assert_eq!(command_for_key(key(KeyCode::Esc)), WatchCommand::Quit);
        assert_eq!(
            command_for_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            WatchCommand::Quit
        );
        assert_eq!(command_for_key(key(KeyCode::Char('c'))), WatchCommand::Continue);
        assert_eq!(command_for_key(key(KeyCode::Char('+'))), WatchCommand::AmplitudeUp);
        assert_eq!(command_for_key(key(KeyCode::Char('['))), WatchCommand::SpeedDown);
    }

    #[test]
    fn test_footer_shows_counters_and_status() {
        let mut view = view();
        assert_eq!(text(&footer_line(&view)), "● 3 / 3 / 2 / cross 1.20s / speed 1.00x / amp 1.0");

        view.lost = 1;
        view.lifecycle = Lifecycle::Closing;
        view.cross_time = None;
        let footer = text(&footer_line(&view));
        assert!(footer.contains("cross --"));
        assert!(footer.ends_with("1 lost"));
    }

    #[test]
    fn test_rows_pick_their_band() {
        let mut display = DisplayList::new(40.0, 40.0);
        display.fill_band(0.0, 20.0, Rgb(1, 1, 1));
        display.fill_band(20.0, 20.0, Rgb(2, 2, 2));

        assert_eq!(band_color_for_row(&display, 0, 10), Some(Rgb(1, 1, 1)));
        assert_eq!(band_color_for_row(&display, 4, 10), Some(Rgb(1, 1, 1)));
        assert_eq!(band_color_for_row(&display, 5, 10), Some(Rgb(2, 2, 2)));
        assert_eq!(band_color_for_row(&display, 0, 0), None);
    }
}
