//! Full-screen error display for failures that stop a command before or
//! while the viewer is up.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};
use std::io::{self, Stdout};
use std::time::Duration;

const ERROR_BG: Color = Color::Rgb(255, 0, 0);
const ERROR_FG: Color = Color::Rgb(255, 255, 255);

/// Red screen with a centred message; any key dismisses it.
pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend)?;
        Ok(ErrorScreen { terminal })
    }

    /// Shows `title`, the error and its causes, and a hint, then waits for a
    /// key press.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show(&mut self, title: &str, error: &anyhow::Error, hint: &str) -> anyhow::Result<()> {
        let lines = message_lines(title, error, hint);

        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame
                    .buffer_mut()
                    .set_style(area, Style::default().bg(ERROR_BG));

                let text_height = (lines.len() as u16).min(area.height);
                let centered_area = Rect {
                    x: area.x + area.width / 10,
                    y: area.y + area.height.saturating_sub(text_height) / 2,
                    width: (area.width * 80) / 100,
                    height: area.height - area.height.saturating_sub(text_height) / 2,
                };

                let paragraph = Paragraph::new(lines.clone())
                    .style(Style::default().fg(ERROR_FG).bg(ERROR_BG))
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, centered_area);
            })?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }

        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows `error` on an error screen and hands it back with `title` as context.
///
/// A failure to draw the screen is only logged.
pub fn report(title: &str, error: anyhow::Error, hint: &str) -> anyhow::Error {
    tracing::error!("{title}: {error:#}");
    let shown = ErrorScreen::new().and_then(|mut screen| {
        screen.show(title, &error, hint)?;
        screen.cleanup()
    });
    if let Err(e) = shown {
        tracing::warn!("Could not show error screen: {e}");
    }
    error.context(title.to_string())
}

fn message_lines(title: &str, error: &anyhow::Error, hint: &str) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{title}:"),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];
    lines.extend(error.chain().map(|cause| Line::from(cause.to_string())));
    if !hint.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(hint.to_string()));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_lists_causes_and_hint() {
        let error = anyhow::anyhow!("connection refused").context("Failed to connect");
        let lines = message_lines("Stream Error", &error, "Is the source running?");
        let text: Vec<String> = lines.iter().map(|l| l.to_string()).collect();

        assert_eq!(
            text,
            vec![
                "Stream Error:",
                "",
                "Failed to connect",
                "connection refused",
                "",
                "Is the source running?",
            ]
        );
    }
}
