//! Live stream viewer.
//!
//! Connects to the audio source, runs a session for the connection and
//! shows the scrolling waveform until the user quits.

use std::sync::Arc;
use std::time::Duration;

use crate::config::WavetapConfig;
use crate::stream::{
    pump, Collaborator, FrameSource, HttpCollaborator, Session, SessionEvent, SessionSummary,
    WebSocketSource,
};
use crate::ui::{error, WatchCommand, WatchTui};

const AMPLITUDE_STEP: f64 = 0.1;
const SPEED_STEP: f64 = 0.25;
/// Longest time the viewer waits for a key before redrawing.
const INPUT_POLL: Duration = Duration::from_millis(20);

/// Watches the live stream at `url` (or the configured one).
///
/// # Errors
/// - If the configuration is invalid
/// - If the stream cannot be reached
/// - If the terminal fails
pub async fn handle_watch(url: Option<String>, api_base: Option<String>) -> anyhow::Result<()> {
    tracing::info!("=== wavetap Watch Started ===");

    let config = load_config()?;
    let url = url.unwrap_or_else(|| config.stream.url.clone());
    let api_base = api_base.unwrap_or_else(|| config.stream.api_base.clone());
    tracing::info!("Stream: {url}, API: {api_base}");

    let collaborator = HttpCollaborator::new(&api_base, config.stream.ack_timeout())?;
    let source = match WebSocketSource::connect(&url).await {
        Ok(source) => source,
        Err(e) => {
            return Err(error::report(
                "Stream Error",
                e,
                "Is the audio source running? Check [stream] in ~/.config/wavetap/wavetap.toml.",
            ))
        }
    };

    let summary = run_viewer(source, Arc::new(collaborator), &config).await?;
    print_summary(&summary);

    tracing::info!("=== wavetap Watch Exited Successfully ===");
    Ok(())
}

/// Loads the config, showing the error screen when it is unusable.
pub(crate) fn load_config() -> anyhow::Result<WavetapConfig> {
    match WavetapConfig::load() {
        Ok(config) => Ok(config),
        Err(e) => Err(error::report(
            "Configuration Error",
            e,
            "Please check your ~/.config/wavetap/wavetap.toml file and try again.",
        )),
    }
}

/// Runs one session fed by `source` and drives the viewer until the user
/// quits. The session keeps its final frame on screen after the stream ends.
///
/// # Errors
/// - If the terminal cannot be set up, read or drawn
pub(crate) async fn run_viewer<S>(
    source: S,
    collaborator: Arc<dyn Collaborator>,
    config: &WavetapConfig,
) -> anyhow::Result<SessionSummary>
where
    S: FrameSource + Send + 'static,
{
    let mut tui = WatchTui::new()?;
    let mut size = tui.canvas_size()?;

    let (session, handle) = Session::new(config.session_config(size.0, size.1), collaborator);
    let session_task = tokio::spawn(session.run());
    let transport_task = tokio::spawn(pump(source, handle.events()));
    let mut frames = handle.frames();

    let result = loop {
        let command = match tui.handle_input(INPUT_POLL) {
            Ok(command) => command,
            Err(e) => break Err(e),
        };

        let (amplitude, speed) = {
            let view = frames.borrow();
            (view.amplitude, view.speed)
        };
        match command {
            WatchCommand::Quit => break Ok(()),
            WatchCommand::AmplitudeUp => {
                handle.send(SessionEvent::SetAmplitude(amplitude + AMPLITUDE_STEP));
            }
            WatchCommand::AmplitudeDown => {
                handle.send(SessionEvent::SetAmplitude(amplitude - AMPLITUDE_STEP));
            }
            WatchCommand::SpeedUp => {
                handle.send(SessionEvent::SetSpeed(speed + SPEED_STEP));
            }
            WatchCommand::SpeedDown => {
                handle.send(SessionEvent::SetSpeed(speed - SPEED_STEP));
            }
            WatchCommand::Continue => {}
        }

        match tui.canvas_size() {
            Ok(current) if current != size => {
                size = current;
                handle.send(SessionEvent::Resize {
                    width: size.0,
                    height: size.1,
                });
            }
            Ok(_) => {}
            Err(e) => break Err(e),
        }

        let view = frames.borrow_and_update().clone();
        if let Err(e) = tui.render(&view) {
            break Err(e);
        }
        tokio::task::yield_now().await;
    };

    handle.send(SessionEvent::Teardown);
    transport_task.abort();
    let summary = session_task
        .await
        .map_err(|e| anyhow::anyhow!("Session task failed: {e}"));

    if let Err(e) = tui.cleanup() {
        tracing::warn!("Terminal cleanup failed: {e}");
    }
    result?;
    summary
}

fn print_summary(summary: &SessionSummary) {
    let counters = summary.counters;
    let status = if summary.reported {
        "reported"
    } else if summary.lost > 0 {
        "not reported, acknowledgments lost"
    } else {
        "not reported"
    };
    println!(
        "fired {} / received {} / echoed {} ({status})",
        counters.fired, counters.received, counters.echoed
    );
}
