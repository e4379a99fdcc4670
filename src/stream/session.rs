//! The per-connection session actor.
//!
//! One task owns the history, scroll clock, counters and acknowledgment queue
//! and processes a single inbox of events in arrival order. Acknowledgment
//! calls run in spawned tasks and report back through the inbox; the
//! animation tick and the shutdown drain poll are timers inside the same loop.
//!
//! Lifecycle: `Open` until the transport closes, then `Closing` while the
//! acknowledgment queue drains, `Drained` once every received chunk has been
//! echoed, and `Reported` after the one final report went out.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::accounting::EventCounters;
use super::clock::{ScrollClock, FRAME_RATE};
use super::collaborator::{Acknowledgment, Collaborator};
use super::decode::SampleVector;
use super::echo::{EchoDispatcher, PendingEcho};
use super::history::{HistoryBuffer, PushOutcome, HISTORY_SIZE};
use super::render::{DisplayList, Renderer};

/// Interval between drain attempts once the stream is closed.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(10);

/// How the transport ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    Clean { code: u16, reason: String },
    Unexpected(String),
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean { code, reason } if reason.is_empty() => write!(f, "closed ({code})"),
            Self::Clean { code, reason } => write!(f, "closed ({code}: {reason})"),
            Self::Unexpected(err) => write!(f, "connection lost: {err}"),
        }
    }
}

/// Everything the session reacts to.
#[derive(Debug)]
pub enum SessionEvent {
    /// A decoded chunk, in wire order
    FrameArrived(SampleVector),
    /// The outstanding acknowledgment finished; `error` is set on failure
    AckCompleted { error: Option<String> },
    /// One animation tick
    Tick(Instant),
    StreamClosed(CloseReason),
    SetSpeed(f64),
    SetAmplitude(f64),
    /// Drawing surface size in pixels
    Resize { width: f64, height: f64 },
    /// The viewer is going away; abandon all work
    Teardown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Open,
    Closing,
    Drained,
    Reported,
}

/// Display and scroll settings a session starts with.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub width: f64,
    pub height: f64,
    pub amplitude: f64,
    pub speed: f64,
    pub min_speed: f64,
    pub max_speed: f64,
    pub history_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: 600.0,
            height: 300.0,
            amplitude: 1.0,
            speed: 1.0,
            min_speed: 1.0,
            max_speed: 5.0,
            history_size: HISTORY_SIZE,
        }
    }
}

/// State published to the viewer after every change.
#[derive(Debug, Clone)]
pub struct FrameView {
    pub display: DisplayList,
    pub counters: EventCounters,
    pub lifecycle: Lifecycle,
    pub cross_time: Option<Duration>,
    pub speed: f64,
    pub amplitude: f64,
    pub pending: usize,
    pub lost: u64,
    pub closed: Option<CloseReason>,
}

/// What a finished session leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSummary {
    pub counters: EventCounters,
    pub lifecycle: Lifecycle,
    pub reported: bool,
    pub lost: u64,
}

/// Sender side used by transports and the viewer.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    events: mpsc::UnboundedSender<SessionEvent>,
    frames: watch::Receiver<FrameView>,
}

impl SessionHandle {
    /// Queues an event. Returns false once the session is gone.
    pub fn send(&self, event: SessionEvent) -> bool {
        self.events.send(event).is_ok()
    }

    pub fn events(&self) -> mpsc::UnboundedSender<SessionEvent> {
        self.events.clone()
    }

    pub fn frames(&self) -> watch::Receiver<FrameView> {
        self.frames.clone()
    }
}

pub struct Session {
    inbox: mpsc::UnboundedReceiver<SessionEvent>,
    /// Handed to acknowledgment tasks; does not keep the inbox open
    completions: mpsc::WeakUnboundedSender<SessionEvent>,
    collaborator: Arc<dyn Collaborator>,
    renderer: Renderer,
    history: HistoryBuffer,
    clock: ScrollClock,
    counters: EventCounters,
    dispatcher: EchoDispatcher,
    lifecycle: Lifecycle,
    report_posted: AtomicBool,
    amplitude: f64,
    width: f64,
    height: f64,
    started: Instant,
    closed: Option<CloseReason>,
    in_flight: Option<JoinHandle<()>>,
    report: Option<JoinHandle<()>>,
    frames: watch::Sender<FrameView>,
    finished: bool,
    lost_warned: bool,
}

impl Session {
    pub fn new(config: SessionConfig, collaborator: Arc<dyn Collaborator>) -> (Self, SessionHandle) {
        let (events, inbox) = mpsc::unbounded_channel();
        let clock = ScrollClock::new(
            config.speed,
            config.min_speed,
            config.max_speed,
            config.history_size,
        );
        let amplitude = config.amplitude.max(0.0);
        let (frames, frames_rx) = watch::channel(FrameView {
            display: DisplayList::new(config.width, config.height),
            counters: EventCounters::default(),
            lifecycle: Lifecycle::Open,
            cross_time: None,
            speed: clock.speed(),
            amplitude,
            pending: 0,
            lost: 0,
            closed: None,
        });

        let session = Self {
            inbox,
            completions: events.downgrade(),
            collaborator,
            renderer: Renderer::default(),
            history: HistoryBuffer::with_capacity(config.history_size),
            clock,
            counters: EventCounters::default(),
            dispatcher: EchoDispatcher::new(),
            lifecycle: Lifecycle::Open,
            report_posted: AtomicBool::new(false),
            amplitude,
            width: config.width,
            height: config.height,
            started: tokio::time::Instant::now().into_std(),
            closed: None,
            in_flight: None,
            report: None,
            frames,
            finished: false,
            lost_warned: false,
        };
        let handle = SessionHandle {
            events,
            frames: frames_rx,
        };
        (session, handle)
    }

    /// Runs the event loop until the report went out, the viewer tore the
    /// session down, or every sender is gone.
    pub async fn run(mut self) -> SessionSummary {
        let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / FRAME_RATE));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut drain = tokio::time::interval(DRAIN_INTERVAL);
        drain.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::debug!("Session started");
        while !self.finished {
            tokio::select! {
                event = self.inbox.recv() => match event {
                    Some(event) => self.handle(event),
                    None => self.teardown(),
                },
                now = ticker.tick(), if self.lifecycle != Lifecycle::Reported => {
                    self.handle(SessionEvent::Tick(now.into_std()));
                }
                _ = drain.tick(), if self.lifecycle == Lifecycle::Closing => self.drain_poll(),
            }
            if self.lifecycle == Lifecycle::Reported {
                self.finished = true;
            }
        }

        if let Some(report) = self.report.take() {
            if let Err(e) = report.await {
                tracing::error!("Report task failed: {e}");
            }
        }

        tracing::info!(
            "Session ended: fired={}, received={}, echoed={}, lost={}, lifecycle={:?}",
            self.counters.fired,
            self.counters.received,
            self.counters.echoed,
            self.dispatcher.lost(),
            self.lifecycle
        );
        SessionSummary {
            counters: self.counters,
            lifecycle: self.lifecycle,
            reported: self.report_posted.load(Ordering::Acquire),
            lost: self.dispatcher.lost(),
        }
    }

    fn handle(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::FrameArrived(samples) => self.on_frame(samples),
            SessionEvent::AckCompleted { error } => self.on_ack_completed(error),
            SessionEvent::Tick(now) => self.on_tick(now),
            SessionEvent::StreamClosed(reason) => self.on_stream_closed(reason),
            SessionEvent::SetSpeed(speed) => {
                let speed = self.clock.set_speed(speed);
                tracing::debug!("Scroll speed set to {speed:.2}");
                self.publish();
            }
            SessionEvent::SetAmplitude(amplitude) => {
                self.amplitude = amplitude.max(0.0);
                tracing::debug!("Amplitude set to {:.2}", self.amplitude);
                self.publish();
            }
            SessionEvent::Resize { width, height } => {
                self.width = width;
                self.height = height;
            }
            SessionEvent::Teardown => self.teardown(),
        }
    }

    fn on_frame(&mut self, samples: SampleVector) {
        if self.lifecycle != Lifecycle::Open {
            tracing::debug!("Ignoring frame received after stream close");
            return;
        }

        if let PushOutcome::LengthMismatch { expected, actual } = self.history.push(samples) {
            tracing::warn!("Dropping chunk of {actual} samples from display (expected {expected})");
        }
        self.counters.record_arrival();
        debug_assert!(self.counters.holds_invariant());
        self.dispatcher.enqueue(PendingEcho {
            duration: self.clock.cross_time(),
        });

        if self.counters.fired == 1 {
            tracing::info!(
                "First chunk received: {} samples",
                self.history.chunk_len().unwrap_or_default()
            );
        }
        self.pump_echoes();
        self.publish();
    }

    /// Starts the next acknowledgment if none is outstanding.
    fn pump_echoes(&mut self) {
        let Some(entry) = self.dispatcher.next_dispatch() else {
            return;
        };

        let call = self
            .collaborator
            .acknowledge(Acknowledgment::new(entry.duration));
        let completions = self.completions.clone();
        self.in_flight = Some(tokio::spawn(async move {
            let error = call.await.err().map(|e| e.to_string());
            // After teardown the inbox is gone and this is a no-op.
            if let Some(events) = completions.upgrade() {
                let _ = events.send(SessionEvent::AckCompleted { error });
            }
        }));
    }

    fn on_ack_completed(&mut self, error: Option<String>) {
        if !self.dispatcher.in_flight() {
            tracing::debug!("Ignoring acknowledgment completion with nothing in flight");
            return;
        }
        self.in_flight = None;

        match error {
            None => {
                self.dispatcher.complete(true);
                self.counters.record_echo();
                debug_assert!(self.counters.holds_invariant());
                self.pump_echoes();
            }
            Some(e) => {
                tracing::warn!("Acknowledgment failed, entry dropped: {e}");
                self.dispatcher.complete(false);
            }
        }
        self.check_convergence();
        self.publish();
    }

    fn on_tick(&mut self, now: Instant) {
        if self.lifecycle == Lifecycle::Reported {
            return;
        }

        let chunk_len = self.history.chunk_len().filter(|_| !self.history.is_empty());
        if let Some(chunk_len) = chunk_len {
            if let Some(wrap) = self.clock.tick(self.width, chunk_len, now) {
                if wrap.traversal {
                    tracing::trace!(
                        "Traversal completed ({} wraps this tick), cross time {:?}, nominal {:?}",
                        wrap.wraps,
                        self.clock.cross_time(),
                        self.clock.nominal_cross_time()
                    );
                }
            }
        }

        let elapsed = now.saturating_duration_since(self.started);
        let (width, height) = (self.width, self.height);
        let offset = self.clock.offset();
        let amplitude = self.amplitude;
        let history = self.history.snapshot();
        let renderer = &self.renderer;
        self.frames.send_modify(|view| {
            view.display.width = width;
            view.display.height = height;
            renderer.draw(&mut view.display, &history, offset, amplitude, elapsed);
        });
        self.publish();
    }

    fn on_stream_closed(&mut self, reason: CloseReason) {
        if self.lifecycle != Lifecycle::Open {
            return;
        }

        match &reason {
            CloseReason::Clean { .. } => tracing::info!("Stream {reason}"),
            CloseReason::Unexpected(_) => tracing::warn!("Stream {reason}"),
        }
        self.closed = Some(reason);
        self.lifecycle = Lifecycle::Closing;

        if self.counters.fired == 0 {
            tracing::info!("No chunks were received; nothing to report");
            self.publish();
            self.finished = true;
            return;
        }

        self.pump_echoes();
        self.check_convergence();
        self.publish();
    }

    fn drain_poll(&mut self) {
        self.pump_echoes();
        self.check_convergence();

        if self.lifecycle == Lifecycle::Closing
            && self.dispatcher.is_idle()
            && self.dispatcher.lost() > 0
            && !self.lost_warned
        {
            tracing::warn!(
                "{} acknowledgment(s) were lost; {} chunk(s) can never be echoed, final report withheld",
                self.dispatcher.lost(),
                self.counters.outstanding()
            );
            self.lost_warned = true;
        }
    }

    /// Moves to `Drained` and reports once the queue is empty and every
    /// received chunk was echoed.
    fn check_convergence(&mut self) {
        if self.lifecycle != Lifecycle::Closing {
            return;
        }
        if !(self.dispatcher.is_idle() && self.counters.caught_up()) {
            return;
        }

        tracing::debug!("Acknowledgments drained");
        self.lifecycle = Lifecycle::Drained;
        self.try_report();
    }

    fn try_report(&mut self) {
        if self
            .report_posted
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            self.lifecycle = Lifecycle::Reported;
            return;
        }

        let counters = self.counters;
        tracing::info!(
            "Posting final report: fired={}, received={}, echoed={}",
            counters.fired,
            counters.received,
            counters.echoed
        );
        let call = self.collaborator.report(counters);
        self.report = Some(tokio::spawn(async move {
            if let Err(e) = call.await {
                tracing::error!("Final report failed: {e}");
            }
        }));
        self.lifecycle = Lifecycle::Reported;
        self.publish();
    }

    fn teardown(&mut self) {
        if let Some(call) = self.in_flight.take() {
            call.abort();
        }
        tracing::debug!(
            "Session torn down with {} acknowledgment(s) pending",
            self.dispatcher.pending()
        );
        self.finished = true;
    }

    fn publish(&self) {
        let counters = self.counters;
        let lifecycle = self.lifecycle;
        let cross_time = self.clock.cross_time();
        let speed = self.clock.speed();
        let amplitude = self.amplitude;
        let pending = self.dispatcher.pending();
        let lost = self.dispatcher.lost();
        let closed = self.closed.clone();
        self.frames.send_modify(|view| {
            view.counters = counters;
            view.lifecycle = lifecycle;
            view.cross_time = cross_time;
            view.speed = speed;
            view.amplitude = amplitude;
            view.pending = pending;
            view.lost = lost;
            view.closed = closed;
        });
    }
}
