//! Scroll clock driving the horizontal waveform offset.
//!
//! Every animation tick moves the waveform left by a fixed number of pixels
//! proportional to the configured speed. The offset wraps modulo one chunk
//! width; `history_size` wraps make one full traversal of the window, and the
//! interval between two traversals is the observed cross time.

use std::time::{Duration, Instant};

/// Seconds for the waveform to cross the whole surface at minimum speed.
pub const MIN_CROSS_TIME: f64 = 1.2;
/// Nominal animation ticks per second.
pub const FRAME_RATE: f64 = 50.0;

/// Emitted when the offset wraps past a chunk boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WrapEvent {
    /// Chunk wraps completed in this tick (more than one at high speed)
    pub wraps: u64,
    /// Set when this tick completed a full cross-buffer traversal
    pub traversal: bool,
}

#[derive(Debug)]
pub struct ScrollClock {
    offset: f64,
    speed: f64,
    min_speed: f64,
    max_speed: f64,
    history_size: usize,
    /// Wraps into the current traversal
    phase: u64,
    last_traversal: Option<Instant>,
    cross_time: Option<Duration>,
}

impl ScrollClock {
    pub fn new(speed: f64, min_speed: f64, max_speed: f64, history_size: usize) -> Self {
        let min_speed = min_speed.max(f64::EPSILON);
        let max_speed = max_speed.max(min_speed);
        let speed = if speed.is_nan() { min_speed } else { speed };
        Self {
            offset: 0.0,
            speed: speed.clamp(min_speed, max_speed),
            min_speed,
            max_speed,
            history_size: history_size.max(1),
            phase: 0,
            last_traversal: None,
            cross_time: None,
        }
    }

    /// Width of one chunk on a surface `width` pixels wide.
    pub fn px_per_chunk(&self, width: f64, chunk_len: usize) -> f64 {
        width / (chunk_len * self.history_size) as f64 * chunk_len as f64
    }

    /// Pixels advanced per tick at the current speed.
    pub fn step(&self, width: f64) -> f64 {
        width / (MIN_CROSS_TIME * FRAME_RATE) * (self.speed / self.min_speed)
    }

    /// Advances the offset by one tick.
    pub fn tick(&mut self, width: f64, chunk_len: usize, now: Instant) -> Option<WrapEvent> {
        if width <= 0.0 || chunk_len == 0 {
            return None;
        }

        let px_per_chunk = self.px_per_chunk(width, chunk_len);
        self.offset += self.step(width);
        if self.offset < px_per_chunk {
            return None;
        }

        if !self.offset.is_finite() {
            self.offset = 0.0;
            return None;
        }

        // `as` saturates, so an absurd step still yields a bounded count.
        let wraps = (self.offset / px_per_chunk).floor() as u64;
        self.offset = self.offset.rem_euclid(px_per_chunk);

        let per_traversal = self.history_size as u64;
        let into = self.phase.saturating_add(wraps);
        let traversal = into >= per_traversal;
        self.phase = into % per_traversal;

        if traversal {
            if let Some(previous) = self.last_traversal {
                self.cross_time = Some(now.saturating_duration_since(previous));
            }
            self.last_traversal = Some(now);
        }

        Some(WrapEvent {
            wraps,
            traversal,
        })
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Sets the speed, clamped to the configured range. Returns the value used.
    pub fn set_speed(&mut self, speed: f64) -> f64 {
        if speed.is_nan() {
            return self.speed;
        }
        self.speed = speed.clamp(self.min_speed, self.max_speed);
        self.speed
    }

    /// Most recent traversal-to-traversal interval, once two traversals happened.
    pub fn cross_time(&self) -> Option<Duration> {
        self.cross_time
    }

    /// Cross time expected at the current speed.
    pub fn nominal_cross_time(&self) -> Duration {
        Duration::from_secs_f64(MIN_CROSS_TIME * (self.min_speed / self.speed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::history::HISTORY_SIZE;

    const TICK: Duration = Duration::from_millis(20);

    fn run_ticks(clock: &mut ScrollClock, width: f64, ticks: usize) -> Vec<WrapEvent> {
        let start = Instant::now();
        (1..=ticks)
            .filter_map(|k| clock.tick(width, 128, start + TICK * k as u32))
            .collect()
    }

    #[test]
    fn test_offset_stays_within_one_chunk() {
        let mut clock = ScrollClock::new(4.7, 1.0, 5.0, HISTORY_SIZE);
        let start = Instant::now();
        let px_per_chunk = clock.px_per_chunk(613.0, 128);
        for k in 1..2_000u32 {
            clock.tick(613.0, 128, start + TICK * k);
            assert!(clock.offset() >= 0.0);
            assert!(clock.offset() < px_per_chunk);
        }
    }

    #[test]
    fn test_cross_time_absent_until_second_traversal() {
        let mut clock = ScrollClock::new(1.0, 1.0, 5.0, HISTORY_SIZE);
        let events = run_ticks(&mut clock, 600.0, 61);
        assert_eq!(events.iter().filter(|e| e.traversal).count(), 1);
        assert_eq!(clock.cross_time(), None);

        run_ticks(&mut clock, 600.0, 61);
        assert!(clock.cross_time().is_some());
    }

    #[test]
    fn test_cross_time_converges_to_nominal() {
        for speed in [1.0, 2.0, 3.5] {
            let mut clock = ScrollClock::new(speed, 1.0, 5.0, HISTORY_SIZE);
            run_ticks(&mut clock, 600.0, 2_000);

            let observed = clock.cross_time().unwrap().as_secs_f64();
            let expected = MIN_CROSS_TIME * (1.0 / speed);
            assert!(
                (observed - expected).abs() <= TICK.as_secs_f64() + 1e-9,
                "speed {speed}: observed {observed}, expected {expected}"
            );
            assert!((clock.nominal_cross_time().as_secs_f64() - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_speed_is_clamped() {
        let mut clock = ScrollClock::new(10.0, 1.0, 5.0, HISTORY_SIZE);
        assert_eq!(clock.speed(), 5.0);
        assert_eq!(clock.set_speed(0.1), 1.0);
        assert_eq!(clock.set_speed(2.5), 2.5);
    }

    #[test]
    fn test_extreme_speed_keeps_offset_bounded() {
        let mut clock = ScrollClock::new(1e20, 1.0, 1e20, HISTORY_SIZE);
        let px_per_chunk = clock.px_per_chunk(600.0, 128);
        let events = run_ticks(&mut clock, 600.0, 4);

        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.traversal));
        assert!(clock.offset() >= 0.0);
        assert!(clock.offset() < px_per_chunk);
    }

    #[test]
    fn test_nan_speed_is_ignored() {
        let mut clock = ScrollClock::new(f64::NAN, 1.0, 5.0, HISTORY_SIZE);
        assert_eq!(clock.speed(), 1.0);
        clock.set_speed(3.0);
        assert_eq!(clock.set_speed(f64::NAN), 3.0);
    }

    #[test]
    fn test_no_movement_without_chunks() {
        let mut clock = ScrollClock::new(1.0, 1.0, 5.0, HISTORY_SIZE);
        assert!(clock.tick(600.0, 0, Instant::now()).is_none());
        assert_eq!(clock.offset(), 0.0);
    }
}
